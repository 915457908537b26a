use tokio::process::Command;

/// `program base_args.. args..`
pub fn cmd_program(program: &str, base_args: &[String], args: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(base_args.iter().map(|s| s.as_str()));
    cmd.args(args.iter().map(|s| s.as_str()));
    cmd
}

/// Pick the most useful diagnostic text: stderr, else stdout.
pub fn diagnostics(stdout: &[u8], stderr: &[u8]) -> String {
    let err = String::from_utf8_lossy(stderr);
    let err = err.trim();
    if !err.is_empty() {
        return err.to_string();
    }
    String::from_utf8_lossy(stdout).trim().to_string()
}
