mod request_id;
pub use request_id::RequestId;

mod build_status;
pub use build_status::BuildStatus;

mod status_info;
pub use status_info::StatusInfo;

mod image_spec;
pub use image_spec::{ImageSpec, parse_ports};

mod completion;
pub use completion::CompletionEvent;

/// Length of a generated [`RequestId`].
pub const REQUEST_ID_LEN: usize = 16;

/// Characters a generated [`RequestId`] is drawn from.
pub const REQUEST_ID_ALPHABET: &[u8; 62] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
