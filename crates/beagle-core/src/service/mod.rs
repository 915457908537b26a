use std::{sync::Arc, time::Instant};

use tokio::sync::{
    Semaphore,
    mpsc::{self, error::TrySendError},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, instrument, warn};

use beagle_model::{BuildStatus, ImageSpec, RequestId, StatusInfo};

use crate::{
    error::CoreError,
    id::IdGenerator,
    metrics::{self, MetricsHandle},
    notify::CompletionNotifier,
    pipeline::{self, PipelineFailure, Recorder},
    registry::StatusRegistry,
    runtime::{ArchiveReader, BuildSubmission, ContainerRuntime},
};

/// Worker pool limits.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Pipelines allowed to run at the same time.
    pub max_concurrent: usize,
    /// Accepted submissions waiting for a worker; beyond this `submit` fails fast.
    pub queue_capacity: usize,
    /// Completion events buffered per consumer.
    pub notify_capacity: usize,
    /// Draws of a fresh request id before giving up on collisions.
    pub id_attempts: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            queue_capacity: 64,
            notify_capacity: 128,
            id_attempts: 16,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        let zero = [
            ("max_concurrent", self.max_concurrent),
            ("queue_capacity", self.queue_capacity),
            ("notify_capacity", self.notify_capacity),
            ("id_attempts", self.id_attempts),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        match zero {
            Some((field, _)) => Err(CoreError::InvalidConfig(format!("{field} must be > 0"))),
            None => Ok(()),
        }
    }
}

struct Job {
    id: RequestId,
    image: ImageSpec,
    archive: ArchiveReader,
}

pub struct BuildServiceBuilder {
    runtime: Arc<dyn ContainerRuntime>,
    config: PipelineConfig,
    metrics: MetricsHandle,
    ids: IdGenerator,
}

impl BuildServiceBuilder {
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_id_generator(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Spawn the dispatcher. Must be called inside a tokio runtime.
    pub fn start(self) -> Result<BuildService, CoreError> {
        self.config.validate()?;

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let recorder = Recorder {
            registry: StatusRegistry::new(),
            notifier: CompletionNotifier::new(self.config.notify_capacity, self.metrics.clone()),
            metrics: self.metrics.clone(),
        };
        let dispatcher = Dispatcher {
            runtime: self.runtime,
            recorder: recorder.clone(),
            slots: Arc::new(Semaphore::new(self.config.max_concurrent)),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
            fatal: CancellationToken::new(),
        };

        let service = BuildService {
            tx,
            recorder,
            ids: self.ids,
            config: self.config,
            tracker: dispatcher.tracker.clone(),
            shutdown: dispatcher.shutdown.clone(),
            fatal: dispatcher.fatal.clone(),
        };
        let tracker = dispatcher.tracker.clone();
        tracker.spawn(dispatcher.run(rx));

        info!(
            max_concurrent = service.config.max_concurrent,
            queue_capacity = service.config.queue_capacity,
            id_space = service.ids.space(),
            "build service started"
        );
        Ok(service)
    }
}

/// Accepts build submissions and runs their pipelines on a bounded worker pool.
pub struct BuildService {
    tx: mpsc::Sender<Job>,
    recorder: Recorder,
    ids: IdGenerator,
    config: PipelineConfig,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    fatal: CancellationToken,
}

impl BuildService {
    pub fn builder(runtime: Arc<dyn ContainerRuntime>) -> BuildServiceBuilder {
        BuildServiceBuilder {
            runtime,
            config: PipelineConfig::default(),
            metrics: metrics::noop(),
            ids: IdGenerator::new(),
        }
    }

    /// Accept a submission and return its id before the pipeline runs.
    ///
    /// Validation, queue admission and id allocation all happen here, synchronously;
    /// nothing reaches the runtime unless this returns `Ok`.
    #[instrument(level = "debug", skip_all, fields(image = %submission.image().reference()))]
    pub fn submit(&self, submission: BuildSubmission) -> Result<RequestId, CoreError> {
        if let Err(e) = submission.image().validate() {
            self.recorder.metrics.rejected("validation");
            return Err(e.into());
        }
        if self.shutdown.is_cancelled() {
            return Err(CoreError::ShuttingDown);
        }

        let permit = self.tx.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => {
                self.recorder.metrics.rejected("queue_full");
                CoreError::QueueFull {
                    capacity: self.config.queue_capacity,
                }
            }
            TrySendError::Closed(()) => CoreError::ShuttingDown,
        })?;

        let id = self.allocate_id()?;
        let (image, archive) = submission.into_parts();
        info!(request_id = %id, image = %image.reference(), "build accepted");

        permit.send(Job { id: id.clone(), image, archive });
        self.recorder.metrics.submitted();
        Ok(id)
    }

    /// Draw ids until one registers without colliding.
    fn allocate_id(&self) -> Result<RequestId, CoreError> {
        for attempt in 1..=self.config.id_attempts {
            let id = self.ids.generate();
            if self.recorder.registry.register(id.clone())? {
                return Ok(id);
            }
            debug!(attempt, request_id = %id, "request id collision; drawing again");
        }
        self.recorder.metrics.rejected("id_exhausted");
        Err(CoreError::IdSpaceExhausted(self.config.id_attempts))
    }

    pub fn status(&self, id: &RequestId) -> Result<Option<StatusInfo>, CoreError> {
        self.recorder.registry.get(id)
    }

    pub fn registry(&self) -> &StatusRegistry {
        &self.recorder.registry
    }

    pub fn notifier(&self) -> &CompletionNotifier {
        &self.recorder.notifier
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Cancelled when the service hit an error it can't contain to one request.
    pub fn fatal(&self) -> CancellationToken {
        self.fatal.clone()
    }

    /// Stop accepting submissions, then wait for queued and running pipelines.
    pub async fn shutdown(&self) {
        match self.recorder.registry.list_by_status(BuildStatus::Running) {
            Ok(running) => info!(running = running.len(), "build service shutting down"),
            Err(e) => warn!(error = %e, "build service shutting down; registry unreadable"),
        }
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!("build service stopped");
    }
}

struct Dispatcher {
    runtime: Arc<dyn ContainerRuntime>,
    recorder: Recorder,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    fatal: CancellationToken,
}

impl Dispatcher {
    async fn run(self, mut rx: mpsc::Receiver<Job>) {
        let mut closed = false;
        loop {
            // Take a worker slot first so waiting jobs stay in the bounded queue.
            let permit = match Arc::clone(&self.slots).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("worker slots closed; dispatcher exiting");
                    break;
                }
            };

            let job = loop {
                tokio::select! {
                    job = rx.recv() => break job,
                    _ = self.shutdown.cancelled(), if !closed => {
                        // Already queued jobs still run.
                        rx.close();
                        closed = true;
                    }
                }
            };
            let Some(job) = job else { break };

            let runtime = Arc::clone(&self.runtime);
            let recorder = self.recorder.clone();
            let fatal = self.fatal.clone();
            self.tracker.spawn(async move {
                let _permit = permit;
                process(runtime, &recorder, &fatal, job).await;
            });
        }
        debug!("dispatcher stopped");
    }
}

async fn process(
    runtime: Arc<dyn ContainerRuntime>,
    recorder: &Recorder,
    fatal: &CancellationToken,
    job: Job,
) {
    let Job { id, image, archive } = job;
    let started = Instant::now();
    recorder.metrics.started();

    // A panicking runtime must still leave the request in a terminal state.
    let steps = {
        let id = id.clone();
        let image = image.clone();
        tokio::spawn(async move { pipeline::execute(runtime.as_ref(), &id, &image, archive).await })
    };
    let outcome = match steps.await {
        Ok(outcome) => outcome,
        Err(e) => Err(PipelineFailure::from(e)),
    };

    if let Err(e) = recorder.record(&id, image, outcome, started) {
        error!(request_id = %id, error = %e, "failed to record build outcome");
        fatal.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashSet,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use tokio::{
        io::AsyncReadExt,
        sync::{Notify, broadcast::error::TryRecvError},
    };

    use beagle_model::ModelError;

    use crate::{error::RuntimeError, runtime::RunRequest};

    /// Payload and image names drive the outcome: a `bad-import` payload fails the load,
    /// a `panic` payload panics inside it, a `bad-launch` image fails the run.
    #[derive(Default)]
    struct FakeRuntime {
        loads: AtomicUsize,
        runs: AtomicUsize,
        imported: Mutex<Vec<Vec<u8>>>,
        launched: Mutex<Vec<RunRequest>>,
        seen_while_running: Mutex<Vec<BuildStatus>>,
        registry: Mutex<Option<StatusRegistry>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeRuntime {
        fn observe(&self, id: &RequestId) {
            if let Some(registry) = self.registry.lock().unwrap().as_ref() {
                let status = registry.get(id).unwrap().unwrap().status;
                self.seen_while_running.lock().unwrap().push(status);
            }
        }
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn load(&self, id: &RequestId, mut archive: ArchiveReader) -> Result<(), RuntimeError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.observe(id);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }

            let mut bytes = Vec::new();
            archive
                .read_to_end(&mut bytes)
                .await
                .map_err(|e| RuntimeError::Archive(e.to_string()))?;
            let corrupt = bytes.starts_with(b"bad-import");
            let explode = bytes.starts_with(b"panic");
            self.imported.lock().unwrap().push(bytes);

            if explode {
                panic!("runtime bug");
            }

            if corrupt {
                return Err(RuntimeError::Exit {
                    code: Some(1),
                    diagnostics: "invalid tar header".into(),
                });
            }
            Ok(())
        }

        async fn run(&self, request: &RunRequest) -> Result<(), RuntimeError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.observe(&request.name);
            self.launched.lock().unwrap().push(request.clone());
            if request.image.starts_with("bad-launch") {
                return Err(RuntimeError::Exit {
                    code: Some(125),
                    diagnostics: "port already allocated".into(),
                });
            }
            Ok(())
        }
    }

    /// Tracks pipelines between `started` and `completed`.
    #[derive(Default)]
    struct InFlight(std::sync::atomic::AtomicI64);

    impl crate::metrics::MetricsBackend for InFlight {
        fn submitted(&self) {}
        fn rejected(&self, _reason: &'static str) {}
        fn started(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn completed(&self, _outcome: BuildStatus, _elapsed: Duration) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
        fn notifications_dropped(&self, _count: u64) {}
    }

    fn submission(name: &str, payload: &'static [u8]) -> BuildSubmission {
        BuildSubmission::new(
            ImageSpec::new(name, "latest", vec![8080]).unwrap(),
            std::io::Cursor::new(payload),
        )
    }

    async fn wait_terminal(service: &BuildService, id: &RequestId) -> StatusInfo {
        for _ in 0..500 {
            let info = service.status(id).unwrap().unwrap();
            if info.status.is_terminal() {
                return info;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("request {id} never finished");
    }

    #[test]
    fn zero_limits_rejected() {
        let cfg = PipelineConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(CoreError::InvalidConfig(_))));
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn successful_build_is_done_and_notified_once() {
        let runtime = Arc::new(FakeRuntime::default());
        let service = BuildService::builder(runtime.clone()).start().unwrap();
        let mut rx = service.notifier().subscribe();

        let id = service.submit(submission("web", b"layer-bytes")).unwrap();
        assert_eq!(id.as_str().len(), 16);

        let info = wait_terminal(&service, &id).await;
        assert_eq!(info.status, BuildStatus::Done);
        assert!(info.error.is_none());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.id, id);
        assert_eq!(event.image.reference(), "web:latest");
        assert_eq!(event.image.ports(), &[8080]);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        assert_eq!(*runtime.imported.lock().unwrap(), vec![b"layer-bytes".to_vec()]);
        let launched = runtime.launched.lock().unwrap().clone();
        assert_eq!(
            launched,
            vec![RunRequest {
                name: id.clone(),
                image: "web:latest".into(),
                ports: vec![8080],
            }]
        );

        service.shutdown().await;
    }

    #[tokio::test]
    async fn failed_import_never_launches() {
        let runtime = Arc::new(FakeRuntime::default());
        let service = BuildService::builder(runtime.clone()).start().unwrap();
        let mut rx = service.notifier().subscribe();

        let id = service.submit(submission("web", b"bad-import")).unwrap();
        let info = wait_terminal(&service, &id).await;

        assert_eq!(info.status, BuildStatus::Failed);
        assert!(info.error.unwrap().starts_with("import failed"));
        assert_eq!(runtime.loads.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.runs.load(Ordering::SeqCst), 0);

        service.shutdown().await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn panicking_runtime_is_recorded_as_failed() {
        let runtime = Arc::new(FakeRuntime::default());
        let in_flight = Arc::new(InFlight::default());
        let service = BuildService::builder(runtime.clone())
            .with_config(PipelineConfig {
                max_concurrent: 1,
                ..Default::default()
            })
            .with_metrics(in_flight.clone())
            .start()
            .unwrap();
        let mut rx = service.notifier().subscribe();

        let id = service.submit(submission("web", b"panic")).unwrap();
        let info = wait_terminal(&service, &id).await;

        assert_eq!(info.status, BuildStatus::Failed);
        assert_eq!(
            info.error.as_deref(),
            Some("pipeline aborted: panic: runtime bug")
        );
        assert_eq!(runtime.runs.load(Ordering::SeqCst), 0);

        // The only worker slot was released.
        let next = service.submit(submission("web", b"layer-bytes")).unwrap();
        assert_eq!(wait_terminal(&service, &next).await.status, BuildStatus::Done);

        service.shutdown().await;
        assert_eq!(service.status(&id).unwrap().unwrap().status, BuildStatus::Failed);
        assert_eq!(in_flight.0.load(Ordering::SeqCst), 0);
        assert_eq!(rx.recv().await.unwrap().id, next);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn failed_launch_is_failed_without_event() {
        let runtime = Arc::new(FakeRuntime::default());
        let service = BuildService::builder(runtime.clone()).start().unwrap();
        let mut rx = service.notifier().subscribe();

        let id = service.submit(submission("bad-launch", b"ok")).unwrap();
        let info = wait_terminal(&service, &id).await;

        assert_eq!(info.status, BuildStatus::Failed);
        assert!(info.error.unwrap().contains("port already allocated"));

        service.shutdown().await;
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn empty_name_rejected_before_runtime() {
        let runtime = Arc::new(FakeRuntime::default());
        let service = BuildService::builder(runtime.clone()).start().unwrap();

        let image: ImageSpec = serde_json::from_str(r#"{"name":"","tag":"latest"}"#).unwrap();
        let err = service
            .submit(BuildSubmission::new(image, tokio::io::empty()))
            .unwrap_err();

        assert!(matches!(err, CoreError::Validation(ModelError::EmptyField("name"))));
        service.shutdown().await;
        assert_eq!(runtime.loads.load(Ordering::SeqCst), 0);
        assert_eq!(runtime.runs.load(Ordering::SeqCst), 0);
        assert!(service.registry().is_empty().unwrap());
    }

    #[tokio::test]
    async fn status_is_running_during_steps_then_terminal() {
        let runtime = Arc::new(FakeRuntime::default());
        let service = BuildService::builder(runtime.clone()).start().unwrap();
        *runtime.registry.lock().unwrap() = Some(service.registry().clone());

        let id = service.submit(submission("web", b"ok")).unwrap();
        wait_terminal(&service, &id).await;

        assert_eq!(
            *runtime.seen_while_running.lock().unwrap(),
            vec![BuildStatus::Running, BuildStatus::Running]
        );
        // A finished request can't be finished again.
        assert!(service
            .registry()
            .finish(&id, BuildStatus::Failed, None)
            .is_err());
        assert_eq!(service.status(&id).unwrap().unwrap().status, BuildStatus::Done);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn full_queue_rejects_without_registering() {
        let gate = Arc::new(Notify::new());
        let runtime = Arc::new(FakeRuntime {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let service = BuildService::builder(runtime.clone())
            .with_config(PipelineConfig {
                max_concurrent: 1,
                queue_capacity: 1,
                ..Default::default()
            })
            .start()
            .unwrap();

        // First job occupies the only worker, second waits in the queue.
        let first = service.submit(submission("web", b"1")).unwrap();
        while runtime.loads.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        let second = service.submit(submission("web", b"2")).unwrap();

        let err = service.submit(submission("web", b"3")).unwrap_err();
        assert!(matches!(err, CoreError::QueueFull { capacity: 1 }));
        assert_eq!(service.registry().len().unwrap(), 2);

        gate.notify_one();
        wait_terminal(&service, &first).await;
        while runtime.loads.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();
        assert_eq!(wait_terminal(&service, &second).await.status, BuildStatus::Done);

        service.shutdown().await;
    }

    #[tokio::test]
    async fn colliding_ids_are_redrawn_until_exhausted() {
        let runtime = Arc::new(FakeRuntime::default());
        let service = BuildService::builder(runtime)
            .with_id_generator(IdGenerator::with_alphabet(b"ab", 2).unwrap())
            .with_config(PipelineConfig {
                id_attempts: 256,
                ..Default::default()
            })
            .start()
            .unwrap();

        let mut ids = HashSet::new();
        for _ in 0..4 {
            let id = service.submit(submission("web", b"ok")).unwrap();
            assert!(ids.insert(id), "duplicate id handed out");
        }

        let err = service.submit(submission("web", b"ok")).unwrap_err();
        assert!(matches!(err, CoreError::IdSpaceExhausted(256)));

        service.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mixed_outcomes_stay_independent() {
        let runtime = Arc::new(FakeRuntime::default());
        let service = Arc::new(
            BuildService::builder(runtime.clone())
                .with_config(PipelineConfig {
                    max_concurrent: 3,
                    queue_capacity: 64,
                    ..Default::default()
                })
                .start()
                .unwrap(),
        );
        let mut rx = service.notifier().subscribe();

        let mut handles = Vec::new();
        for n in 0..24 {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                let (name, payload): (&str, &'static [u8]) = match n % 3 {
                    0 => ("web", &b"ok"[..]),
                    1 => ("web", &b"bad-import"[..]),
                    _ => ("bad-launch", &b"ok"[..]),
                };
                let id = service.submit(submission(name, payload)).unwrap();
                (id, n % 3 == 0)
            }));
        }

        let mut expected_done = HashSet::new();
        let mut submitted = Vec::new();
        for handle in handles {
            let (id, succeeds) = handle.await.unwrap();
            if succeeds {
                expected_done.insert(id.clone());
            }
            submitted.push((id, succeeds));
        }

        for (id, succeeds) in &submitted {
            let info = wait_terminal(&service, id).await;
            let want = if *succeeds {
                BuildStatus::Done
            } else {
                BuildStatus::Failed
            };
            assert_eq!(info.status, want, "request {id}");
        }

        service.shutdown().await;

        let mut notified = HashSet::new();
        while let Ok(event) = rx.try_recv() {
            assert!(notified.insert(event.id), "duplicate completion event");
        }
        assert_eq!(notified, expected_done);
    }

    #[tokio::test]
    async fn submit_after_shutdown_is_refused() {
        let service = BuildService::builder(Arc::new(FakeRuntime::default()))
            .start()
            .unwrap();
        service.shutdown().await;

        let err = service.submit(submission("web", b"ok")).unwrap_err();
        assert!(matches!(err, CoreError::ShuttingDown));
    }

    #[tokio::test]
    async fn shutdown_drains_queued_jobs() {
        let runtime = Arc::new(FakeRuntime::default());
        let service = BuildService::builder(runtime.clone())
            .with_config(PipelineConfig {
                max_concurrent: 1,
                ..Default::default()
            })
            .start()
            .unwrap();

        let ids: Vec<_> = (0..5)
            .map(|_| service.submit(submission("web", b"ok")).unwrap())
            .collect();
        service.shutdown().await;

        for id in &ids {
            assert_eq!(service.status(id).unwrap().unwrap().status, BuildStatus::Done);
        }
        assert_eq!(runtime.runs.load(Ordering::SeqCst), 5);
    }
}
