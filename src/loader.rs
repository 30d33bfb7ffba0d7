use crate::collaborator::Collaborator;
use crate::error::{EngineError, compact_error};
use crate::model::{NamespaceScope, ResourceKind, ResourceRow};
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LoadStatus<T> {
    Idle,
    Loading,
    Loaded(T),
    Failed(String),
}

/// Request state fenced by a monotonically increasing epoch.
#[derive(Debug, Clone)]
pub struct AsyncLoad<T> {
    status: LoadStatus<T>,
    epoch: u64,
}

impl<T> Default for AsyncLoad<T> {
    fn default() -> Self {
        Self {
            status: LoadStatus::Idle,
            epoch: 0,
        }
    }
}

impl<T> AsyncLoad<T> {
    pub fn status(&self) -> &LoadStatus<T> {
        &self.status
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, LoadStatus::Loading)
    }

    pub fn start(&mut self) -> u64 {
        self.epoch += 1;
        self.status = LoadStatus::Loading;
        self.epoch
    }

    /// Abandons the request in flight. Its result will be fenced out.
    pub fn supersede(&mut self) {
        self.epoch += 1;
        self.status = LoadStatus::Idle;
    }

    pub fn apply(&mut self, epoch: u64, result: Result<T, String>) -> Result<(), EngineError> {
        if epoch != self.epoch {
            return Err(EngineError::StaleResult {
                epoch,
                current: self.epoch,
            });
        }

        self.status = match result {
            Ok(value) => LoadStatus::Loaded(value),
            Err(error) => LoadStatus::Failed(error),
        };
        Ok(())
    }

    pub fn take_loaded(&mut self) -> Option<T> {
        match std::mem::replace(&mut self.status, LoadStatus::Idle) {
            LoadStatus::Loaded(value) => Some(value),
            other => {
                self.status = other;
                None
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Spinner {
    frame: usize,
}

impl Spinner {
    pub fn tick(&mut self) {
        self.frame = (self.frame + 1) % SPINNER_FRAMES.len();
    }

    pub fn reset(&mut self) {
        self.frame = 0;
    }

    pub fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.frame % SPINNER_FRAMES.len()]
    }
}

#[derive(Debug, Clone)]
pub struct LoadEvent {
    pub epoch: u64,
    pub kind: ResourceKind,
    pub result: Result<Vec<ResourceRow>, String>,
}

/// Runs list requests off the UI loop and reports back over a channel.
pub struct Loader {
    collaborator: Arc<dyn Collaborator>,
    tx: UnboundedSender<LoadEvent>,
    in_flight: Option<JoinHandle<()>>,
}

impl Loader {
    pub fn new(collaborator: Arc<dyn Collaborator>, tx: UnboundedSender<LoadEvent>) -> Self {
        Self {
            collaborator,
            tx,
            in_flight: None,
        }
    }

    pub fn spawn(&mut self, epoch: u64, kind: ResourceKind, scope: NamespaceScope) {
        self.abort();

        let collaborator = Arc::clone(&self.collaborator);
        let tx = self.tx.clone();
        self.in_flight = Some(tokio::spawn(async move {
            debug!(epoch, kind = kind.title(), scope = %scope, "loading resources");
            let result = collaborator
                .list_resources(kind, &scope)
                .await
                .map_err(|error| compact_error(&error));
            if let Err(error) = &result {
                warn!(epoch, kind = kind.title(), "resource load failed: {error}");
            }
            let _ = tx.send(LoadEvent {
                epoch,
                kind,
                result,
            });
        }));
    }

    pub fn abort(&mut self) {
        if let Some(handle) = self.in_flight.take()
            && !handle.is_finished()
        {
            debug!("aborting superseded load");
            handle.abort();
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LogEvent {
    Line { id: u64, line: String },
    Ended { id: u64, error: Option<String> },
}

/// Streams followed log lines into the UI loop until stopped.
pub struct LogFollower {
    collaborator: Arc<dyn Collaborator>,
    tx: UnboundedSender<LogEvent>,
    active: Option<JoinHandle<()>>,
}

impl LogFollower {
    pub fn new(collaborator: Arc<dyn Collaborator>, tx: UnboundedSender<LogEvent>) -> Self {
        Self {
            collaborator,
            tx,
            active: None,
        }
    }

    pub fn start(&mut self, id: u64, namespace: String, pod: String, container: Option<String>) {
        self.stop();

        let collaborator = Arc::clone(&self.collaborator);
        let tx = self.tx.clone();
        self.active = Some(tokio::spawn(async move {
            debug!(id, "following logs for {namespace}/{pod}");
            let mut stream = match collaborator
                .stream_logs(&namespace, &pod, container.as_deref(), true)
                .await
            {
                Ok(stream) => stream,
                Err(error) => {
                    let _ = tx.send(LogEvent::Ended {
                        id,
                        error: Some(compact_error(&error)),
                    });
                    return;
                }
            };

            while let Some(item) = stream.next().await {
                match item {
                    Ok(line) => {
                        if tx.send(LogEvent::Line { id, line }).is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        let _ = tx.send(LogEvent::Ended {
                            id,
                            error: Some(compact_error(&error)),
                        });
                        return;
                    }
                }
            }
            let _ = tx.send(LogEvent::Ended { id, error: None });
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.active.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AsyncLoad, LoadStatus, LogEvent, LogFollower, Loader, SPINNER_FRAMES, Spinner};
    use crate::collaborator::tests::StubCollaborator;
    use crate::error::EngineError;
    use crate::model::{NamespaceScope, ResourceKind, sample_row};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[test]
    fn start_increments_epoch_and_sets_loading() {
        let mut load: AsyncLoad<Vec<u8>> = AsyncLoad::default();
        assert_eq!(load.status(), &LoadStatus::Idle);
        assert_eq!(load.start(), 1);
        assert!(load.is_loading());
        assert_eq!(load.start(), 2);
    }

    #[test]
    fn late_result_for_superseded_epoch_is_dropped() {
        let mut load: AsyncLoad<&str> = AsyncLoad::default();
        let first = load.start();
        let second = load.start();

        assert!(load.apply(second, Ok("fresh")).is_ok());
        assert_eq!(
            load.apply(first, Ok("stale")),
            Err(EngineError::StaleResult {
                epoch: first,
                current: second
            })
        );
        assert_eq!(load.status(), &LoadStatus::Loaded("fresh"));
    }

    #[test]
    fn stale_failure_does_not_clobber_loading() {
        let mut load: AsyncLoad<&str> = AsyncLoad::default();
        let first = load.start();
        load.start();

        assert!(load.apply(first, Err("timeout".to_string())).is_err());
        assert!(load.is_loading());
    }

    #[test]
    fn failure_is_recorded_without_retry() {
        let mut load: AsyncLoad<&str> = AsyncLoad::default();
        let epoch = load.start();
        load.apply(epoch, Err("forbidden".to_string())).unwrap();
        assert_eq!(load.status(), &LoadStatus::Failed("forbidden".to_string()));
        assert!(!load.is_loading());
    }

    #[test]
    fn supersede_fences_in_flight_result() {
        let mut load: AsyncLoad<&str> = AsyncLoad::default();
        let epoch = load.start();
        load.supersede();
        assert!(load.apply(epoch, Ok("late")).is_err());
        assert_eq!(load.status(), &LoadStatus::Idle);
    }

    #[test]
    fn take_loaded_leaves_other_states_alone() {
        let mut load: AsyncLoad<u32> = AsyncLoad::default();
        let epoch = load.start();
        assert_eq!(load.take_loaded(), None);
        assert!(load.is_loading());
        load.apply(epoch, Ok(7)).unwrap();
        assert_eq!(load.take_loaded(), Some(7));
        assert_eq!(load.status(), &LoadStatus::Idle);
    }

    #[test]
    fn spinner_cycles_through_frames() {
        let mut spinner = Spinner::default();
        let first = spinner.frame();
        for _ in 0..SPINNER_FRAMES.len() {
            spinner.tick();
        }
        assert_eq!(spinner.frame(), first);
        spinner.tick();
        assert_ne!(spinner.frame(), first);
        spinner.reset();
        assert_eq!(spinner.frame(), first);
    }

    #[tokio::test]
    async fn loader_delivers_tagged_result() {
        let stub = Arc::new(StubCollaborator::with_rows(vec![sample_row(
            ResourceKind::Secrets,
            "default",
            "db-creds",
            "Opaque",
        )]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut loader = Loader::new(stub.clone(), tx);

        loader.spawn(4, ResourceKind::Secrets, NamespaceScope::Named("default".to_string()));
        let event = rx.recv().await.expect("load event");

        assert_eq!(event.epoch, 4);
        assert_eq!(event.kind, ResourceKind::Secrets);
        assert_eq!(event.result.map(|rows| rows.len()), Ok(1));
        assert_eq!(stub.calls("list_resources"), 1);
    }

    #[tokio::test]
    async fn loader_reports_failure_as_message() {
        let stub = Arc::new(StubCollaborator::failing("connection refused"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut loader = Loader::new(stub, tx);

        loader.spawn(1, ResourceKind::Pods, NamespaceScope::All);
        let event = rx.recv().await.expect("load event");
        assert_eq!(event.result, Err("connection refused".to_string()));
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn respawn_aborts_the_superseded_load() {
        let rows = vec![sample_row(ResourceKind::Pods, "default", "api-0", "Running")];
        let stub = Arc::new(StubCollaborator::with_rows(rows).stalling_lists(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut loader = Loader::new(stub.clone(), tx);

        loader.spawn(1, ResourceKind::Pods, NamespaceScope::All);
        while stub.calls("list_resources") == 0 {
            tokio::task::yield_now().await;
        }
        loader.spawn(2, ResourceKind::Pods, NamespaceScope::All);

        let event = rx.recv().await.expect("load event");
        assert_eq!(event.epoch, 2);
        assert_eq!(event.result.map(|rows| rows.len()), Ok(1));

        settle().await;
        assert!(rx.try_recv().is_err());
        assert_eq!(stub.calls("list_resources"), 2);
        // The stalled task held the only other clone.
        assert_eq!(Arc::strong_count(&stub), 2);
    }

    #[tokio::test]
    async fn stopped_follower_releases_open_stream() {
        let stub = Arc::new(StubCollaborator::with_logs(&["one"]).endless_logs());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut follower = LogFollower::new(stub.clone(), tx);

        follower.start(3, "default".to_string(), "api-0".to_string(), None);
        assert_eq!(
            rx.recv().await,
            Some(LogEvent::Line { id: 3, line: "one".to_string() })
        );

        follower.stop();
        settle().await;
        assert!(rx.try_recv().is_err());
        assert_eq!(Arc::strong_count(&stub), 2);
    }

    #[tokio::test]
    async fn follower_streams_lines_then_ends() {
        let stub = Arc::new(StubCollaborator::with_logs(&["one", "two"]));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut follower = LogFollower::new(stub.clone(), tx);

        follower.start(9, "default".to_string(), "api-0".to_string(), None);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = matches!(event, LogEvent::Ended { .. });
            events.push(event);
            if done {
                break;
            }
        }
        assert_eq!(
            events,
            vec![
                LogEvent::Line { id: 9, line: "one".to_string() },
                LogEvent::Line { id: 9, line: "two".to_string() },
                LogEvent::Ended { id: 9, error: None },
            ]
        );
        assert_eq!(
            stub.last_call("stream_logs").as_deref(),
            Some("default api-0 None follow=true")
        );
    }
}
