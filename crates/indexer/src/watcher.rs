use crate::scanner::FileScanner;
use crate::{IndexStats, IndexerError, ProjectIndexer, Result};
use log::{debug, error, info, warn};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::{broadcast, mpsc, watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use tokio::time;

const FS_EVENT_REASON: &str = "fs_event";

/// One finished incremental run
#[derive(Debug, Clone)]
pub struct IndexUpdate {
    pub completed_at: SystemTime,
    pub duration_ms: u64,
    pub stats: Option<IndexStats>,
    pub success: bool,
    pub reason: String,
    /// Relevant paths touched since the previous run
    pub paths: Vec<PathBuf>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexerHealth {
    pub last_success: Option<SystemTime>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub last_duration_ms: Option<u64>,
    pub pending_events: usize,
    pub indexing: bool,
    pub runs_completed: u64,
}

impl IndexerHealth {
    const fn initial() -> Self {
        Self {
            last_success: None,
            last_error: None,
            consecutive_failures: 0,
            last_duration_ms: None,
            pending_events: 0,
            indexing: false,
            runs_completed: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StreamingIndexerConfig {
    /// Quiet period after the last relevant event before a run starts
    pub debounce: Duration,
    /// Upper bound on how long a burst of events can postpone a run
    pub max_batch_wait: Option<Duration>,
    pub notify_poll_interval: Duration,
}

impl Default for StreamingIndexerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(5),
            max_batch_wait: None,
            notify_poll_interval: Duration::from_secs(2),
        }
    }
}

/// Keeps a project index live by re-running the incremental indexer after file changes
#[derive(Clone)]
pub struct StreamingIndexer {
    inner: Arc<StreamingIndexerInner>,
}

struct StreamingIndexerInner {
    command_tx: mpsc::Sender<WatcherCommand>,
    update_tx: broadcast::Sender<IndexUpdate>,
    health_tx: watch::Sender<IndexerHealth>,
    loop_handle: TokioMutex<Option<JoinHandle<()>>>,
    _watcher: std::sync::Mutex<RecommendedWatcher>,
}

#[derive(Debug)]
enum WatcherCommand {
    Trigger { reason: String },
    Shutdown,
}

impl StreamingIndexer {
    pub fn start(indexer: Arc<ProjectIndexer>, config: StreamingIndexerConfig) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (command_tx, command_rx) = mpsc::channel(16);
        let (health_tx, _) = watch::channel(IndexerHealth::initial());
        let (update_tx, _) = broadcast::channel(32);

        let watcher = create_fs_watcher(indexer.root(), event_tx, config.notify_poll_interval)?;
        info!(
            "Watching {} (debounce {}ms)",
            indexer.root().display(),
            config.debounce.as_millis()
        );

        let handle = tokio::spawn(index_loop(
            indexer,
            config,
            event_rx,
            command_rx,
            update_tx.clone(),
            health_tx.clone(),
        ));

        Ok(Self {
            inner: Arc::new(StreamingIndexerInner {
                command_tx,
                update_tx,
                health_tx,
                loop_handle: TokioMutex::new(Some(handle)),
                _watcher: std::sync::Mutex::new(watcher),
            }),
        })
    }

    /// Schedule a run right away, outside the debounce window
    pub async fn trigger(&self, reason: impl Into<String>) -> Result<()> {
        self.inner
            .command_tx
            .send(WatcherCommand::Trigger {
                reason: reason.into(),
            })
            .await
            .map_err(|e| IndexerError::Other(format!("failed to send trigger: {e}")))?;
        Ok(())
    }

    /// Stop watching. An in-flight run is allowed to finish first.
    pub async fn stop(&self) {
        let _ = self.inner.command_tx.send(WatcherCommand::Shutdown).await;
        let handle = self.inner.loop_handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Watcher loop ended abnormally: {e}");
            }
        }
    }

    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<IndexUpdate> {
        self.inner.update_tx.subscribe()
    }

    #[must_use]
    pub fn health_snapshot(&self) -> IndexerHealth {
        self.inner.health_tx.borrow().clone()
    }
}

impl Drop for StreamingIndexer {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            let _ = self.inner.command_tx.try_send(WatcherCommand::Shutdown);
        }
    }
}

fn create_fs_watcher(
    root: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
    poll_interval: Duration,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default().with_poll_interval(poll_interval),
    )
    .map_err(|e| IndexerError::Other(format!("watcher init failed: {e}")))?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| IndexerError::Other(format!("failed to watch {}: {e}", root.display())))?;
    Ok(watcher)
}

type RunOutcome = (std::result::Result<IndexStats, String>, u64);

/// The work a run covers, taken from the debounce state when it starts
#[derive(Debug, Clone, PartialEq, Eq)]
struct RunRequest {
    reason: String,
    paths: Vec<PathBuf>,
}

async fn index_loop(
    indexer: Arc<ProjectIndexer>,
    config: StreamingIndexerConfig,
    mut event_rx: mpsc::Receiver<notify::Result<Event>>,
    mut command_rx: mpsc::Receiver<WatcherCommand>,
    update_tx: broadcast::Sender<IndexUpdate>,
    health_tx: watch::Sender<IndexerHealth>,
) {
    let mut state = DebounceState::new(config.debounce, config.max_batch_wait);
    let mut health = IndexerHealth::initial();
    let mut in_flight: Option<(RunRequest, JoinHandle<RunOutcome>)> = None;

    loop {
        let next_deadline = state.next_deadline().map(time::Instant::from_std);

        tokio::select! {
            Some(event) = event_rx.recv() => {
                if handle_event(indexer.root(), event, &mut state, Instant::now()) {
                    health.pending_events = state.pending();
                    health_tx.send_replace(health.clone());
                }
            }
            cmd = command_rx.recv() => {
                match cmd {
                    Some(WatcherCommand::Trigger { reason }) => {
                        state.force_run(reason);
                        health.pending_events = state.pending();
                        health_tx.send_replace(health.clone());
                    }
                    Some(WatcherCommand::Shutdown) | None => break,
                }
            }
            () = sleep_until(next_deadline), if in_flight.is_none() && next_deadline.is_some() => {
                let request = state.begin_run();
                debug!("Starting watcher run ({}, {} paths)", request.reason, request.paths.len());
                health.indexing = true;
                health.pending_events = state.pending();
                health_tx.send_replace(health.clone());
                let handle = tokio::spawn(run_index_cycle(indexer.clone()));
                in_flight = Some((request, handle));
            }
            joined = wait_in_flight(&mut in_flight), if in_flight.is_some() => {
                if let Some((request, _)) = in_flight.take() {
                    finish_run(request, joined, &mut health, &state, &health_tx, &update_tx);
                }
            }
        }
    }

    if let Some((request, handle)) = in_flight.take() {
        debug!("Waiting for in-flight run before stopping the watcher");
        let joined = handle.await;
        finish_run(request, joined, &mut health, &state, &health_tx, &update_tx);
    }
    info!("Watcher for {} stopped", indexer.root().display());
}

async fn sleep_until(deadline: Option<time::Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn wait_in_flight(
    in_flight: &mut Option<(RunRequest, JoinHandle<RunOutcome>)>,
) -> std::result::Result<RunOutcome, tokio::task::JoinError> {
    match in_flight.as_mut() {
        Some((_, handle)) => handle.await,
        None => std::future::pending().await,
    }
}

async fn run_index_cycle(indexer: Arc<ProjectIndexer>) -> RunOutcome {
    let started = Instant::now();
    let outcome = indexer.index().await.map_err(|e| e.to_string());
    let duration = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    (outcome, duration)
}

fn finish_run(
    request: RunRequest,
    joined: std::result::Result<RunOutcome, tokio::task::JoinError>,
    health: &mut IndexerHealth,
    state: &DebounceState,
    health_tx: &watch::Sender<IndexerHealth>,
    update_tx: &broadcast::Sender<IndexUpdate>,
) {
    let (outcome, duration) =
        joined.unwrap_or_else(|e| (Err(format!("index task failed: {e}")), 0));

    health.indexing = false;
    health.pending_events = state.pending();
    health.last_duration_ms = Some(duration);
    health.runs_completed += 1;

    let update = match outcome {
        Ok(stats) => {
            info!(
                "Incremental index finished in {duration}ms ({} paths touched)",
                request.paths.len()
            );
            health.last_success = Some(SystemTime::now());
            health.last_error = None;
            health.consecutive_failures = 0;
            IndexUpdate {
                completed_at: SystemTime::now(),
                duration_ms: duration,
                stats: Some(stats),
                success: true,
                reason: request.reason,
                paths: request.paths,
                error: None,
            }
        }
        Err(err) => {
            error!("Streaming index failure: {err}");
            health.last_error = Some(err.clone());
            health.consecutive_failures += 1;
            IndexUpdate {
                completed_at: SystemTime::now(),
                duration_ms: duration,
                stats: None,
                success: false,
                reason: request.reason,
                paths: request.paths,
                error: Some(err),
            }
        }
    };

    health_tx.send_replace(health.clone());
    let _ = update_tx.send(update);
}

fn handle_event(
    root: &Path,
    event: notify::Result<Event>,
    state: &mut DebounceState,
    now: Instant,
) -> bool {
    match event {
        Ok(evt) => {
            if !is_content_event(&evt.kind) {
                return false;
            }
            let mut saw_relevant = false;
            for path in evt.paths {
                if FileScanner::is_relevant_path(root, &path) {
                    state.record_event(path, now);
                    saw_relevant = true;
                }
            }
            saw_relevant
        }
        Err(err) => {
            warn!("Watcher error: {err}");
            false
        }
    }
}

/// Create, modify, remove and rename; access notifications never change content.
const fn is_content_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

/// Debounce timer for the watch loop.
///
/// Every relevant event pushes the deadline to `last_event + debounce`, capped at
/// `first_event + max_batch` when a cap is set. At the deadline the loop takes everything
/// accumulated so far as one run.
#[derive(Debug)]
struct DebounceState {
    debounce: Duration,
    max_batch: Option<Duration>,
    dirty: bool,
    last_event: Option<Instant>,
    first_event: Option<Instant>,
    pending_paths: BTreeSet<PathBuf>,
    reason: Option<String>,
    force_immediate: bool,
}

impl DebounceState {
    const fn new(debounce: Duration, max_batch: Option<Duration>) -> Self {
        Self {
            debounce,
            max_batch,
            dirty: false,
            last_event: None,
            first_event: None,
            pending_paths: BTreeSet::new(),
            reason: None,
            force_immediate: false,
        }
    }

    fn record_event(&mut self, path: PathBuf, now: Instant) {
        self.pending_paths.insert(path);
        self.last_event = Some(now);
        self.first_event.get_or_insert(now);
        self.reason.get_or_insert_with(|| FS_EVENT_REASON.to_string());
        self.dirty = true;
    }

    fn force_run(&mut self, reason: String) {
        self.reason = Some(reason);
        self.force_immediate = true;
        self.dirty = true;
    }

    fn pending(&self) -> usize {
        self.pending_paths.len()
    }

    fn next_deadline(&self) -> Option<Instant> {
        if !self.dirty {
            return None;
        }
        if self.force_immediate {
            return Some(Instant::now());
        }

        let deadline = self.last_event.map(|last| last + self.debounce);
        match (deadline, self.first_event, self.max_batch) {
            (Some(deadline), Some(first), Some(max_batch)) => Some(deadline.min(first + max_batch)),
            (deadline, _, _) => deadline,
        }
    }

    /// Hand the accumulated work to a run and start counting afresh
    fn begin_run(&mut self) -> RunRequest {
        let request = RunRequest {
            reason: self
                .reason
                .take()
                .unwrap_or_else(|| FS_EVENT_REASON.to_string()),
            paths: std::mem::take(&mut self.pending_paths).into_iter().collect(),
        };
        self.dirty = false;
        self.last_event = None;
        self.first_event = None;
        self.force_immediate = false;
        request
    }
}
