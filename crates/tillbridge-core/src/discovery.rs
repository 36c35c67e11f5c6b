// ── Discovery coordinator ──
//
// Runs one reader-discovery session at a time. A session listens on the
// authoritative backend (and, for `Both`, on the browser SDK as well),
// merges the latest list from each side into every emission, and tears its
// listeners and any in-flight scan down when the stream is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tillbridge_api::{
    BackendKind, Channel, DiscoveryConfig, DiscoveryMethod, Listener, TerminalBackend,
};

use crate::convert::discovered_readers;
use crate::error::CoreError;
use crate::model::Reader;
use crate::selector::Selector;
use crate::session::SessionState;
use crate::stream::TerminalStream;

pub(crate) struct DiscoveryCoordinator {
    selector: Arc<Selector>,
    state: Arc<SessionState>,
    buffer: usize,
    current: Mutex<Option<Session>>,
}

/// Handle on a running session's task.
struct Session {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Session {
    /// Cancel the session and wait for its teardown to finish.
    async fn retire(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            if e.is_panic() {
                warn!(error = %e, "discovery session panicked");
            }
        }
    }
}

impl DiscoveryCoordinator {
    pub(crate) fn new(selector: Arc<Selector>, state: Arc<SessionState>, buffer: usize) -> Self {
        Self {
            selector,
            state,
            buffer: buffer.max(1),
            current: Mutex::new(None),
        }
    }

    /// Start a session, replacing any session that is still running.
    ///
    /// Authority is pinned before this returns. The previous session is fully
    /// torn down before the new scan starts.
    pub(crate) fn start(
        &self,
        config: DiscoveryConfig,
        parent: &CancellationToken,
    ) -> TerminalStream<Vec<Reader>> {
        self.selector.pin(BackendKind::Native);
        if config.discovery_method == DiscoveryMethod::Internet {
            self.selector.pin(BackendKind::Web);
        }

        let primary = Arc::clone(self.selector.active());
        let secondary = if config.discovery_method == DiscoveryMethod::Both {
            self.selector.secondary_web().cloned()
        } else {
            None
        };

        let cancel = parent.child_token();
        let (tx, rx) = mpsc::channel(self.buffer);
        let scan = Scan {
            primary,
            secondary,
            config,
            tx,
            cancel: cancel.clone(),
            selector: Arc::clone(&self.selector),
            state: Arc::clone(&self.state),
        };

        let mut current = lock(&self.current);
        let previous = current.take();
        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                debug!("replacing active discovery session");
                previous.retire().await;
            }
            scan.run().await;
        });
        *current = Some(Session {
            cancel: cancel.clone(),
            task,
        });

        TerminalStream::new(rx, cancel)
    }

    /// Tear the current session down, if any, without touching idle backends.
    pub(crate) async fn stop(&self) {
        let session = lock(&self.current).take();
        if let Some(session) = session {
            session.retire().await;
        }
    }

    /// End the current session. Without one, backends are only told to stop
    /// if a scan is still marked active. Cancellation failures are logged.
    pub(crate) async fn cancel(&self) {
        let session = lock(&self.current).take();
        match session {
            Some(session) => session.retire().await,
            None => cancel_scans(&self.selector, &self.state).await,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Session task ───────────────────────────────────────────────────

struct Scan {
    primary: Arc<dyn TerminalBackend>,
    secondary: Option<Arc<dyn TerminalBackend>>,
    config: DiscoveryConfig,
    tx: mpsc::Sender<Result<Vec<Reader>, CoreError>>,
    cancel: CancellationToken,
    selector: Arc<Selector>,
    state: Arc<SessionState>,
}

enum Outcome {
    /// The primary scan resolved.
    Completed,
    /// The primary scan rejected.
    Failed(CoreError),
    /// An emission could not be normalized.
    Invalid(CoreError),
    /// Stream dropped or session cancelled.
    Cancelled,
}

#[derive(Default)]
struct ReaderLists {
    primary: Vec<Reader>,
    secondary: Vec<Reader>,
}

impl ReaderLists {
    fn merged(&self) -> Vec<Reader> {
        self.primary
            .iter()
            .chain(&self.secondary)
            .cloned()
            .collect()
    }
}

impl Scan {
    #[allow(clippy::too_many_lines)]
    async fn run(self) {
        let Scan {
            primary,
            secondary,
            config,
            tx,
            cancel,
            selector,
            state,
        } = self;

        let mut primary_events = primary.add_listener(Channel::ReadersDiscovered);
        let mut secondary_events = secondary
            .as_ref()
            .map(|web| web.add_listener(Channel::ReadersDiscovered));

        let primary_config = scan_config(&config);
        let secondary_config = DiscoveryConfig {
            discovery_method: DiscoveryMethod::Internet,
            ..config.clone()
        };

        state.set_discovering(true);
        debug!(
            method = %config.discovery_method,
            backend = %primary.kind(),
            merged = secondary.is_some(),
            "reader discovery started"
        );

        let primary_scan = primary.discover_readers(&primary_config);
        tokio::pin!(primary_scan);
        let secondary_scan = async {
            match &secondary {
                Some(web) => web.discover_readers(&secondary_config).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(secondary_scan);
        let mut secondary_running = secondary.is_some();

        let mut lists = ReaderLists::default();
        let outcome = loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break Outcome::Cancelled,

                Some(payload) = primary_events.recv() => {
                    match discovered_readers(payload) {
                        Ok(readers) => lists.primary = readers,
                        Err(e) => break Outcome::Invalid(e),
                    }
                    if tx.send(Ok(lists.merged())).await.is_err() {
                        break Outcome::Cancelled;
                    }
                }

                Some(payload) = next_event(&mut secondary_events) => {
                    match discovered_readers(payload) {
                        Ok(readers) => lists.secondary = readers,
                        Err(e) => break Outcome::Invalid(e),
                    }
                    if tx.send(Ok(lists.merged())).await.is_err() {
                        break Outcome::Cancelled;
                    }
                }

                result = &mut primary_scan => {
                    break match result {
                        Ok(()) => Outcome::Completed,
                        Err(e) => Outcome::Failed(e.into()),
                    };
                }

                result = &mut secondary_scan, if secondary_running => {
                    secondary_running = false;
                    match result {
                        Ok(()) => debug!("secondary reader discovery finished"),
                        Err(e) => warn!(error = %e, "secondary reader discovery failed"),
                    }
                }
            }
        };

        match outcome {
            Outcome::Completed => {
                state.set_discovering(false);
                let queued = drain(&mut primary_events, &mut lists.primary)
                    | drain_opt(&mut secondary_events, &mut lists.secondary);
                if queued {
                    let _ = tx.send(Ok(lists.merged())).await;
                }
                debug!("reader discovery completed");
            }
            Outcome::Failed(err) => {
                state.set_discovering(false);
                debug!(error = %err, "reader discovery failed");
                let _ = tx.send(Err(err)).await;
            }
            Outcome::Invalid(err) => {
                let _ = tx.send(Err(err)).await;
                teardown(primary_events, secondary_events, &selector, &state).await;
            }
            Outcome::Cancelled => {
                teardown(primary_events, secondary_events, &selector, &state).await;
            }
        }
    }
}

/// Config sent to the primary backend. No backend takes the merged mode,
/// and only internet discovery is scoped to a location.
fn scan_config(config: &DiscoveryConfig) -> DiscoveryConfig {
    let mut config = config.clone();
    if config.discovery_method == DiscoveryMethod::Both {
        config.discovery_method = DiscoveryMethod::BluetoothScan;
    }
    if config.discovery_method != DiscoveryMethod::Internet {
        config.location_id = None;
    }
    config
}

async fn next_event(listener: &mut Option<Listener>) -> Option<Value> {
    match listener {
        Some(listener) => listener.recv().await,
        None => std::future::pending().await,
    }
}

/// Apply emissions still queued on `listener`; true if any were.
fn drain(listener: &mut Listener, list: &mut Vec<Reader>) -> bool {
    let mut queued = false;
    while let Some(payload) = listener.try_recv() {
        match discovered_readers(payload) {
            Ok(readers) => {
                *list = readers;
                queued = true;
            }
            Err(e) => warn!(error = %e, "dropping malformed discovery emission"),
        }
    }
    queued
}

fn drain_opt(listener: &mut Option<Listener>, list: &mut Vec<Reader>) -> bool {
    listener
        .as_mut()
        .is_some_and(|listener| drain(listener, list))
}

/// Detach from both backends, then stop any scan still running.
async fn teardown(
    primary_events: Listener,
    secondary_events: Option<Listener>,
    selector: &Selector,
    state: &SessionState,
) {
    drop(primary_events);
    drop(secondary_events);
    cancel_scans(selector, state).await;
}

/// Ask every backend to stop scanning if a scan is active.
async fn cancel_scans(selector: &Selector, state: &SessionState) {
    if !state.is_discovering() {
        return;
    }
    debug!("cancelling reader discovery");
    let cancellations = selector.backends().map(|backend| async move {
        if let Err(e) = backend.cancel_discover_readers().await {
            warn!(backend = %backend.kind(), error = %e, "discovery cancellation failed");
        }
    });
    join_all(cancellations).await;
    state.set_discovering(false);
}
