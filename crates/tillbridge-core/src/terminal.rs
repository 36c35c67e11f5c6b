// ── Terminal facade ──
//
// The single entry point host applications use. Routes every operation to
// the authoritative backend, keeps session state coherent across the two
// SDKs, and hands back canonical model types and streams.

use std::sync::Arc;

use futures_util::future::try_join_all;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tillbridge_api::{
    BackendKind, BluetoothConnectionConfig, Cart, Channel, CollectConfig, DiscoveryConfig,
    HandoffConnectionConfig, InternetConnectionConfig, ListLocationsParams,
    LocalMobileConnectionConfig, ReaderRef, SimulatorConfiguration, TerminalBackend,
    UsbConnectionConfig,
};

use crate::config::TerminalConfig;
use crate::convert;
use crate::discovery::DiscoveryCoordinator;
use crate::error::CoreError;
use crate::model::{
    ConnectionStatus, DeviceStyle, DeviceType, FinishedUpdate, LocationList, PaymentIntent,
    PaymentStatus, Reader, ReaderDisplayMessage, ReaderInputOptions, ReaderSoftwareUpdate,
    SimulatedCardType,
};
use crate::relay::{InitialFetch, relay, relay_with_initial};
use crate::selector::{Backends, Selector};
use crate::session::SessionState;
use crate::stream::TerminalStream;
use crate::token::{ConnectionTokenProvider, spawn_rendezvous};

// ── Host callbacks ───────────────────────────────────────────────

type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Callbacks the host application supplies.
#[derive(Clone)]
pub struct TerminalCallbacks {
    pub fetch_connection_token: Arc<dyn ConnectionTokenProvider>,
    pub on_unexpected_reader_disconnect: DisconnectCallback,
}

impl TerminalCallbacks {
    pub fn new(provider: impl ConnectionTokenProvider + 'static) -> Self {
        Self {
            fetch_connection_token: Arc::new(provider),
            on_unexpected_reader_disconnect: Arc::new(|| {}),
        }
    }

    pub fn on_unexpected_reader_disconnect(
        mut self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.on_unexpected_reader_disconnect = Arc::new(callback);
        self
    }
}

impl std::fmt::Debug for TerminalCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalCallbacks").finish_non_exhaustive()
    }
}

// ── Terminal ─────────────────────────────────────────────────────

/// Payment terminal handle.
///
/// Cheaply cloneable via `Arc<TerminalInner>`. Built uninitialized; every
/// operation except [`initialize()`](Self::initialize) fails with
/// [`CoreError::NotInitialized`] until initialization has succeeded, and
/// with [`CoreError::ShutDown`] after [`shutdown()`](Self::shutdown). Either
/// way it fails before touching any backend.
#[derive(Clone)]
pub struct Terminal {
    inner: Arc<TerminalInner>,
}

struct TerminalInner {
    config: TerminalConfig,
    state: Arc<SessionState>,
    selector: Arc<Selector>,
    discovery: DiscoveryCoordinator,
    callbacks: TerminalCallbacks,
    /// Last simulated card set through the facade, reported when a backend
    /// cannot say which card it simulates.
    simulated_card: Mutex<Option<SimulatedCardType>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    init_lock: Mutex<()>,
}

impl Drop for TerminalInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("platform", &self.inner.config.platform)
            .field("initialized", &self.is_initialized())
            .field("active_backend", &self.active_backend())
            .finish_non_exhaustive()
    }
}

impl Terminal {
    /// Build a terminal over `backends`. Does NOT initialize; call
    /// [`initialize()`](Self::initialize) before use.
    pub fn new(
        config: TerminalConfig,
        backends: Backends,
        callbacks: TerminalCallbacks,
    ) -> Result<Self, CoreError> {
        let state = Arc::new(SessionState::new());
        let selector = Arc::new(Selector::new(
            config.platform,
            backends,
            Arc::clone(&state),
        )?);
        let discovery = DiscoveryCoordinator::new(
            Arc::clone(&selector),
            Arc::clone(&state),
            config.event_buffer,
        );

        Ok(Self {
            inner: Arc::new(TerminalInner {
                config,
                state,
                selector,
                discovery,
                callbacks,
                simulated_card: Mutex::new(None),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                init_lock: Mutex::new(()),
            }),
        })
    }

    /// Build and initialize in one step.
    pub async fn create(
        config: TerminalConfig,
        backends: Backends,
        callbacks: TerminalCallbacks,
    ) -> Result<Self, CoreError> {
        let terminal = Self::new(config, backends, callbacks)?;
        terminal.initialize().await?;
        Ok(terminal)
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Wire up the connection-token rendezvous and the unexpected-disconnect
    /// watcher on every backend, then initialize all backends concurrently.
    ///
    /// Calling it again after success is a no-op. After
    /// [`shutdown()`](Self::shutdown) it fails with [`CoreError::ShutDown`].
    pub async fn initialize(&self) -> Result<(), CoreError> {
        let _init = self.inner.init_lock.lock().await;
        if self.inner.state.is_closed() {
            return Err(CoreError::ShutDown);
        }
        if self.is_initialized() {
            return Ok(());
        }

        {
            let mut handles = self.inner.task_handles.lock().await;
            for backend in self.inner.selector.backends() {
                handles.push(spawn_rendezvous(
                    Arc::clone(backend),
                    Arc::clone(&self.inner.callbacks.fetch_connection_token),
                    self.inner.cancel.child_token(),
                ));
                handles.push(spawn_disconnect_watch(
                    Arc::clone(backend),
                    Arc::clone(&self.inner.state),
                    Arc::clone(&self.inner.callbacks.on_unexpected_reader_disconnect),
                    self.inner.cancel.child_token(),
                ));
            }
        }

        let result = try_join_all(
            self.inner
                .selector
                .backends()
                .map(|backend| backend.initialize()),
        )
        .await;

        if let Err(e) = result {
            warn!(error = %e, "backend initialization failed");
            self.stop_tasks().await;
            return Err(e.into());
        }

        self.inner.state.mark_initialized();
        info!(platform = %self.inner.config.platform, "terminal initialized");
        Ok(())
    }

    /// Stop background tasks and any running discovery. Streams already
    /// handed out end, and every operation fails with
    /// [`CoreError::ShutDown`] from here on.
    pub async fn shutdown(&self) {
        let _init = self.inner.init_lock.lock().await;
        self.inner.state.mark_closed();
        self.inner.discovery.stop().await;
        self.inner.cancel.cancel();
        self.stop_tasks().await;
        debug!("terminal shut down");
    }

    async fn stop_tasks(&self) {
        let handles: Vec<_> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            handle.abort();
            let _ = handle.await;
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.state.is_initialized()
    }

    /// Backend currently treated as authoritative.
    pub fn active_backend(&self) -> BackendKind {
        self.inner.selector.active_kind()
    }

    /// How a reader of `device_type` connects.
    pub fn device_style(device_type: DeviceType) -> DeviceStyle {
        convert::device_style(device_type)
    }

    fn ensure_initialized(&self) -> Result<(), CoreError> {
        self.inner.state.ensure_initialized()
    }

    fn active(&self) -> &Arc<dyn TerminalBackend> {
        self.inner.selector.active()
    }

    fn buffer(&self) -> usize {
        self.inner.config.event_buffer
    }

    // ── Discovery ────────────────────────────────────────────────

    /// Discover readers. Each item is the full, merged list of readers seen
    /// so far. Dropping the stream cancels the scan.
    pub fn discover_readers(
        &self,
        config: DiscoveryConfig,
    ) -> Result<TerminalStream<Vec<Reader>>, CoreError> {
        self.ensure_initialized()?;
        Ok(self.inner.discovery.start(config, &self.inner.cancel))
    }

    pub async fn cancel_discover_readers(&self) -> Result<(), CoreError> {
        self.ensure_initialized()?;
        self.inner.discovery.cancel().await;
        Ok(())
    }

    // ── Connect ──────────────────────────────────────────────────

    pub async fn connect_bluetooth_reader(
        &self,
        reader: &ReaderRef,
        config: &BluetoothConnectionConfig,
    ) -> Result<Option<Reader>, CoreError> {
        self.ensure_initialized()?;
        self.inner.selector.pin(BackendKind::Native);
        let payload = self.active().connect_bluetooth_reader(reader, config).await?;
        convert::reader_result(payload)
    }

    pub async fn connect_usb_reader(
        &self,
        reader: &ReaderRef,
        config: &UsbConnectionConfig,
    ) -> Result<Option<Reader>, CoreError> {
        self.ensure_initialized()?;
        self.inner.selector.pin(BackendKind::Native);
        let payload = self.active().connect_usb_reader(reader, config).await?;
        convert::reader_result(payload)
    }

    pub async fn connect_handoff_reader(
        &self,
        reader: &ReaderRef,
        config: &HandoffConnectionConfig,
    ) -> Result<Option<Reader>, CoreError> {
        self.ensure_initialized()?;
        self.inner.selector.pin(BackendKind::Native);
        let payload = self.active().connect_handoff_reader(reader, config).await?;
        convert::reader_result(payload)
    }

    pub async fn connect_local_mobile_reader(
        &self,
        reader: &ReaderRef,
        config: &LocalMobileConnectionConfig,
    ) -> Result<Option<Reader>, CoreError> {
        self.ensure_initialized()?;
        self.inner.selector.pin(BackendKind::Native);
        let payload = self
            .active()
            .connect_local_mobile_reader(reader, config)
            .await?;
        convert::reader_result(payload)
    }

    /// Connect to an internet reader. Routes to the browser SDK when one is
    /// configured.
    pub async fn connect_internet_reader(
        &self,
        reader: &ReaderRef,
        config: &InternetConnectionConfig,
    ) -> Result<Option<Reader>, CoreError> {
        self.ensure_initialized()?;
        self.inner.selector.pin(BackendKind::Web);
        let payload = self.active().connect_internet_reader(reader, config).await?;
        convert::reader_result(payload)
    }

    #[deprecated(note = "use `connect_internet_reader`")]
    pub async fn connect_reader(
        &self,
        reader: &ReaderRef,
        config: &InternetConnectionConfig,
    ) -> Result<Option<Reader>, CoreError> {
        self.connect_internet_reader(reader, config).await
    }

    // ── Reader state ─────────────────────────────────────────────

    pub async fn get_connected_reader(&self) -> Result<Option<Reader>, CoreError> {
        self.ensure_initialized()?;
        let payload = self.active().get_connected_reader().await?;
        convert::reader_result(payload)
    }

    pub async fn get_connection_status(&self) -> Result<ConnectionStatus, CoreError> {
        self.ensure_initialized()?;
        let payload = self.active().get_connection_status().await?;
        convert::status(payload)
    }

    pub async fn get_payment_status(&self) -> Result<PaymentStatus, CoreError> {
        self.ensure_initialized()?;
        let payload = self.active().get_payment_status().await?;
        convert::status(payload)
    }

    pub async fn disconnect_reader(&self) -> Result<(), CoreError> {
        self.ensure_initialized()?;
        Ok(self.active().disconnect_reader().await?)
    }

    /// Current connection status followed by every change.
    pub fn connection_status(&self) -> Result<TerminalStream<ConnectionStatus>, CoreError> {
        self.ensure_initialized()?;
        let backend = Arc::clone(self.active());
        let initial: InitialFetch = Box::pin(async move { backend.get_connection_status().await });
        Ok(relay_with_initial(
            &self.inner.selector,
            Channel::DidChangeConnectionStatus,
            self.buffer(),
            &self.inner.cancel,
            Some(initial),
            convert::status::<ConnectionStatus>,
        ))
    }

    pub fn did_change_payment_status(&self) -> Result<TerminalStream<PaymentStatus>, CoreError> {
        self.stream(
            Channel::DidChangePaymentStatus,
            convert::status::<PaymentStatus>,
        )
    }

    // ── Updates ──────────────────────────────────────────────────

    pub async fn install_available_update(&self) -> Result<(), CoreError> {
        self.ensure_initialized()?;
        Ok(self.active().install_available_update().await?)
    }

    pub async fn cancel_install_update(&self) -> Result<(), CoreError> {
        self.ensure_initialized()?;
        Ok(self.active().cancel_install_update().await?)
    }

    pub fn did_report_available_update(
        &self,
    ) -> Result<TerminalStream<Option<ReaderSoftwareUpdate>>, CoreError> {
        self.stream(Channel::DidReportAvailableUpdate, convert::software_update)
    }

    pub fn did_start_installing_update(
        &self,
    ) -> Result<TerminalStream<Option<ReaderSoftwareUpdate>>, CoreError> {
        self.stream(Channel::DidStartInstallingUpdate, convert::software_update)
    }

    /// Install progress in `0.0..=1.0`.
    pub fn did_report_reader_software_update_progress(
        &self,
    ) -> Result<TerminalStream<f64>, CoreError> {
        self.stream(Channel::DidReportReaderSoftwareUpdateProgress, |payload| {
            convert::update_progress(&payload)
        })
    }

    pub fn did_finish_installing_update(
        &self,
    ) -> Result<TerminalStream<Option<FinishedUpdate>>, CoreError> {
        self.stream(Channel::DidFinishInstallingUpdate, convert::finished_update)
    }

    // ── Prompts ──────────────────────────────────────────────────

    pub fn did_request_reader_input(
        &self,
    ) -> Result<TerminalStream<ReaderInputOptions>, CoreError> {
        self.stream(Channel::DidRequestReaderInput, |payload| {
            convert::reader_input_options(&payload)
        })
    }

    pub fn did_request_reader_display_message(
        &self,
    ) -> Result<TerminalStream<ReaderDisplayMessage>, CoreError> {
        self.stream(Channel::DidRequestReaderDisplayMessage, |payload| {
            convert::display_message(&payload)
        })
    }

    // ── Reconnect ────────────────────────────────────────────────

    pub fn did_start_reader_reconnect(&self) -> Result<TerminalStream<()>, CoreError> {
        self.stream(Channel::DidStartReaderReconnect, |_| Ok(()))
    }

    pub fn did_succeed_reader_reconnect(&self) -> Result<TerminalStream<()>, CoreError> {
        self.stream(Channel::DidSucceedReaderReconnect, |_| Ok(()))
    }

    pub fn did_fail_reader_reconnect(&self) -> Result<TerminalStream<()>, CoreError> {
        self.stream(Channel::DidFailReaderReconnect, |_| Ok(()))
    }

    pub async fn cancel_auto_reconnect(&self) -> Result<(), CoreError> {
        self.ensure_initialized()?;
        Ok(self.active().cancel_auto_reconnect().await?)
    }

    fn stream<T, F>(&self, channel: Channel, transform: F) -> Result<TerminalStream<T>, CoreError>
    where
        T: Send + 'static,
        F: Fn(Value) -> Result<T, CoreError> + Send + 'static,
    {
        self.ensure_initialized()?;
        Ok(relay(
            &self.inner.selector,
            channel,
            self.buffer(),
            &self.inner.cancel,
            transform,
        ))
    }

    // ── Payments ─────────────────────────────────────────────────

    pub async fn retrieve_payment_intent(
        &self,
        client_secret: &str,
    ) -> Result<Option<PaymentIntent>, CoreError> {
        self.ensure_initialized()?;
        let payload = self.active().retrieve_payment_intent(client_secret).await?;
        convert::intent_result(payload)
    }

    /// Collect a payment method for the retrieved intent.
    ///
    /// Single-flight: while a collection is running, further calls return
    /// `Ok(None)` at once.
    pub async fn collect_payment_method(
        &self,
        config: Option<&CollectConfig>,
    ) -> Result<Option<PaymentIntent>, CoreError> {
        self.ensure_initialized()?;
        let Some(_collecting) = self.inner.state.try_begin_collect() else {
            debug!("payment method collection already running");
            return Ok(None);
        };
        let payload = self.active().collect_payment_method(config).await?;
        convert::intent_result(payload)
    }

    pub async fn cancel_collect_payment_method(&self) -> Result<(), CoreError> {
        self.ensure_initialized()?;
        Ok(self.active().cancel_collect_payment_method().await?)
    }

    /// Process the collected payment.
    ///
    /// A rejection carrying structured decline data surfaces as
    /// [`CoreError::Payment`]; any other rejection passes through as-is.
    pub async fn process_payment(&self) -> Result<Option<PaymentIntent>, CoreError> {
        self.ensure_initialized()?;
        match self.active().process_payment().await {
            Ok(payload) => convert::intent_result(payload),
            Err(err) => Err(payment_error(err)),
        }
    }

    // ── Display ──────────────────────────────────────────────────

    /// Show a cart on the reader. Ignored while a collection is running.
    pub async fn set_reader_display(&self, cart: &Cart) -> Result<(), CoreError> {
        self.ensure_initialized()?;
        if self.inner.state.is_collecting() {
            debug!("reader display update skipped during collection");
            return Ok(());
        }
        Ok(self.active().set_reader_display(cart).await?)
    }

    pub async fn clear_reader_display(&self) -> Result<(), CoreError> {
        self.ensure_initialized()?;
        if self.inner.state.is_collecting() {
            debug!("reader display clear skipped during collection");
            return Ok(());
        }
        Ok(self.active().clear_reader_display().await?)
    }

    // ── Misc ─────────────────────────────────────────────────────

    pub async fn clear_cached_credentials(&self) -> Result<(), CoreError> {
        self.ensure_initialized()?;
        Ok(self.active().clear_cached_credentials().await?)
    }

    pub async fn list_locations(
        &self,
        params: &ListLocationsParams,
    ) -> Result<LocationList, CoreError> {
        self.ensure_initialized()?;
        let payload = self.active().list_locations(params).await?;
        convert::locations(payload)
    }

    pub async fn get_simulator_configuration(
        &self,
    ) -> Result<Option<SimulatorConfiguration>, CoreError> {
        self.ensure_initialized()?;
        let payload = self.active().get_simulator_configuration().await?;
        let mut config = convert::simulator_configuration(payload)?;

        let mut remembered = self.inner.simulated_card.lock().await;
        match config.simulated_card {
            Some(card) => *remembered = Some(card),
            None => config.simulated_card = *remembered,
        }
        Ok(non_empty(config))
    }

    pub async fn set_simulator_configuration(
        &self,
        config: &SimulatorConfiguration,
    ) -> Result<Option<SimulatorConfiguration>, CoreError> {
        self.ensure_initialized()?;
        if let Some(card) = config.simulated_card {
            *self.inner.simulated_card.lock().await = Some(card);
        }

        let payload = self.active().set_simulator_configuration(config).await?;
        let mut applied = convert::simulator_configuration(payload)?;
        if applied.simulated_card.is_none() {
            applied.simulated_card = *self.inner.simulated_card.lock().await;
        }
        Ok(non_empty(applied))
    }
}

fn non_empty(config: SimulatorConfiguration) -> Option<SimulatorConfiguration> {
    (config != SimulatorConfiguration::default()).then_some(config)
}

/// Lift a structured decline into `CoreError::Payment`.
fn payment_error(err: tillbridge_api::Error) -> CoreError {
    let Some((message, data)) = err.structured_rejection() else {
        return CoreError::Backend(err);
    };

    let data = convert::snake_case_keys(data.clone());
    let decline_code = data
        .get("decline_code")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let payment_intent = convert::object_exists(data.get("payment_intent"))
        .cloned()
        .and_then(|intent| match convert::normalize_payment_intent(intent) {
            Ok(intent) => Some(Box::new(intent)),
            Err(e) => {
                warn!(error = %e, "decline carried an unreadable payment intent");
                None
            }
        });

    CoreError::Payment {
        message: message.to_owned(),
        decline_code,
        payment_intent,
    }
}

/// Reset authority to native and tell the host when a backend reports an
/// unexpected reader disconnect.
fn spawn_disconnect_watch(
    backend: Arc<dyn TerminalBackend>,
    state: Arc<SessionState>,
    callback: DisconnectCallback,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let mut events = backend.add_listener(Channel::DidReportUnexpectedReaderDisconnect);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = events.recv() => {
                    if event.is_none() {
                        break;
                    }
                    warn!(backend = %backend.kind(), "reader disconnected unexpectedly");
                    state.select(BackendKind::Native);
                    callback();
                }
            }
        }
    })
}
