//! Browser-hosted SDK backend.
//!
//! [`WebBackend`] adapts the browser terminal SDK ([`BrowserSdk`]) to the
//! shared [`TerminalBackend`] contract. Capabilities with no browser
//! equivalent (Bluetooth/USB/handoff/local-mobile connects, reader updates,
//! auto-reconnect) log a warning and return a null result. Payment intent
//! retrieval and location listing go straight to the payments REST API
//! through [`PaymentsClient`], authenticated with the last connection token.
//!
//! The SDK asks for connection tokens through [`SdkHooks`]. The adapter
//! parks the request, raises `requestConnectionToken`, and resolves the SDK
//! once `set_connection_token` delivers either a token or an error.

pub mod sdk;
pub mod translate;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::backend::{BackendKind, TerminalBackend};
use crate::channel::{Channel, EventHub, Listener};
use crate::error::Error;
use crate::request::{
    BluetoothConnectionConfig, Cart, CollectConfig, DiscoveryConfig, HandoffConnectionConfig,
    InternetConnectionConfig, ListLocationsParams, LocalMobileConnectionConfig, ReaderRef,
    SimulatorConfiguration, UsbConnectionConfig,
};
use crate::rest::PaymentsClient;

pub use sdk::{BrowserSdk, SdkDiscoveryConfig, SdkHooks, SdkReader, SdkSimulatorConfig};

const NO_TOKEN: &str = "No token found";
const MISSING_CLIENT_SECRET: &str = "No `clientSecret` was found. Make sure to run `retrievePaymentIntent` before running this method.";
const MISSING_PAYMENT_INTENT: &str = "No `paymentIntent` was found. Make sure to run `collectPaymentMethod` before running this method.";

type TokenReply = Result<String, String>;

/// State shared between the adapter and the hooks it hands to the SDK.
#[derive(Debug, Default)]
struct WebShared {
    hub: EventHub,
    connection_token: ArcSwapOption<SecretString>,
    pending_token: Mutex<Option<oneshot::Sender<TokenReply>>>,
}

impl WebShared {
    fn take_pending(&self) -> Option<oneshot::Sender<TokenReply>> {
        self.pending_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn park(&self, tx: oneshot::Sender<TokenReply>) -> Option<oneshot::Sender<TokenReply>> {
        self.pending_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(tx)
    }
}

/// [`TerminalBackend`] over the browser terminal SDK.
pub struct WebBackend {
    sdk: Arc<dyn BrowserSdk>,
    payments: PaymentsClient,
    shared: Arc<WebShared>,
    initialized: AtomicBool,
    simulated: AtomicBool,
    client_secret: ArcSwapOption<String>,
    payment_intent: ArcSwapOption<Value>,
}

impl std::fmt::Debug for WebBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebBackend")
            .field("payments", &self.payments)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl WebBackend {
    pub fn new(sdk: Arc<dyn BrowserSdk>, payments: PaymentsClient) -> Self {
        Self {
            sdk,
            payments,
            shared: Arc::new(WebShared::default()),
            initialized: AtomicBool::new(false),
            simulated: AtomicBool::new(false),
            client_secret: ArcSwapOption::empty(),
            payment_intent: ArcSwapOption::empty(),
        }
    }

    fn ensure_initialized(&self) -> Result<&dyn BrowserSdk, Error> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(self.sdk.as_ref())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn token(&self) -> Result<Arc<SecretString>, Error> {
        self.shared
            .connection_token
            .load_full()
            .ok_or_else(|| Error::TokenUnavailable("no connection token has been issued".into()))
    }

    fn unsupported(capability: &str, availability: &str) {
        warn!("{capability} is only available {availability}");
    }

    fn translate_reader(&self, reader: &SdkReader) -> Result<Value, Error> {
        translate::reader(reader, self.simulated.load(Ordering::Relaxed))
    }
}

// ── SDK callbacks ───────────────────────────────────────────────────

struct WebHooks {
    shared: Arc<WebShared>,
}

#[async_trait]
impl SdkHooks for WebHooks {
    async fn fetch_connection_token(&self) -> Result<String, Error> {
        let (tx, rx) = oneshot::channel();
        if let Some(superseded) = self.shared.park(tx) {
            let _ = superseded.send(Err("superseded by a newer token request".into()));
        }
        debug!("requesting connection token");
        self.shared
            .hub
            .notify(Channel::RequestConnectionToken, Value::Null);

        match rx.await {
            Ok(Ok(token)) => Ok(token),
            Ok(Err(message)) => Err(Error::TokenUnavailable(message)),
            Err(_) => Err(Error::TokenUnavailable("token request abandoned".into())),
        }
    }

    fn unexpected_reader_disconnect(&self) {
        self.shared.hub.notify(
            Channel::DidReportUnexpectedReaderDisconnect,
            json!({ "reader": null }),
        );
    }

    fn connection_status_changed(&self, status: &str) {
        match translate::connection_status(status) {
            Ok(status) => {
                self.shared
                    .hub
                    .notify(Channel::DidChangeConnectionStatus, json!({ "status": status }));
            }
            Err(e) => warn!(error = %e, "dropping connection status change"),
        }
    }

    fn payment_status_changed(&self, status: &str) {
        match translate::payment_status(status) {
            Ok(status) => {
                self.shared
                    .hub
                    .notify(Channel::DidChangePaymentStatus, json!({ "status": status }));
            }
            Err(e) => warn!(error = %e, "dropping payment status change"),
        }
    }
}

// ── Backend contract ────────────────────────────────────────────────

#[async_trait]
impl TerminalBackend for WebBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Web
    }

    async fn initialize(&self) -> Result<(), Error> {
        let hooks = Arc::new(WebHooks {
            shared: Arc::clone(&self.shared),
        });
        self.sdk.create(hooks).await?;
        self.initialized.store(true, Ordering::Release);
        debug!("browser terminal SDK created");
        Ok(())
    }

    fn add_listener(&self, channel: Channel) -> Listener {
        self.shared.hub.listen(channel)
    }

    async fn set_connection_token(
        &self,
        token: Option<String>,
        error: Option<String>,
    ) -> Result<(), Error> {
        let pending = self.shared.take_pending();
        match token.filter(|t| !t.is_empty()) {
            Some(token) => {
                self.shared
                    .connection_token
                    .store(Some(Arc::new(SecretString::from(token.clone()))));
                if let Some(tx) = pending {
                    let _ = tx.send(Ok(token));
                }
            }
            None => {
                let message = error.unwrap_or_else(|| NO_TOKEN.to_owned());
                debug!(%message, "connection token request rejected");
                if let Some(tx) = pending {
                    let _ = tx.send(Err(message));
                }
            }
        }
        Ok(())
    }

    // ── Discovery ───────────────────────────────────────────────────

    async fn discover_readers(&self, config: &DiscoveryConfig) -> Result<(), Error> {
        let sdk = self.ensure_initialized()?;
        self.simulated.store(config.simulated, Ordering::Relaxed);

        let sdk_config = SdkDiscoveryConfig {
            simulated: config.simulated,
            location: config.location_id.clone(),
        };
        let discovered = sdk.discover_readers(&sdk_config).await?;
        let readers = discovered
            .iter()
            .map(|reader| self.translate_reader(reader))
            .collect::<Result<Vec<_>, _>>()?;

        self.shared
            .hub
            .notify(Channel::ReadersDiscovered, json!({ "readers": readers }));
        Ok(())
    }

    async fn cancel_discover_readers(&self) -> Result<(), Error> {
        Ok(())
    }

    // ── Connect ─────────────────────────────────────────────────────

    async fn connect_bluetooth_reader(
        &self,
        _reader: &ReaderRef,
        _config: &BluetoothConnectionConfig,
    ) -> Result<Value, Error> {
        Self::unsupported("connectBluetoothReader", "on iOS and Android");
        Ok(json!({ "reader": null }))
    }

    async fn connect_usb_reader(
        &self,
        _reader: &ReaderRef,
        _config: &UsbConnectionConfig,
    ) -> Result<Value, Error> {
        Self::unsupported("connectUsbReader", "on Android");
        Ok(json!({ "reader": null }))
    }

    async fn connect_handoff_reader(
        &self,
        _reader: &ReaderRef,
        _config: &HandoffConnectionConfig,
    ) -> Result<Value, Error> {
        Self::unsupported("connectHandoffReader", "on Android");
        Ok(json!({ "reader": null }))
    }

    async fn connect_local_mobile_reader(
        &self,
        _reader: &ReaderRef,
        _config: &LocalMobileConnectionConfig,
    ) -> Result<Value, Error> {
        Self::unsupported("connectLocalMobileReader", "on iOS and Android");
        Ok(json!({ "reader": null }))
    }

    async fn connect_internet_reader(
        &self,
        reader: &ReaderRef,
        config: &InternetConnectionConfig,
    ) -> Result<Value, Error> {
        let sdk = self.ensure_initialized()?;
        let Some(ref id) = reader.stripe_id else {
            return Err(Error::rejected("Reader ID missing"));
        };

        let target = SdkReader {
            id: Some(id.clone()),
            object: Some("terminal.reader".into()),
            ip_address: reader.ip_address.clone(),
            serial_number: reader.serial_number.clone(),
            ..SdkReader::default()
        };
        let connected = sdk.connect_reader(&target, config.fail_if_in_use).await?;
        Ok(json!({ "reader": self.translate_reader(&connected)? }))
    }

    // ── Reader state ────────────────────────────────────────────────

    async fn get_connected_reader(&self) -> Result<Value, Error> {
        let sdk = self.ensure_initialized()?;
        let reader = match sdk.connected_reader() {
            Some(reader) => self.translate_reader(&reader)?,
            None => Value::Null,
        };
        Ok(json!({ "reader": reader }))
    }

    async fn get_connection_status(&self) -> Result<Value, Error> {
        let sdk = self.ensure_initialized()?;
        let status = translate::connection_status(&sdk.connection_status())?;
        Ok(json!({ "status": status }))
    }

    async fn get_payment_status(&self) -> Result<Value, Error> {
        let sdk = self.ensure_initialized()?;
        let status = translate::payment_status(&sdk.payment_status())?;
        Ok(json!({ "status": status }))
    }

    async fn disconnect_reader(&self) -> Result<(), Error> {
        self.ensure_initialized()?.disconnect_reader().await
    }

    // ── Updates ─────────────────────────────────────────────────────

    async fn install_available_update(&self) -> Result<(), Error> {
        Self::unsupported("installAvailableUpdate", "for Bluetooth readers");
        Ok(())
    }

    async fn cancel_install_update(&self) -> Result<(), Error> {
        Self::unsupported("cancelInstallUpdate", "for Bluetooth readers");
        Ok(())
    }

    async fn cancel_auto_reconnect(&self) -> Result<(), Error> {
        Self::unsupported("cancelAutoReconnect", "for Bluetooth readers");
        Ok(())
    }

    // ── Payments ────────────────────────────────────────────────────

    async fn retrieve_payment_intent(&self, client_secret: &str) -> Result<Value, Error> {
        self.client_secret
            .store(Some(Arc::new(client_secret.to_owned())));
        let token = self.token()?;
        let raw = self
            .payments
            .retrieve_payment_intent(client_secret, &token)
            .await?;
        Ok(json!({ "intent": translate::payment_intent(&raw)? }))
    }

    async fn collect_payment_method(&self, config: Option<&CollectConfig>) -> Result<Value, Error> {
        let sdk = self.ensure_initialized()?;
        let client_secret = self
            .client_secret
            .load_full()
            .ok_or(Error::MissingState(MISSING_CLIENT_SECRET))?;

        let options = translate::collect_options(config);
        let intent = sdk.collect_payment_method(&client_secret, &options).await?;
        let translated = translate::payment_intent(&intent)?;
        self.payment_intent.store(Some(Arc::new(intent)));
        Ok(json!({ "intent": translated }))
    }

    async fn cancel_collect_payment_method(&self) -> Result<(), Error> {
        self.ensure_initialized()?
            .cancel_collect_payment_method()
            .await
    }

    async fn process_payment(&self) -> Result<Value, Error> {
        let sdk = self.ensure_initialized()?;
        let current = self
            .payment_intent
            .load_full()
            .ok_or(Error::MissingState(MISSING_PAYMENT_INTENT))?;

        let processed = sdk.process_payment(&current).await?;
        Ok(json!({ "intent": translate::payment_intent(&processed)? }))
    }

    // ── Reader display & housekeeping ───────────────────────────────

    async fn clear_cached_credentials(&self) -> Result<(), Error> {
        self.ensure_initialized()?.clear_cached_credentials().await
    }

    async fn set_reader_display(&self, cart: &Cart) -> Result<(), Error> {
        let sdk = self.ensure_initialized()?;
        sdk.set_reader_display(&translate::reader_display(cart))
            .await
    }

    async fn clear_reader_display(&self) -> Result<(), Error> {
        self.ensure_initialized()?.clear_reader_display().await
    }

    async fn list_locations(&self, params: &ListLocationsParams) -> Result<Value, Error> {
        let token = self.token()?;
        let raw = self.payments.list_locations(params, &token).await?;
        translate::locations(&raw)
    }

    // ── Simulator ───────────────────────────────────────────────────

    async fn get_simulator_configuration(&self) -> Result<Value, Error> {
        let sdk = self.ensure_initialized()?;
        let config = sdk.simulator_configuration();
        let card = config
            .test_payment_method
            .as_deref()
            .map(translate::simulated_card)
            .transpose()?;
        Ok(json!({
            "simulatedCard": card,
            "simulatedTipAmount": config.tip_amount,
        }))
    }

    async fn set_simulator_configuration(
        &self,
        config: &SimulatorConfiguration,
    ) -> Result<Value, Error> {
        let sdk = self.ensure_initialized()?;
        sdk.set_simulator_configuration(&SdkSimulatorConfig {
            test_payment_method: config
                .simulated_card
                .map(|card| translate::test_payment_method(card).to_owned()),
            tip_amount: config.simulated_tip_amount,
        });
        Ok(json!({
            "simulatedCard": config.simulated_card,
            "simulatedTipAmount": config.simulated_tip_amount,
        }))
    }
}
