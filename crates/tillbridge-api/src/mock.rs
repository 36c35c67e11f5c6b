//! Scriptable in-process backend.
//!
//! `MockBackend` implements [`TerminalBackend`] without any SDK behind it.
//! It records every call, answers from per-method scripts (falling back to
//! plausible defaults), can hold a call open until the test releases it, and
//! lets the test emit events on any channel. The CLI simulator drives the
//! facade with it as well.
//!
//! ```
//! use serde_json::json;
//! use tillbridge_api::{BackendKind, Channel, MockBackend};
//!
//! let backend = MockBackend::new(BackendKind::Native);
//! backend.script_discovery(vec![vec![json!({ "serialNumber": "CHB-1" })]]);
//! assert_eq!(backend.calls().len(), 0);
//! assert_eq!(backend.emit(Channel::DidStartReaderReconnect, json!({})), 0);
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{Notify, oneshot};
use tracing::trace;

use crate::backend::{BackendKind, TerminalBackend};
use crate::channel::{Channel, EventHub, Listener};
use crate::error::Error;
use crate::request::{
    BluetoothConnectionConfig, Cart, CollectConfig, ConnectRequest, DiscoveryConfig,
    HandoffConnectionConfig, InternetConnectionConfig, ListLocationsParams,
    LocalMobileConnectionConfig, ReaderRef, SimulatorConfiguration, UsbConnectionConfig,
};

type Reply = Result<Value, Error>;

/// One recorded backend invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub method: &'static str,
    pub args: Value,
}

#[derive(Debug)]
pub struct MockBackend {
    kind: BackendKind,
    hub: EventHub,
    calls: Mutex<Vec<MockCall>>,
    call_notify: Notify,
    scripted: DashMap<&'static str, VecDeque<Reply>>,
    gates: DashMap<&'static str, VecDeque<oneshot::Receiver<Reply>>>,
    discovery_batches: Mutex<Vec<Vec<Value>>>,
    token_deliveries: Mutex<Vec<(Option<String>, Option<String>)>>,
    connected: Mutex<Option<Value>>,
    simulator: Mutex<Value>,
}

impl MockBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            hub: EventHub::default(),
            calls: Mutex::new(Vec::new()),
            call_notify: Notify::new(),
            scripted: DashMap::new(),
            gates: DashMap::new(),
            discovery_batches: Mutex::new(Vec::new()),
            token_deliveries: Mutex::new(Vec::new()),
            connected: Mutex::new(None),
            simulator: Mutex::new(json!({})),
        }
    }

    // ── Scripting ───────────────────────────────────────────────────

    /// Queue a reply for the next call to `method` (bridge method name,
    /// e.g. `"processPayment"`). Replies are consumed in order.
    pub fn respond(&self, method: &'static str, reply: Reply) {
        self.scripted.entry(method).or_default().push_back(reply);
    }

    /// Hold the next call to `method` open until the returned sender fires.
    /// Dropping the sender rejects the call.
    pub fn hold(&self, method: &'static str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.gates.entry(method).or_default().push_back(rx);
        tx
    }

    /// Reader lists to report on `readersDiscovered` during every
    /// subsequent `discoverReaders` call, before it resolves.
    pub fn script_discovery(&self, batches: Vec<Vec<Value>>) {
        *lock(&self.discovery_batches) = batches;
    }

    /// Emit an event as the SDK would. Returns how many listeners saw it.
    pub fn emit(&self, channel: Channel, payload: Value) -> usize {
        trace!(kind = %self.kind, %channel, "mock emit");
        self.hub.notify(channel, payload)
    }

    pub fn listener_count(&self, channel: Channel) -> usize {
        self.hub.listener_count(channel)
    }

    // ── Inspection ──────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, method: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    /// Every `(token, error)` pair delivered through `setConnectionToken`.
    pub fn token_deliveries(&self) -> Vec<(Option<String>, Option<String>)> {
        lock(&self.token_deliveries).clone()
    }

    /// Resolve once `method` has been invoked at least `count` times.
    pub async fn wait_for_calls(&self, method: &str, count: usize) {
        loop {
            let notified = self.call_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.calls_to(method) >= count {
                return;
            }
            notified.await;
        }
    }

    // ── Dispatch ────────────────────────────────────────────────────

    async fn invoke(&self, method: &'static str, args: Value, default: Value) -> Reply {
        lock(&self.calls).push(MockCall { method, args });
        self.call_notify.notify_waiters();

        let gate = self
            .gates
            .get_mut(method)
            .and_then(|mut queue| queue.pop_front());
        if let Some(gate) = gate {
            return gate
                .await
                .unwrap_or_else(|_| Err(Error::rejected(format!("{method} abandoned"))));
        }

        let scripted = self
            .scripted
            .get_mut(method)
            .and_then(|mut queue| queue.pop_front());
        scripted.unwrap_or(Ok(default))
    }

    async fn invoke_unit(&self, method: &'static str, args: Value) -> Result<(), Error> {
        self.invoke(method, args, Value::Null).await.map(|_| ())
    }

    async fn connect<C: Serialize + Sync>(
        &self,
        method: &'static str,
        request: ConnectRequest<'_, C>,
    ) -> Reply {
        let args = serde_json::to_value(&request).unwrap_or(Value::Null);
        let reader = json!({ "serialNumber": request.serial_number, "stripeId": request.stripe_id });
        let reply = self.invoke(method, args, json!({ "reader": reader })).await?;
        if let Some(reader) = reply.get("reader").filter(|r| !r.is_null()) {
            *lock(&self.connected) = Some(reader.clone());
        }
        Ok(reply)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_args<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

#[async_trait]
impl TerminalBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn initialize(&self) -> Result<(), Error> {
        self.invoke_unit("initialize", Value::Null).await
    }

    fn add_listener(&self, channel: Channel) -> Listener {
        self.hub.listen(channel)
    }

    async fn set_connection_token(
        &self,
        token: Option<String>,
        error: Option<String>,
    ) -> Result<(), Error> {
        lock(&self.token_deliveries).push((token.clone(), error.clone()));
        self.invoke_unit(
            "setConnectionToken",
            json!({ "token": token, "errorMessage": error }),
        )
        .await
    }

    async fn discover_readers(&self, config: &DiscoveryConfig) -> Result<(), Error> {
        let batches = lock(&self.discovery_batches).clone();
        for readers in batches {
            self.hub
                .notify(Channel::ReadersDiscovered, json!({ "readers": readers }));
        }
        self.invoke_unit("discoverReaders", to_args(config)).await
    }

    async fn cancel_discover_readers(&self) -> Result<(), Error> {
        self.invoke_unit("cancelDiscoverReaders", Value::Null).await
    }

    async fn connect_bluetooth_reader(
        &self,
        reader: &ReaderRef,
        config: &BluetoothConnectionConfig,
    ) -> Reply {
        self.connect("connectBluetoothReader", ConnectRequest::by_serial(reader, config))
            .await
    }

    async fn connect_usb_reader(&self, reader: &ReaderRef, config: &UsbConnectionConfig) -> Reply {
        self.connect("connectUsbReader", ConnectRequest::by_serial(reader, config))
            .await
    }

    async fn connect_handoff_reader(
        &self,
        reader: &ReaderRef,
        config: &HandoffConnectionConfig,
    ) -> Reply {
        self.connect("connectHandoffReader", ConnectRequest::by_serial(reader, config))
            .await
    }

    async fn connect_local_mobile_reader(
        &self,
        reader: &ReaderRef,
        config: &LocalMobileConnectionConfig,
    ) -> Reply {
        self.connect("connectLocalMobileReader", ConnectRequest::by_serial(reader, config))
            .await
    }

    async fn connect_internet_reader(
        &self,
        reader: &ReaderRef,
        config: &InternetConnectionConfig,
    ) -> Reply {
        self.connect("connectInternetReader", ConnectRequest::internet(reader, config))
            .await
    }

    async fn get_connected_reader(&self) -> Reply {
        let reader = lock(&self.connected).clone().unwrap_or(Value::Null);
        self.invoke("getConnectedReader", Value::Null, json!({ "reader": reader }))
            .await
    }

    async fn get_connection_status(&self) -> Reply {
        let status = i32::from(lock(&self.connected).is_some());
        self.invoke("getConnectionStatus", Value::Null, json!({ "status": status }))
            .await
    }

    async fn get_payment_status(&self) -> Reply {
        let status = i32::from(lock(&self.connected).is_some());
        self.invoke("getPaymentStatus", Value::Null, json!({ "status": status }))
            .await
    }

    async fn disconnect_reader(&self) -> Result<(), Error> {
        self.invoke_unit("disconnectReader", Value::Null).await?;
        *lock(&self.connected) = None;
        Ok(())
    }

    async fn install_available_update(&self) -> Result<(), Error> {
        self.invoke_unit("installAvailableUpdate", Value::Null).await
    }

    async fn cancel_install_update(&self) -> Result<(), Error> {
        self.invoke_unit("cancelInstallUpdate", Value::Null).await
    }

    async fn cancel_auto_reconnect(&self) -> Result<(), Error> {
        self.invoke_unit("cancelAutoReconnect", Value::Null).await
    }

    async fn retrieve_payment_intent(&self, client_secret: &str) -> Reply {
        let id = client_secret.split("_secret").next().unwrap_or(client_secret);
        let default = json!({ "intent": { "stripeId": id, "status": 0, "currency": "usd" } });
        self.invoke(
            "retrievePaymentIntent",
            json!({ "clientSecret": client_secret }),
            default,
        )
        .await
    }

    async fn collect_payment_method(&self, config: Option<&CollectConfig>) -> Reply {
        self.invoke(
            "collectPaymentMethod",
            to_args(&config),
            json!({ "intent": { "status": 1 } }),
        )
        .await
    }

    async fn cancel_collect_payment_method(&self) -> Result<(), Error> {
        self.invoke_unit("cancelCollectPaymentMethod", Value::Null).await
    }

    async fn process_payment(&self) -> Reply {
        self.invoke("processPayment", Value::Null, json!({ "intent": { "status": 2 } }))
            .await
    }

    async fn clear_cached_credentials(&self) -> Result<(), Error> {
        self.invoke_unit("clearCachedCredentials", Value::Null).await
    }

    async fn set_reader_display(&self, cart: &Cart) -> Result<(), Error> {
        self.invoke_unit("setReaderDisplay", to_args(cart)).await
    }

    async fn clear_reader_display(&self) -> Result<(), Error> {
        self.invoke_unit("clearReaderDisplay", Value::Null).await
    }

    async fn list_locations(&self, params: &ListLocationsParams) -> Reply {
        self.invoke(
            "listLocations",
            to_args(params),
            json!({ "locations": [], "hasMore": false }),
        )
        .await
    }

    async fn get_simulator_configuration(&self) -> Reply {
        let current = lock(&self.simulator).clone();
        self.invoke("getSimulatorConfiguration", Value::Null, current)
            .await
    }

    async fn set_simulator_configuration(&self, config: &SimulatorConfiguration) -> Reply {
        let args = to_args(config);
        *lock(&self.simulator) = args.clone();
        self.invoke("setSimulatorConfiguration", args.clone(), args)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::wire::DiscoveryMethod;

    #[tokio::test]
    async fn scripted_replies_are_consumed_in_order() {
        let backend = MockBackend::new(BackendKind::Native);
        backend.respond("processPayment", Err(Error::rejected("declined")));

        assert!(backend.process_payment().await.is_err());
        let second = backend.process_payment().await.unwrap();
        assert_eq!(second["intent"]["status"], 2);
        assert_eq!(backend.calls_to("processPayment"), 2);
    }

    #[tokio::test]
    async fn held_calls_wait_for_release() {
        let backend = std::sync::Arc::new(MockBackend::new(BackendKind::Web));
        let release = backend.hold("collectPaymentMethod");

        let task = {
            let backend = backend.clone();
            tokio::spawn(async move { backend.collect_payment_method(None).await })
        };
        backend.wait_for_calls("collectPaymentMethod", 1).await;
        assert!(!task.is_finished());

        release.send(Ok(json!({ "intent": null }))).unwrap();
        let reply = task.await.unwrap().unwrap();
        assert!(reply["intent"].is_null());
    }

    #[tokio::test]
    async fn discovery_reports_scripted_batches() {
        let backend = MockBackend::new(BackendKind::Native);
        backend.script_discovery(vec![vec![json!({ "serialNumber": "A" })]]);
        let mut listener = backend.add_listener(Channel::ReadersDiscovered);

        backend
            .discover_readers(&DiscoveryConfig::new(DiscoveryMethod::BluetoothScan))
            .await
            .unwrap();

        let event = listener.try_recv().unwrap();
        assert_eq!(event["readers"][0]["serialNumber"], "A");
        assert_eq!(backend.calls()[0].args["discoveryMethod"], 0);
    }

    #[tokio::test]
    async fn connect_tracks_the_connected_reader() {
        let backend = MockBackend::new(BackendKind::Native);
        backend
            .connect_usb_reader(&ReaderRef::serial("USB-1"), &UsbConnectionConfig::default())
            .await
            .unwrap();

        let status = backend.get_connection_status().await.unwrap();
        assert_eq!(status["status"], 1);

        backend.disconnect_reader().await.unwrap();
        let reader = backend.get_connected_reader().await.unwrap();
        assert!(reader["reader"].is_null());
    }
}
