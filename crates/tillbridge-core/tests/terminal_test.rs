#![allow(clippy::unwrap_used)]
// Integration tests for `Terminal` driven against scripted mock backends.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use tillbridge_api::{Channel, Error, MockBackend, TerminalBackend};
use tillbridge_core::token::DEFAULT_TOKEN_ERROR;
use tillbridge_core::{
    BackendKind, Backends, Cart, ConnectionStatus, CoreError, DiscoveryConfig, DiscoveryMethod,
    InternetConnectionConfig, Platform, Reader, ReaderDisplayMessage, ReaderRef,
    SimulatedCardType, SimulatorConfiguration, Terminal, TerminalCallbacks, TerminalConfig,
    TerminalStream, TokenFetchError, UsbConnectionConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

struct Harness {
    terminal: Terminal,
    native: Arc<MockBackend>,
    web: Arc<MockBackend>,
}

fn callbacks() -> TerminalCallbacks {
    TerminalCallbacks::new(|| async { Ok::<_, TokenFetchError>("pst_test_token".to_string()) })
}

fn build(callbacks: TerminalCallbacks) -> Harness {
    let native = Arc::new(MockBackend::new(BackendKind::Native));
    let web = Arc::new(MockBackend::new(BackendKind::Web));
    let terminal = Terminal::new(
        TerminalConfig::new(Platform::Ios),
        Backends::dual(
            Arc::clone(&native) as Arc<dyn TerminalBackend>,
            Arc::clone(&web) as Arc<dyn TerminalBackend>,
        ),
        callbacks,
    )
    .unwrap();
    Harness {
        terminal,
        native,
        web,
    }
}

async fn setup() -> Harness {
    let harness = build(callbacks());
    harness.terminal.initialize().await.unwrap();
    harness
}

fn reader(serial: &str) -> Value {
    json!({ "serialNumber": serial, "deviceType": 0, "status": 1 })
}

async fn next_serials(stream: &mut TerminalStream<Vec<Reader>>) -> Vec<String> {
    stream
        .recv()
        .await
        .unwrap()
        .unwrap()
        .into_iter()
        .map(|r| r.serial_number)
        .collect()
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_uninitialized_operations_fail_without_backend_calls() {
    let harness = build(callbacks());
    let terminal = &harness.terminal;

    let result = terminal
        .process_payment()
        .now_or_never()
        .expect("gate must not suspend");
    assert!(matches!(result, Err(CoreError::NotInitialized)));

    let result = terminal
        .collect_payment_method(None)
        .now_or_never()
        .expect("gate must not suspend");
    assert!(matches!(result, Err(CoreError::NotInitialized)));

    assert!(matches!(
        terminal.discover_readers(DiscoveryConfig::new(DiscoveryMethod::BluetoothScan)),
        Err(CoreError::NotInitialized)
    ));
    assert!(matches!(
        terminal.did_request_reader_input(),
        Err(CoreError::NotInitialized)
    ));

    assert!(harness.native.calls().is_empty());
    assert!(harness.web.calls().is_empty());
}

#[tokio::test]
async fn test_initialize_starts_every_backend_once() {
    let harness = setup().await;
    harness.terminal.initialize().await.unwrap();

    assert!(harness.terminal.is_initialized());
    assert_eq!(harness.native.calls_to("initialize"), 1);
    assert_eq!(harness.web.calls_to("initialize"), 1);
    assert_eq!(harness.terminal.active_backend(), BackendKind::Native);
}

#[tokio::test]
async fn test_failed_initialize_leaves_terminal_gated() {
    let harness = build(callbacks());
    harness
        .web
        .respond("initialize", Err(Error::rejected("SDK failed to load")));

    let err = harness.terminal.initialize().await.unwrap_err();
    assert!(matches!(err, CoreError::Backend(Error::Rejected { .. })));
    assert!(!harness.terminal.is_initialized());
    assert!(matches!(
        harness.terminal.get_connection_status().await,
        Err(CoreError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_mismatched_platform_is_rejected() {
    let native: Arc<dyn TerminalBackend> = Arc::new(MockBackend::new(BackendKind::Native));
    let result = Terminal::new(
        TerminalConfig::new(Platform::Web),
        Backends::native(native),
        callbacks(),
    );
    assert!(matches!(result, Err(CoreError::Config { .. })));
}

// ── Connection tokens ───────────────────────────────────────────────

#[tokio::test]
async fn test_token_request_is_answered() {
    let harness = setup().await;
    harness
        .native
        .emit(Channel::RequestConnectionToken, Value::Null);
    harness.native.wait_for_calls("setConnectionToken", 1).await;

    assert_eq!(
        harness.native.token_deliveries(),
        vec![(Some("pst_test_token".to_string()), None)]
    );
    assert!(harness.web.token_deliveries().is_empty());
}

#[tokio::test]
async fn test_token_failure_without_message_uses_default() {
    let harness = build(TerminalCallbacks::new(|| async {
        Err::<String, _>(TokenFetchError::default())
    }));
    harness.terminal.initialize().await.unwrap();

    harness.web.emit(Channel::RequestConnectionToken, Value::Null);
    harness.web.wait_for_calls("setConnectionToken", 1).await;

    assert_eq!(
        harness.web.token_deliveries(),
        vec![(None, Some(DEFAULT_TOKEN_ERROR.to_string()))]
    );
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_both_discovery_merges_lists() {
    let harness = setup().await;
    let scan = harness.native.hold("discoverReaders");
    harness
        .native
        .script_discovery(vec![vec![reader("A")], vec![reader("A"), reader("B")]]);
    harness.web.script_discovery(vec![vec![reader("C")]]);

    let mut stream = harness
        .terminal
        .discover_readers(DiscoveryConfig::new(DiscoveryMethod::Both).location("tml_1"))
        .unwrap();

    assert_eq!(next_serials(&mut stream).await, ["A"]);
    assert_eq!(next_serials(&mut stream).await, ["A", "B"]);
    assert_eq!(next_serials(&mut stream).await, ["A", "B", "C"]);

    scan.send(Ok(Value::Null)).unwrap();
    assert!(stream.recv().await.is_none());

    let native_call = harness
        .native
        .calls()
        .into_iter()
        .find(|c| c.method == "discoverReaders")
        .unwrap();
    assert_eq!(
        native_call.args,
        json!({ "discoveryMethod": 0, "simulated": false })
    );
    let web_call = harness
        .web
        .calls()
        .into_iter()
        .find(|c| c.method == "discoverReaders")
        .unwrap();
    assert_eq!(
        web_call.args,
        json!({ "discoveryMethod": 2, "simulated": false, "locationId": "tml_1" })
    );
}

#[tokio::test]
async fn test_dropping_discovery_cancels_engaged_backends() {
    let harness = setup().await;
    let _scan = harness.native.hold("discoverReaders");
    let _web_scan = harness.web.hold("discoverReaders");

    let stream = harness
        .terminal
        .discover_readers(DiscoveryConfig::new(DiscoveryMethod::Both))
        .unwrap();
    harness.native.wait_for_calls("discoverReaders", 1).await;
    harness.web.wait_for_calls("discoverReaders", 1).await;

    drop(stream);
    harness.native.wait_for_calls("cancelDiscoverReaders", 1).await;
    harness.web.wait_for_calls("cancelDiscoverReaders", 1).await;

    assert_eq!(harness.native.listener_count(Channel::ReadersDiscovered), 0);
    assert_eq!(harness.web.listener_count(Channel::ReadersDiscovered), 0);
    assert_eq!(
        harness
            .native
            .emit(Channel::ReadersDiscovered, json!({ "readers": [reader("late")] })),
        0
    );
}

#[tokio::test]
async fn test_discovery_error_ends_stream() {
    let harness = setup().await;
    harness.native.respond(
        "discoverReaders",
        Err(Error::rejected("Bluetooth is turned off")),
    );

    let mut stream = harness
        .terminal
        .discover_readers(DiscoveryConfig::new(DiscoveryMethod::BluetoothScan))
        .unwrap();

    let err = stream.recv().await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "Bluetooth is turned off");
    assert!(stream.recv().await.is_none());
    assert_eq!(harness.native.calls_to("cancelDiscoverReaders"), 0);
}

#[tokio::test]
async fn test_internet_discovery_pins_web() {
    let harness = setup().await;
    harness.web.script_discovery(vec![vec![reader("WPE-1")]]);

    let mut stream = harness
        .terminal
        .discover_readers(DiscoveryConfig::new(DiscoveryMethod::Internet))
        .unwrap();
    assert_eq!(harness.terminal.active_backend(), BackendKind::Web);

    assert_eq!(next_serials(&mut stream).await, ["WPE-1"]);
    assert!(stream.recv().await.is_none());
    assert_eq!(harness.native.calls_to("discoverReaders"), 0);
}

#[tokio::test]
async fn test_restarting_discovery_tears_down_previous_session() {
    let harness = setup().await;
    let _first_scan = harness.native.hold("discoverReaders");

    let first = harness
        .terminal
        .discover_readers(DiscoveryConfig::new(DiscoveryMethod::BluetoothScan))
        .unwrap();
    harness.native.wait_for_calls("discoverReaders", 1).await;

    harness.native.script_discovery(vec![vec![reader("B")]]);
    let mut second = harness
        .terminal
        .discover_readers(DiscoveryConfig::new(DiscoveryMethod::BluetoothScan))
        .unwrap();

    assert_eq!(next_serials(&mut second).await, ["B"]);
    assert!(second.recv().await.is_none());
    assert_eq!(harness.native.calls_to("cancelDiscoverReaders"), 1);

    let mut first = first;
    assert!(first.recv().await.is_none());
}

#[tokio::test]
async fn test_cancel_without_discovery_leaves_backends_alone() {
    let harness = setup().await;
    harness.native.respond(
        "cancelDiscoverReaders",
        Err(Error::rejected("not scanning")),
    );

    harness.terminal.cancel_discover_readers().await.unwrap();
    assert_eq!(harness.native.calls_to("cancelDiscoverReaders"), 0);
    assert_eq!(harness.web.calls_to("cancelDiscoverReaders"), 0);
}

#[tokio::test]
async fn test_cancel_discovery_swallows_backend_errors() {
    let harness = setup().await;
    let _scan = harness.native.hold("discoverReaders");
    harness.native.respond(
        "cancelDiscoverReaders",
        Err(Error::rejected("bridge busy")),
    );

    let mut stream = harness
        .terminal
        .discover_readers(DiscoveryConfig::new(DiscoveryMethod::BluetoothScan))
        .unwrap();
    harness.native.wait_for_calls("discoverReaders", 1).await;

    harness.terminal.cancel_discover_readers().await.unwrap();
    assert_eq!(harness.native.calls_to("cancelDiscoverReaders"), 1);
    assert!(stream.recv().await.is_none());
}

// ── Connect & authority ─────────────────────────────────────────────

#[tokio::test]
async fn test_internet_connect_routes_events_from_web() {
    let disconnects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&disconnects);
    let harness = build(callbacks().on_unexpected_reader_disconnect(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    harness.terminal.initialize().await.unwrap();

    let reader = ReaderRef {
        serial_number: "WPE-1".into(),
        ip_address: None,
        stripe_id: Some("tmr_1".into()),
    };
    let connected = harness
        .terminal
        .connect_internet_reader(&reader, &InternetConnectionConfig::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(connected.stripe_id.as_deref(), Some("tmr_1"));
    assert_eq!(harness.terminal.active_backend(), BackendKind::Web);
    assert_eq!(harness.native.calls_to("connectInternetReader"), 0);

    let mut messages = harness.terminal.did_request_reader_display_message().unwrap();
    harness
        .native
        .emit(Channel::DidRequestReaderDisplayMessage, json!({ "value": 1 }));
    harness
        .web
        .emit(Channel::DidRequestReaderDisplayMessage, json!({ "value": 4 }));
    assert_eq!(
        messages.recv().await.unwrap().unwrap(),
        ReaderDisplayMessage::RemoveCard
    );

    harness
        .web
        .emit(Channel::DidReportUnexpectedReaderDisconnect, json!({}));
    while disconnects.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(harness.terminal.active_backend(), BackendKind::Native);
}

#[tokio::test]
async fn test_empty_connect_result_is_none() {
    let harness = setup().await;
    harness
        .native
        .respond("connectUsbReader", Ok(json!({ "reader": {} })));

    let connected = harness
        .terminal
        .connect_usb_reader(&ReaderRef::serial("USB-1"), &UsbConnectionConfig::default())
        .await
        .unwrap();
    assert!(connected.is_none());
    assert_eq!(harness.terminal.active_backend(), BackendKind::Native);
}

#[tokio::test]
async fn test_connection_status_stream_starts_with_current_value() {
    let harness = setup().await;
    let mut statuses = harness.terminal.connection_status().unwrap();
    assert_eq!(
        statuses.recv().await.unwrap().unwrap(),
        ConnectionStatus::NotConnected
    );

    harness
        .native
        .emit(Channel::DidChangeConnectionStatus, json!({ "status": 2 }));
    assert_eq!(
        statuses.recv().await.unwrap().unwrap(),
        ConnectionStatus::Connecting
    );
}

#[tokio::test]
async fn test_inactive_backend_event_does_not_mask_current_status() {
    let harness = setup().await;
    let fetch = harness.native.hold("getConnectionStatus");

    let mut statuses = harness.terminal.connection_status().unwrap();
    harness.native.wait_for_calls("getConnectionStatus", 1).await;
    harness
        .web
        .emit(Channel::DidChangeConnectionStatus, json!({ "status": 2 }));
    fetch.send(Ok(json!({ "status": 1 }))).unwrap();

    let first = tokio::time::timeout(std::time::Duration::from_secs(1), statuses.recv())
        .await
        .expect("current status must be delivered")
        .unwrap()
        .unwrap();
    assert_eq!(first, ConnectionStatus::Connected);
}

// ── Payments ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_collect_is_single_flight() {
    let harness = setup().await;
    let pending = harness.native.hold("collectPaymentMethod");

    let terminal = harness.terminal.clone();
    let first = tokio::spawn(async move { terminal.collect_payment_method(None).await });
    harness.native.wait_for_calls("collectPaymentMethod", 1).await;

    let second = harness.terminal.collect_payment_method(None).await.unwrap();
    assert!(second.is_none());
    assert_eq!(harness.native.calls_to("collectPaymentMethod"), 1);

    pending
        .send(Err(Error::rejected("Card read timed out")))
        .unwrap();
    assert!(first.await.unwrap().is_err());

    let third = harness.terminal.collect_payment_method(None).await.unwrap();
    assert!(third.is_some());
    assert_eq!(harness.native.calls_to("collectPaymentMethod"), 2);
}

#[tokio::test]
async fn test_reader_display_ignored_while_collecting() {
    let harness = setup().await;
    let pending = harness.native.hold("collectPaymentMethod");

    let terminal = harness.terminal.clone();
    let collect = tokio::spawn(async move { terminal.collect_payment_method(None).await });
    harness.native.wait_for_calls("collectPaymentMethod", 1).await;

    let cart = Cart {
        currency: "usd".into(),
        tax: 0,
        total: 500,
        line_items: Vec::new(),
    };
    harness.terminal.set_reader_display(&cart).await.unwrap();
    harness.terminal.clear_reader_display().await.unwrap();
    assert_eq!(harness.native.calls_to("setReaderDisplay"), 0);
    assert_eq!(harness.native.calls_to("clearReaderDisplay"), 0);

    pending.send(Ok(json!({ "intent": { "status": 1 } }))).unwrap();
    collect.await.unwrap().unwrap();

    harness.terminal.set_reader_display(&cart).await.unwrap();
    assert_eq!(harness.native.calls_to("setReaderDisplay"), 1);
}

#[tokio::test]
async fn test_process_payment_decline_exposes_details() {
    let harness = setup().await;
    harness.native.respond(
        "processPayment",
        Err(Error::Rejected {
            message: "Your card has insufficient funds.".into(),
            data: Some(json!({
                "decline_code": "insufficient_funds",
                "payment_intent": { "stripeId": "pi_9", "status": 0 },
            })),
        }),
    );

    let err = harness.terminal.process_payment().await.unwrap_err();
    assert_eq!(err.decline_code(), Some("insufficient_funds"));
    match err {
        CoreError::Payment {
            message,
            payment_intent,
            ..
        } => {
            assert_eq!(message, "Your card has insufficient funds.");
            assert_eq!(payment_intent.unwrap().stripe_id.as_deref(), Some("pi_9"));
        }
        other => panic!("expected payment error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_process_payment_plain_rejection_passes_through() {
    let harness = setup().await;
    harness
        .native
        .respond("processPayment", Err(Error::rejected("Reader disconnected")));

    let err = harness.terminal.process_payment().await.unwrap_err();
    assert!(err.decline_code().is_none());
    match err.backend() {
        Some(Error::Rejected { message, data }) => {
            assert_eq!(message, "Reader disconnected");
            assert!(data.is_none());
        }
        other => panic!("expected pass-through rejection, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_retrieve_then_process() {
    let harness = setup().await;
    let intent = harness
        .terminal
        .retrieve_payment_intent("pi_42_secret_abc")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(intent.stripe_id.as_deref(), Some("pi_42"));
    assert_eq!(intent.currency.as_deref(), Some("usd"));

    let processed = harness.terminal.process_payment().await.unwrap().unwrap();
    assert_eq!(
        processed.status,
        Some(tillbridge_core::PaymentIntentStatus::RequiresCapture)
    );
}

// ── Simulator ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_simulated_card_is_remembered() {
    let harness = setup().await;
    let applied = harness
        .terminal
        .set_simulator_configuration(&SimulatorConfiguration {
            simulated_card: Some(SimulatedCardType::Amex),
            ..SimulatorConfiguration::default()
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(applied.simulated_card, Some(SimulatedCardType::Amex));

    harness
        .native
        .respond("getSimulatorConfiguration", Ok(json!({ "simulatedTipAmount": 300 })));
    let reported = harness
        .terminal
        .get_simulator_configuration()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reported.simulated_card, Some(SimulatedCardType::Amex));
    assert_eq!(reported.simulated_tip_amount, Some(300));
}

#[tokio::test]
async fn test_empty_simulator_configuration_is_none() {
    let harness = setup().await;
    let reported = harness.terminal.get_simulator_configuration().await.unwrap();
    assert!(reported.is_none());
}

// ── Shutdown ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_shutdown_detaches_background_listeners() {
    let harness = setup().await;
    assert_eq!(
        harness.native.listener_count(Channel::RequestConnectionToken),
        1
    );

    harness.terminal.shutdown().await;
    assert_eq!(
        harness.native.listener_count(Channel::RequestConnectionToken),
        0
    );
    assert_eq!(
        harness
            .web
            .listener_count(Channel::DidReportUnexpectedReaderDisconnect),
        0
    );
}

#[tokio::test]
async fn test_shutdown_closes_the_terminal() {
    let harness = setup().await;
    harness.terminal.shutdown().await;

    assert!(matches!(
        harness
            .terminal
            .discover_readers(DiscoveryConfig::new(DiscoveryMethod::BluetoothScan)),
        Err(CoreError::ShutDown)
    ));
    assert!(matches!(
        harness.terminal.get_connection_status().await,
        Err(CoreError::ShutDown)
    ));
    assert!(matches!(
        harness.terminal.initialize().await,
        Err(CoreError::ShutDown)
    ));

    assert_eq!(harness.native.calls_to("discoverReaders"), 0);
    assert_eq!(harness.native.calls_to("getConnectionStatus"), 0);
    assert_eq!(harness.native.calls_to("initialize"), 1);
}
