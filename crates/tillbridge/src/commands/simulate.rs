//! Simulator command handlers.
//!
//! Builds a real `Terminal` over scripted `MockBackend`s (native bridge plus
//! browser SDK on mobile platforms, browser SDK alone on `web`) and walks it
//! through discovery or a full checkout.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use tabled::Tabled;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use tillbridge_api::{Channel, MockBackend, TerminalBackend};
use tillbridge_core::{
    BackendKind, Backends, BluetoothConnectionConfig, Cart, CartLineItem, DiscoveryConfig,
    DiscoveryMethod, InternetConnectionConfig, PaymentIntent, Reader, ReaderRef,
    SimulatorConfiguration, Terminal, TerminalCallbacks, TokenFetchError,
};

use crate::cli::{CheckoutArgs, DiscoverArgs, GlobalOpts, SimulateArgs, SimulateCommand};
use crate::config::{self, Settings};
use crate::error::CliError;
use crate::output;

const SIMULATED_TOKEN: &str = "pst_test_simulated";
const SIMULATED_LOCATION: &str = "tml_simulated";

type ScanGate = oneshot::Sender<Result<Value, tillbridge_api::Error>>;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct ReaderRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Type")]
    device_type: String,
    #[tabled(rename = "Style")]
    style: String,
    #[tabled(rename = "Network")]
    network: String,
    #[tabled(rename = "Battery")]
    battery: String,
    #[tabled(rename = "Software")]
    software: String,
    #[tabled(rename = "IP")]
    ip: String,
}

impl From<&Reader> for ReaderRow {
    fn from(r: &Reader) -> Self {
        Self {
            serial: r.serial_number.clone(),
            device_type: r.device_type.to_string(),
            style: r.style().to_string(),
            network: r.status.to_string(),
            battery: battery(r),
            software: r.device_software_version.clone().unwrap_or_else(|| "-".into()),
            ip: r.ip_address.clone().unwrap_or_else(|| "-".into()),
        }
    }
}

fn battery(r: &Reader) -> String {
    r.battery_level
        .map_or_else(|| "-".into(), |level| format!("{:.0}%", level * 100.0))
}

#[derive(Debug, Serialize)]
struct CheckoutSummary {
    backend: BackendKind,
    reader: Reader,
    payment_intent: PaymentIntent,
}

fn checkout_detail(s: &CheckoutSummary) -> String {
    let intent = &s.payment_intent;
    [
        format!("Reader:   {} ({})", s.reader.serial_number, s.reader.device_type),
        format!("Backend:  {}", s.backend),
        format!("Intent:   {}", intent.stripe_id.as_deref().unwrap_or("-")),
        format!(
            "Status:   {}",
            intent.status.map_or_else(|| "-".into(), |status| status.to_string())
        ),
        format!(
            "Amount:   {} {}",
            intent.amount.map_or_else(|| "-".into(), |amount| amount.to_string()),
            intent.currency.as_deref().unwrap_or("")
        ),
        format!(
            "Method:   {}",
            intent
                .payment_method
                .as_ref()
                .and_then(|pm| pm.id())
                .unwrap_or("-")
        ),
        format!("Charges:  {}", intent.charges.len()),
    ]
    .join("\n")
}

// ── Rig ─────────────────────────────────────────────────────────────

/// A terminal wired to mock backends, with scripted readers on each side.
struct Rig {
    terminal: Terminal,
    native: Option<Arc<MockBackend>>,
    web: Arc<MockBackend>,
    per_backend: usize,
}

impl Rig {
    async fn start(settings: &Settings, per_backend: usize) -> Result<Self, CliError> {
        let config = settings.terminal_config();

        let web = Arc::new(MockBackend::new(BackendKind::Web));
        web.script_discovery(vec![internet_readers(per_backend)]);

        let native = config.platform.is_native().then(|| {
            let native = Arc::new(MockBackend::new(BackendKind::Native));
            native.script_discovery(bluetooth_batches(per_backend));
            native
        });

        let backends = match &native {
            Some(native) => Backends::dual(
                Arc::clone(native) as Arc<dyn TerminalBackend>,
                Arc::clone(&web) as Arc<dyn TerminalBackend>,
            ),
            None => Backends::browser(Arc::clone(&web) as Arc<dyn TerminalBackend>),
        };

        let callbacks = TerminalCallbacks::new(|| async {
            Ok::<_, TokenFetchError>(SIMULATED_TOKEN.to_owned())
        })
        .on_unexpected_reader_disconnect(|| warn!("simulated reader disconnected unexpectedly"));

        let terminal = Terminal::create(config, backends, callbacks).await?;
        info!(platform = %settings.platform, "simulated terminal initialized");

        Ok(Self {
            terminal,
            native,
            web,
            per_backend,
        })
    }

    /// Backend that runs the primary scan for `method`.
    fn scanner(&self, method: DiscoveryMethod) -> &Arc<MockBackend> {
        match &self.native {
            Some(native) if method != DiscoveryMethod::Internet => native,
            _ => &self.web,
        }
    }

    /// Readers a complete scan with `method` reports.
    fn expected(&self, method: DiscoveryMethod) -> usize {
        if self.native.is_some() && method == DiscoveryMethod::Both {
            self.per_backend * 2
        } else {
            self.per_backend
        }
    }

    /// Mock behind the currently authoritative backend.
    fn active(&self) -> &Arc<MockBackend> {
        match (self.terminal.active_backend(), &self.native) {
            (BackendKind::Native, Some(native)) => native,
            _ => &self.web,
        }
    }

    /// Run discovery until every scripted reader has been reported, then
    /// let the scan finish and return the final merged list.
    async fn discover(&self, method: DiscoveryMethod) -> Result<Vec<Reader>, CliError> {
        let expected = self.expected(method);
        let mut gate = Some(self.scanner(method).hold("discoverReaders"));
        if expected == 0 {
            finish_scan(&mut gate);
        }

        let mut stream = self
            .terminal
            .discover_readers(DiscoveryConfig::new(method).simulated(true))?;

        let mut readers = Vec::new();
        while let Some(update) = stream.recv().await {
            readers = update?;
            debug!(count = readers.len(), expected, "discovery update");
            if readers.len() >= expected {
                finish_scan(&mut gate);
            }
        }
        Ok(readers)
    }

    /// Have the active backend ask for a connection token, as an SDK does
    /// before its first connect, and wait for the answer.
    async fn exchange_token(&self) {
        let backend = self.active();
        let answered = backend.calls_to("setConnectionToken");
        if backend.emit(Channel::RequestConnectionToken, json!({})) > 0 {
            backend.wait_for_calls("setConnectionToken", answered + 1).await;
            debug!(backend = %backend.kind(), "connection token delivered");
        }
    }

    async fn shutdown(self) {
        self.terminal.shutdown().await;
    }
}

fn finish_scan(gate: &mut Option<ScanGate>) {
    if let Some(gate) = gate.take() {
        let _ = gate.send(Ok(Value::Null));
    }
}

// ── Scripted data ───────────────────────────────────────────────────

/// Cumulative Bluetooth lists, one reader more per emission. The second
/// reader reports the placeholder battery level and software version the
/// native SDK uses before it has read them.
fn bluetooth_batches(count: usize) -> Vec<Vec<Value>> {
    let readers: Vec<Value> = (1..=count)
        .map(|i| {
            let fresh = i % 2 == 1;
            json!({
                "serialNumber": format!("CHB20-SIM-{i:04}"),
                "deviceType": 0,
                "status": 0,
                "batteryStatus": if fresh { 3 } else { 0 },
                "batteryLevel": if fresh { 0.82 } else { 0.0 },
                "isCharging": false,
                "deviceSoftwareVersion": if fresh { "2.01.00.17" } else { "unknown" },
                "locationStatus": 0,
                "simulated": true,
                "livemode": false,
            })
        })
        .collect();
    (1..=readers.len()).map(|n| readers[..n].to_vec()).collect()
}

fn internet_readers(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|i| {
            json!({
                "serialNumber": format!("WPE-SIM-{i:04}"),
                "stripeId": format!("tmr_sim_{i:04}"),
                "deviceType": 4,
                "status": 1,
                "ipAddress": format!("192.168.1.{}", 10 + i),
                "label": format!("Counter {i}"),
                "locationId": SIMULATED_LOCATION,
                "locationStatus": 1,
                "simulated": true,
                "livemode": false,
            })
        })
        .collect()
}

/// Script the payment calls on `backend` the way the SDK answers them for
/// `args.card`.
fn script_payment(backend: &MockBackend, args: &CheckoutArgs, intent_id: &str) {
    let card = format!("{:?}", args.card).to_lowercase();
    let intent = |status: i64| {
        json!({
            "stripeId": intent_id,
            "created": chrono::Utc::now().timestamp(),
            "status": status,
            "amount": args.amount,
            "currency": args.currency,
            "metadata": { "orderRef": "sim-001" },
        })
    };

    backend.respond("retrievePaymentIntent", Ok(json!({ "intent": intent(0) })));

    let mut collected = intent(1);
    collected["paymentMethod"] = json!(format!("pm_sim_{card}"));
    backend.respond("collectPaymentMethod", Ok(json!({ "intent": collected })));

    match args.card.decline_code() {
        Some(code) => backend.respond(
            "processPayment",
            Err(tillbridge_api::Error::Rejected {
                message: "Your card was declined.".into(),
                data: Some(json!({ "declineCode": code, "paymentIntent": intent(0) })),
            }),
        ),
        None => {
            // The native bridge hands expanded objects over as JSON text.
            let method = json!({
                "id": format!("pm_sim_{card}"),
                "cardPresent": { "brand": card, "last4": "4242" },
            });
            let charge = json!({ "id": "ch_sim_0001", "amountCaptured": 0, "paid": true });
            let mut processed = intent(2);
            processed["paymentMethod"] = json!(method.to_string());
            processed["charges"] = json!([charge.to_string()]);
            backend.respond("processPayment", Ok(json!({ "intent": processed })));
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn handle(args: SimulateArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let settings = config::resolve_settings(global)?;
    match args.command {
        SimulateCommand::Discover(args) => discover(&settings, &args, global).await,
        SimulateCommand::Checkout(args) => checkout(&settings, &args, global).await,
    }
}

async fn discover(
    settings: &Settings,
    args: &DiscoverArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let rig = Rig::start(settings, args.readers).await?;
    let result = rig.discover(args.method.into()).await;
    rig.shutdown().await;
    let readers = result?;

    let out = output::render_list(global.output, &readers, |r| ReaderRow::from(r), |r| {
        r.serial_number.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn checkout(
    settings: &Settings,
    args: &CheckoutArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let rig = Rig::start(settings, 1).await?;
    let result = run_checkout(&rig, args).await;
    rig.shutdown().await;
    let summary = result?;

    let out = output::render_single(global.output, &summary, checkout_detail, |s| {
        s.payment_intent.stripe_id.clone().unwrap_or_default()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn run_checkout(rig: &Rig, args: &CheckoutArgs) -> Result<CheckoutSummary, CliError> {
    let terminal = &rig.terminal;
    let method = if args.internet {
        DiscoveryMethod::Internet
    } else {
        DiscoveryMethod::BluetoothScan
    };

    let readers = rig.discover(method).await?;
    let found = readers.into_iter().next().ok_or_else(|| CliError::NoReaders {
        method: method.to_string(),
    })?;
    let reference = ReaderRef {
        serial_number: found.serial_number.clone(),
        ip_address: found.ip_address.clone(),
        stripe_id: found.stripe_id.clone(),
    };

    rig.exchange_token().await;

    // Authority moves with the connect; script the side that will answer.
    let connected = if args.internet {
        rig.web.respond(
            "connectInternetReader",
            Ok(json!({ "reader": serde_json::to_value(&found)? })),
        );
        terminal
            .connect_internet_reader(&reference, &InternetConnectionConfig::default())
            .await?
    } else {
        let config = BluetoothConnectionConfig {
            location_id: SIMULATED_LOCATION.into(),
            auto_reconnect_on_unexpected_disconnect: Some(true),
        };
        rig.scanner(method).respond(
            "connectBluetoothReader",
            Ok(json!({ "reader": serde_json::to_value(&found)? })),
        );
        terminal.connect_bluetooth_reader(&reference, &config).await?
    };
    let reader = connected.ok_or_else(|| CliError::Backend {
        message: format!("connect to {} returned no reader", reference.serial_number),
    })?;
    info!(serial = %reader.serial_number, backend = %terminal.active_backend(), "reader connected");

    terminal
        .set_simulator_configuration(&SimulatorConfiguration {
            simulated_card: Some(args.card.into()),
            ..SimulatorConfiguration::default()
        })
        .await?;

    let intent_id = format!("pi_sim_{}", chrono::Utc::now().timestamp_millis());
    script_payment(rig.active(), args, &intent_id);

    let retrieved = terminal
        .retrieve_payment_intent(&format!("{intent_id}_secret_simulated"))
        .await?;
    debug!(intent = ?retrieved.as_ref().and_then(|i| i.stripe_id.as_deref()), "payment intent retrieved");

    terminal
        .set_reader_display(&Cart {
            currency: args.currency.clone(),
            tax: 0,
            total: args.amount,
            line_items: vec![CartLineItem {
                display_name: "Simulated item".into(),
                quantity: 1,
                amount: args.amount,
            }],
        })
        .await?;

    terminal.collect_payment_method(None).await?;
    info!("payment method collected");

    let payment_intent = terminal.process_payment().await?.ok_or_else(|| CliError::Backend {
        message: "processing returned no payment intent".into(),
    })?;

    Ok(CheckoutSummary {
        backend: terminal.active_backend(),
        reader,
        payment_intent,
    })
}
