// tillbridge-api: backend capability surface shared by the native bridge and
// the browser terminal SDK adapter.

pub mod backend;
pub mod channel;
pub mod error;
pub mod mock;
pub mod request;
pub mod rest;
pub mod transport;
pub mod web;
pub mod wire;

pub use backend::{BackendKind, TerminalBackend};
pub use channel::{Channel, EventHub, Listener};
pub use error::Error;
pub use mock::{MockBackend, MockCall};
pub use request::{
    BluetoothConnectionConfig, Cart, CartLineItem, CollectConfig, ConnectRequest,
    DiscoveryConfig, HandoffConnectionConfig, InternetConnectionConfig, ListLocationsParams,
    LocalMobileConnectionConfig, ReaderRef, SimulatorConfiguration, TippingConfig,
    UsbConnectionConfig,
};
pub use rest::PaymentsClient;
pub use transport::WebConfig;
pub use web::WebBackend;
pub use wire::{
    BatteryStatus, ConnectionStatus, DeviceStyle, DeviceType, DiscoveryMethod, LocationStatus,
    PaymentIntentStatus, PaymentStatus, ReaderDisplayMessage, ReaderInputOptions,
    ReaderNetworkStatus, SimulateReaderUpdate, SimulatedCardType, WireEnum,
};
