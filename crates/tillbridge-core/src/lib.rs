//! Routing and session-coherence layer over the two terminal SDK backends.
//!
//! A host application talks to one [`Terminal`]. Underneath, the terminal
//! drives the native SDK bridge, the browser-hosted SDK, or both at once,
//! and presents them as a single coherent device session:
//!
//! - **[`Terminal`]**: Facade over every terminal operation. Operations are
//!   routed to whichever backend is authoritative; results come back in the
//!   canonical [`model`] shape.
//!
//! - **Backend authority**: Connect operations and discovery pin the
//!   authoritative backend; an unexpected reader disconnect resets it to
//!   native. Only the authoritative backend's events reach a stream.
//!
//! - **[`TerminalStream<T>`]**: Subscription handle for discovery results
//!   and relayed SDK events. Dropping it detaches from the backends and, for
//!   discovery, cancels the scan.
//!
//! - **Connection tokens**: The host's [`ConnectionTokenProvider`] answers
//!   every token request a backend raises; failures are delivered to the
//!   backend rather than left pending.
//!
//! - **Schema normalization** ([`convert`]): Backend payloads are rewritten
//!   to snake_case, JSON-in-string fields are expanded, and placeholder
//!   values are cleared before typed deserialization.

pub mod config;
pub mod convert;
mod discovery;
pub mod error;
pub mod model;
mod relay;
pub mod selector;
pub mod session;
pub mod stream;
pub mod terminal;
pub mod token;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{Platform, TerminalConfig};
pub use error::CoreError;
pub use selector::Backends;
pub use session::SessionState;
pub use stream::TerminalStream;
pub use terminal::{Terminal, TerminalCallbacks};
pub use token::{ConnectionTokenProvider, TokenFetchError};

pub use model::{
    Address, FinishedUpdate, Location, LocationList, PaymentIntent, PaymentMethod, Reader,
    ReaderSoftwareUpdate,
};

// Request types and enumerations callers pass straight through.
pub use tillbridge_api::{
    BackendKind, BatteryStatus, BluetoothConnectionConfig, Cart, CartLineItem, CollectConfig,
    ConnectionStatus, DeviceStyle, DeviceType, DiscoveryConfig, DiscoveryMethod,
    HandoffConnectionConfig, InternetConnectionConfig, ListLocationsParams,
    LocalMobileConnectionConfig, LocationStatus, PaymentIntentStatus, PaymentStatus,
    ReaderDisplayMessage, ReaderInputOptions, ReaderNetworkStatus, ReaderRef,
    SimulateReaderUpdate, SimulatedCardType, SimulatorConfiguration, TippingConfig,
    UsbConnectionConfig,
};
