// ── Canonical wire enumerations ──
//
// Every closed set the two backends exchange travels as a stable integer
// code. Each enum is generated from a single table so the code mapping and
// its inverse can never drift apart. Deserialization accepts the integer
// code (native bridge, canonical JSON) or the variant name (native simulator
// configuration); anything else is an unmapped-value error.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::{self, Visitor};

/// Shared behaviour of every generated wire enum.
pub trait WireEnum: Copy + FromStr + 'static {
    /// Human-readable name of the enumeration, used in error messages.
    const KIND: &'static str;

    fn code(self) -> i64;
    fn from_code(code: i64) -> Option<Self>;
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash,
            strum::Display, strum::EnumString, strum::EnumIter, strum::IntoStaticStr,
        )]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl WireEnum for $name {
            const KIND: &'static str = $kind;

            fn code(self) -> i64 {
                match self {
                    $( Self::$variant => $code ),+
                }
            }

            fn from_code(code: i64) -> Option<Self> {
                match code {
                    $( $code => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_i64(self.code())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(WireVisitor::<Self>(PhantomData))
            }
        }
    };
}

struct WireVisitor<T>(PhantomData<T>);

impl<T: WireEnum> WireVisitor<T> {
    fn lookup<E: de::Error>(code: i64) -> Result<T, E> {
        T::from_code(code).ok_or_else(|| E::custom(format!("unmapped {} value: {code}", T::KIND)))
    }
}

impl<T: WireEnum> Visitor<'_> for WireVisitor<T> {
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a {} code or variant name", T::KIND)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<T, E> {
        Self::lookup(v)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<T, E> {
        let code = i64::try_from(v)
            .map_err(|_| E::custom(format!("unmapped {} value: {v}", T::KIND)))?;
        Self::lookup(code)
    }

    #[allow(clippy::cast_possible_truncation, clippy::as_conversions, clippy::float_cmp)]
    fn visit_f64<E: de::Error>(self, v: f64) -> Result<T, E> {
        // The JS bridge occasionally hands integral codes over as doubles.
        if v.fract() == 0.0 && v.is_finite() {
            Self::lookup(v as i64)
        } else {
            Err(E::custom(format!("unmapped {} value: {v}", T::KIND)))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<T, E> {
        if let Ok(parsed) = T::from_str(v) {
            return Ok(parsed);
        }
        match v.trim().parse::<i64>() {
            Ok(code) => Self::lookup(code),
            Err(_) => Err(E::custom(format!("unmapped {} value: {v}", T::KIND))),
        }
    }
}

// ── Reader & connection ─────────────────────────────────────────────

wire_enum! {
    /// Connection state between the host and a reader.
    pub enum ConnectionStatus: "connection status" {
        NotConnected = 0,
        Connected = 1,
        Connecting = 2,
    }
}

wire_enum! {
    /// Readiness of the connected reader to take a payment.
    pub enum PaymentStatus: "payment status" {
        NotReady = 0,
        Ready = 1,
        WaitingForInput = 2,
        Processing = 3,
    }
}

wire_enum! {
    /// Reader hardware model.
    pub enum DeviceType: "device type" {
        Chipper2X = 0,
        VerifoneP400 = 1,
        WisePad3 = 2,
        StripeM2 = 3,
        WisePosE = 4,
        WisePosEDevKit = 5,
        Unknown = 6,
        StripeS700 = 9,
        AppleBuiltIn = 11,
    }
}

wire_enum! {
    /// How readers are located. `Both` scans Bluetooth natively and the
    /// internet through the browser backend at the same time.
    pub enum DiscoveryMethod: "discovery method" {
        BluetoothScan = 0,
        BluetoothProximity = 1,
        Internet = 2,
        Both = 3,
        Usb = 4,
        Embedded = 5,
        Handoff = 6,
        LocalMobile = 7,
    }
}

wire_enum! {
    pub enum ReaderNetworkStatus: "reader network status" {
        Offline = 0,
        Online = 1,
    }
}

wire_enum! {
    pub enum BatteryStatus: "battery status" {
        Unknown = 0,
        Critical = 1,
        Low = 2,
        Nominal = 3,
    }
}

wire_enum! {
    pub enum LocationStatus: "location status" {
        Unknown = 0,
        Set = 1,
        NotSet = 2,
    }
}

wire_enum! {
    /// Connection style implied by a device type.
    pub enum DeviceStyle: "device style" {
        Internet = 0,
        Bluetooth = 1,
        Local = 2,
    }
}

// ── Prompts ─────────────────────────────────────────────────────────

wire_enum! {
    /// Message the reader asks the host to show the cardholder.
    pub enum ReaderDisplayMessage: "reader display message" {
        RetryCard = 0,
        InsertCard = 1,
        InsertOrSwipeCard = 2,
        SwipeCard = 3,
        RemoveCard = 4,
        MultipleContactlessCardsDetected = 5,
        TryAnotherReadMethod = 6,
        TryAnotherCard = 7,
    }
}

// ── Payments ────────────────────────────────────────────────────────

wire_enum! {
    pub enum PaymentIntentStatus: "payment intent status" {
        RequiresPaymentMethod = 0,
        RequiresConfirmation = 1,
        RequiresCapture = 2,
        Processing = 3,
        Canceled = 4,
        Succeeded = 5,
    }
}

// ── Simulator ───────────────────────────────────────────────────────

wire_enum! {
    /// Test card presented by a simulated reader.
    pub enum SimulatedCardType: "simulated card type" {
        Visa = 0,
        VisaDebit = 1,
        Mastercard = 2,
        MasterDebit = 3,
        MastercardPrepaid = 4,
        Amex = 5,
        Amex2 = 6,
        Discover = 7,
        Discover2 = 8,
        Diners = 9,
        Diners14Digit = 10,
        Jcb = 11,
        UnionPay = 12,
        Interac = 13,
        ChargeDeclined = 14,
        ChargeDeclinedInsufficientFunds = 15,
        ChargeDeclinedLostCard = 16,
        ChargeDeclinedStolenCard = 17,
        ChargeDeclinedExpiredCard = 18,
        ChargeDeclinedProcessingError = 19,
        RefundFailed = 20,
    }
}

wire_enum! {
    /// Software-update behaviour of a simulated reader.
    pub enum SimulateReaderUpdate: "simulated reader update" {
        Available = 0,
        None = 1,
        Required = 2,
        LowBattery = 3,
        Random = 4,
    }
}

// ── Defaults for fields a backend may omit ─────────────────────────

#[allow(clippy::derivable_impls)]
impl Default for DeviceType {
    fn default() -> Self {
        Self::Unknown
    }
}

#[allow(clippy::derivable_impls)]
impl Default for ReaderNetworkStatus {
    fn default() -> Self {
        Self::Offline
    }
}

#[allow(clippy::derivable_impls)]
impl Default for BatteryStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

#[allow(clippy::derivable_impls)]
impl Default for LocationStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

// ── Reader input options ────────────────────────────────────────────

/// Bitmask of the card-presentation methods a reader is accepting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ReaderInputOptions(u8);

impl ReaderInputOptions {
    pub const NONE: Self = Self(0);
    pub const SWIPE_CARD: Self = Self(1);
    pub const INSERT_CARD: Self = Self(2);
    pub const TAP_CARD: Self = Self(4);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build from raw bits; bits outside the known options are dropped.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & 0b111)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for ReaderInputOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ReaderInputOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
