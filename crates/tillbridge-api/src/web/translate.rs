// ── Browser SDK ↔ bridge shape translation ──
//
// The browser SDK speaks snake_case strings; the rest of the system speaks
// the native bridge's camelCase objects with integer codes. Every string
// table here is an exhaustive match, and a string with no counterpart is an
// `UnmappedValue` error rather than a silent gap.

use serde_json::{Value, json};

use crate::error::Error;
use crate::request::{Cart, CollectConfig};
use crate::wire::{
    BatteryStatus, ConnectionStatus, DeviceType, LocationStatus, PaymentIntentStatus,
    PaymentStatus, ReaderNetworkStatus, SimulatedCardType,
};

use super::sdk::SdkReader;

// ── String tables ───────────────────────────────────────────────────

pub fn device_type(value: &str) -> Result<DeviceType, Error> {
    match value {
        "chipper_2X" => Ok(DeviceType::Chipper2X),
        "verifone_P400" => Ok(DeviceType::VerifoneP400),
        "bbpos_wisepos_e" | "simulated_wisepos_e" => Ok(DeviceType::WisePosE),
        "stripe_s700" => Ok(DeviceType::StripeS700),
        other => Err(Error::unmapped("device type", other)),
    }
}

pub fn reader_status(value: &str) -> Result<ReaderNetworkStatus, Error> {
    match value {
        "online" => Ok(ReaderNetworkStatus::Online),
        "offline" => Ok(ReaderNetworkStatus::Offline),
        other => Err(Error::unmapped("reader network status", other)),
    }
}

pub fn connection_status(value: &str) -> Result<ConnectionStatus, Error> {
    match value {
        "connecting" => Ok(ConnectionStatus::Connecting),
        "connected" => Ok(ConnectionStatus::Connected),
        "not_connected" => Ok(ConnectionStatus::NotConnected),
        other => Err(Error::unmapped("connection status", other)),
    }
}

pub fn payment_status(value: &str) -> Result<PaymentStatus, Error> {
    match value {
        "not_ready" => Ok(PaymentStatus::NotReady),
        "ready" => Ok(PaymentStatus::Ready),
        "waiting_for_input" => Ok(PaymentStatus::WaitingForInput),
        "processing" => Ok(PaymentStatus::Processing),
        other => Err(Error::unmapped("payment status", other)),
    }
}

pub fn payment_intent_status(value: &str) -> Result<PaymentIntentStatus, Error> {
    match value {
        "requires_payment_method" => Ok(PaymentIntentStatus::RequiresPaymentMethod),
        "requires_confirmation" => Ok(PaymentIntentStatus::RequiresConfirmation),
        "requires_capture" => Ok(PaymentIntentStatus::RequiresCapture),
        "processing" => Ok(PaymentIntentStatus::Processing),
        "canceled" => Ok(PaymentIntentStatus::Canceled),
        "succeeded" => Ok(PaymentIntentStatus::Succeeded),
        other => Err(Error::unmapped("payment intent status", other)),
    }
}

/// SDK test payment method name → simulated card.
pub fn simulated_card(value: &str) -> Result<SimulatedCardType, Error> {
    let card = match value {
        "visa" => SimulatedCardType::Visa,
        "visa_debit" => SimulatedCardType::VisaDebit,
        "mastercard" => SimulatedCardType::Mastercard,
        "mastercard_debit" => SimulatedCardType::MasterDebit,
        "mastercard_prepaid" => SimulatedCardType::MastercardPrepaid,
        "amex" => SimulatedCardType::Amex,
        "amex2" => SimulatedCardType::Amex2,
        "discover" => SimulatedCardType::Discover,
        "discover2" => SimulatedCardType::Discover2,
        "diners" => SimulatedCardType::Diners,
        "diners_14digits" => SimulatedCardType::Diners14Digit,
        "jcb" => SimulatedCardType::Jcb,
        "unionpay" => SimulatedCardType::UnionPay,
        "interac" => SimulatedCardType::Interac,
        "charge_declined" => SimulatedCardType::ChargeDeclined,
        "charge_declined_insufficient_funds" => SimulatedCardType::ChargeDeclinedInsufficientFunds,
        "charge_declined_lost_card" => SimulatedCardType::ChargeDeclinedLostCard,
        "charge_declined_stolen_card" => SimulatedCardType::ChargeDeclinedStolenCard,
        "charge_declined_expired_card" => SimulatedCardType::ChargeDeclinedExpiredCard,
        "charge_declined_processing_error" => SimulatedCardType::ChargeDeclinedProcessingError,
        "refund_fail" => SimulatedCardType::RefundFailed,
        other => return Err(Error::unmapped("test payment method", other)),
    };
    Ok(card)
}

/// Simulated card → SDK test payment method name. Total over the enum.
pub fn test_payment_method(card: SimulatedCardType) -> &'static str {
    match card {
        SimulatedCardType::Visa => "visa",
        SimulatedCardType::VisaDebit => "visa_debit",
        SimulatedCardType::Mastercard => "mastercard",
        SimulatedCardType::MasterDebit => "mastercard_debit",
        SimulatedCardType::MastercardPrepaid => "mastercard_prepaid",
        SimulatedCardType::Amex => "amex",
        SimulatedCardType::Amex2 => "amex2",
        SimulatedCardType::Discover => "discover",
        SimulatedCardType::Discover2 => "discover2",
        SimulatedCardType::Diners => "diners",
        SimulatedCardType::Diners14Digit => "diners_14digits",
        SimulatedCardType::Jcb => "jcb",
        SimulatedCardType::UnionPay => "unionpay",
        SimulatedCardType::Interac => "interac",
        SimulatedCardType::ChargeDeclined => "charge_declined",
        SimulatedCardType::ChargeDeclinedInsufficientFunds => "charge_declined_insufficient_funds",
        SimulatedCardType::ChargeDeclinedLostCard => "charge_declined_lost_card",
        SimulatedCardType::ChargeDeclinedStolenCard => "charge_declined_stolen_card",
        SimulatedCardType::ChargeDeclinedExpiredCard => "charge_declined_expired_card",
        SimulatedCardType::ChargeDeclinedProcessingError => "charge_declined_processing_error",
        SimulatedCardType::RefundFailed => "refund_fail",
    }
}

// ── Objects ─────────────────────────────────────────────────────────

/// SDK reader → bridge reader. The browser SDK reports no battery or
/// location-status data, so those are always unknown.
pub fn reader(sdk: &SdkReader, simulated: bool) -> Result<Value, Error> {
    let device_type = sdk
        .device_type
        .as_deref()
        .map_or(Ok(DeviceType::Unknown), device_type)?;
    let status = sdk
        .status
        .as_deref()
        .map_or(Ok(ReaderNetworkStatus::Offline), reader_status)?;
    let location_id = match &sdk.location {
        Some(Value::Object(location)) => location.get("id").cloned().unwrap_or(Value::Null),
        Some(other) => other.clone(),
        None => Value::Null,
    };

    Ok(json!({
        "stripeId": sdk.id,
        "deviceType": device_type,
        "status": status,
        "serialNumber": sdk.serial_number,
        "ipAddress": sdk.ip_address,
        "locationId": location_id,
        "label": sdk.label,
        "deviceSoftwareVersion": sdk.device_sw_version,
        "batteryStatus": BatteryStatus::Unknown,
        "batteryLevel": null,
        "isCharging": null,
        "locationStatus": LocationStatus::Unknown,
        "livemode": sdk.livemode,
        "simulated": simulated,
    }))
}

/// Payment intent API object → bridge intent.
pub fn payment_intent(raw: &Value) -> Result<Value, Error> {
    let status = raw
        .get("status")
        .and_then(Value::as_str)
        .map(payment_intent_status)
        .transpose()?;
    let charges = raw
        .get("charges")
        .and_then(|c| c.get("data"))
        .filter(|data| data.is_array())
        .cloned()
        .unwrap_or_else(|| json!([]));

    Ok(json!({
        "stripeId": raw.get("id"),
        "created": raw.get("created"),
        "status": status,
        "amount": raw.get("amount"),
        "currency": raw.get("currency"),
        "paymentMethod": raw.get("payment_method"),
        "amountDetails": raw.get("amount_details"),
        "charges": charges,
        "metadata": raw.get("metadata"),
    }))
}

/// Location list API response → bridge location list.
pub fn locations(raw: &Value) -> Result<Value, Error> {
    let data = raw
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Deserialization {
            message: "location list has no `data` array".into(),
            body: raw.to_string(),
        })?;

    let locations: Vec<Value> = data
        .iter()
        .map(|location| {
            let address = location.get("address").unwrap_or(&Value::Null);
            json!({
                "stripeId": location.get("id"),
                "displayName": location.get("display_name"),
                "livemode": location.get("livemode"),
                "address": {
                    "city": address.get("city"),
                    "country": address.get("country"),
                    "line1": address.get("line1"),
                    "line2": address.get("line2"),
                    "postalCode": address.get("postal_code"),
                    "state": address.get("state"),
                },
            })
        })
        .collect();

    Ok(json!({
        "locations": locations,
        "hasMore": raw.get("has_more").and_then(Value::as_bool).unwrap_or(false),
    }))
}

pub fn reader_display(cart: &Cart) -> Value {
    let line_items: Vec<Value> = cart
        .line_items
        .iter()
        .map(|item| {
            json!({
                "amount": item.amount,
                "description": item.display_name,
                "quantity": item.quantity,
            })
        })
        .collect();

    json!({
        "type": "cart",
        "cart": {
            "line_items": line_items,
            "currency": cart.currency,
            "tax": cart.tax,
            "total": cart.total,
        },
    })
}

pub fn collect_options(config: Option<&CollectConfig>) -> Value {
    let eligible_amount = config
        .and_then(|c| c.tipping.as_ref())
        .and_then(|t| t.eligible_amount);
    json!({
        "config_override": {
            "update_payment_intent": config.and_then(|c| c.update_payment_intent),
            "skip_tipping": config.and_then(|c| c.skip_tipping),
            "tipping": { "eligible_amount": eligible_amount },
        },
    })
}
