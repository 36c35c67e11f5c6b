// ── Backend-to-domain schema normalization ──
//
// Both backends speak JSON, but with different key casing and with some
// nested values delivered as JSON text. Everything here turns a raw backend
// payload into the canonical snake_case model in `crate::model`.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::trace;

use tillbridge_api::wire::{
    DeviceStyle, DeviceType, ReaderDisplayMessage, ReaderInputOptions, WireEnum,
};
use tillbridge_api::SimulatorConfiguration;

use crate::error::CoreError;
use crate::model::{FinishedUpdate, LocationList, PaymentIntent, Reader, ReaderSoftwareUpdate};

/// Subtrees under this key are host data and keep their keys verbatim.
const METADATA_KEY: &str = "metadata";

/// Prefix of a bare payment-method identifier.
const PAYMENT_METHOD_ID_PREFIX: &str = "pm_";

// ── Key casing ─────────────────────────────────────────────────────

/// Convert one key to snake_case.
///
/// Word boundaries are separators, a lower-case letter or digit followed by
/// an upper-case one, and the last capital of an acronym that starts a new
/// word (`HTMLParser` → `html_parser`). Digits stay attached to the word
/// before them, so `line1` is left alone. Converting an already converted
/// key returns it unchanged.
pub fn snake_case(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }

        if c.is_uppercase() {
            let prev = i.checked_sub(1).and_then(|j| chars.get(j)).copied();
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_numeric() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Recursively rewrite every object key to snake_case, leaving `metadata`
/// subtrees untouched.
pub fn snake_case_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    if key == METADATA_KEY {
                        (key, value)
                    } else {
                        (snake_case(&key), snake_case_keys(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(snake_case_keys).collect()),
        other => other,
    }
}

/// Parse JSON text and normalize its keys.
pub fn parse_json(text: &str) -> Result<Value, CoreError> {
    let value: Value = serde_json::from_str(text)?;
    Ok(snake_case_keys(value))
}

/// `None` for a missing value, `null`, or an object without keys.
pub fn object_exists(value: Option<&Value>) -> Option<&Value> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) if map.is_empty() => None,
        Some(v) => Some(v),
    }
}

// ── Readers ────────────────────────────────────────────────────────

/// Normalize one reader payload.
pub fn normalize_reader(value: Value) -> Result<Reader, CoreError> {
    let mut value = snake_case_keys(value);
    if let Some(obj) = value.as_object_mut() {
        if obj.get("battery_level").and_then(Value::as_f64) == Some(0.0) {
            obj.insert("battery_level".into(), Value::Null);
        }
        if obj.get("device_software_version").and_then(Value::as_str) == Some("unknown") {
            obj.insert("device_software_version".into(), Value::Null);
        }
    }
    Ok(serde_json::from_value(value)?)
}

/// Readers carried by a `readersDiscovered` emission (`{readers: [...]}`).
pub fn discovered_readers(payload: Value) -> Result<Vec<Reader>, CoreError> {
    trace!(payload = %payload, "readers discovered");
    match payload {
        Value::Object(mut obj) => match obj.remove("readers") {
            Some(Value::Array(items)) => items.into_iter().map(normalize_reader).collect(),
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(other) => Err(CoreError::parse(format!(
                "expected a reader list, got: {other}"
            ))),
        },
        Value::Array(items) => items.into_iter().map(normalize_reader).collect(),
        other => Err(CoreError::parse(format!(
            "unexpected discovery payload: {other}"
        ))),
    }
}

/// The reader inside a `{reader: ...}` result, absent when empty.
pub fn reader_result(payload: Value) -> Result<Option<Reader>, CoreError> {
    field_object(payload, "reader")
        .map(normalize_reader)
        .transpose()
}

// ── Payment intents ────────────────────────────────────────────────

/// Normalize a payment intent, expanding fields that arrive as JSON text.
pub fn normalize_payment_intent(value: Value) -> Result<PaymentIntent, CoreError> {
    let mut value = snake_case_keys(value);

    if let Some(obj) = value.as_object_mut() {
        if let Some(text) = string_field(obj, "amount_details") {
            obj.insert("amount_details".into(), parse_json(&text)?);
        }
        if let Some(text) = string_field(obj, "payment_method") {
            if !text.starts_with(PAYMENT_METHOD_ID_PREFIX) {
                obj.insert("payment_method".into(), parse_json(&text)?);
            }
        }
        if let Some(Value::Array(charges)) = obj.get_mut("charges") {
            for charge in charges.iter_mut() {
                if let Value::String(text) = charge {
                    *charge = parse_json(text)?;
                }
            }
        }
    }

    Ok(serde_json::from_value(value)?)
}

/// The intent inside an `{intent: ...}` result, absent when empty.
pub fn intent_result(payload: Value) -> Result<Option<PaymentIntent>, CoreError> {
    field_object(payload, "intent")
        .map(normalize_payment_intent)
        .transpose()
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn field_object(payload: Value, key: &str) -> Option<Value> {
    let Value::Object(mut obj) = payload else {
        return None;
    };
    let inner = obj.remove(key)?;
    object_exists(Some(&inner))?;
    Some(inner)
}

// ── Status and scalar payloads ─────────────────────────────────────

/// The enumeration inside a `{status: ...}` result.
pub fn status<T: DeserializeOwned>(payload: Value) -> Result<T, CoreError> {
    let status = match payload {
        Value::Object(mut obj) => obj.remove("status").unwrap_or(Value::Null),
        other => other,
    };
    Ok(serde_json::from_value(status)?)
}

/// Number carried in `payload[key]`, accepting numeric text the way a
/// lenient float parse would.
fn number(payload: &Value, key: &str) -> Result<f64, CoreError> {
    match payload.get(key) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| CoreError::parse(format!("{key} out of range: {n}"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| CoreError::parse(format!("{key} is not numeric: {s:?}"))),
        other => Err(CoreError::parse(format!(
            "missing numeric {key}: {}",
            other.unwrap_or(&Value::Null)
        ))),
    }
}

/// Input options requested by the reader.
///
/// Android reports a display string such as `"Swipe / Insert / Tap"`; every
/// other backend reports the bitmask directly.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub fn reader_input_options(payload: &Value) -> Result<ReaderInputOptions, CoreError> {
    if payload.get("isAndroid").and_then(Value::as_bool) == Some(true) {
        let text = payload.get("value").and_then(Value::as_str).unwrap_or_default();
        let mut options = ReaderInputOptions::NONE;
        for part in text.split('/').map(str::trim) {
            match part {
                "Swipe" => options |= ReaderInputOptions::SWIPE_CARD,
                "Insert" => options |= ReaderInputOptions::INSERT_CARD,
                "Tap" => options |= ReaderInputOptions::TAP_CARD,
                _ => {}
            }
        }
        return Ok(options);
    }

    let bits = number(payload, "value")?;
    if !(0.0..=255.0).contains(&bits) {
        return Err(CoreError::parse(format!("reader input out of range: {bits}")));
    }
    Ok(ReaderInputOptions::from_bits_truncate(bits as u8))
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn display_message(payload: &Value) -> Result<ReaderDisplayMessage, CoreError> {
    let code = number(payload, "value")?;
    ReaderDisplayMessage::from_code(code as i64).ok_or_else(|| {
        CoreError::parse(format!("unmapped {} value: {code}", ReaderDisplayMessage::KIND))
    })
}

pub fn update_progress(payload: &Value) -> Result<f64, CoreError> {
    number(payload, "progress")
}

pub fn software_update(payload: Value) -> Result<Option<ReaderSoftwareUpdate>, CoreError> {
    field_object(payload, "update")
        .map(|update| serde_json::from_value(snake_case_keys(update)).map_err(CoreError::from))
        .transpose()
}

pub fn finished_update(payload: Value) -> Result<Option<FinishedUpdate>, CoreError> {
    if object_exists(Some(&payload)).is_none() {
        return Ok(None);
    }
    let mut finished: FinishedUpdate = serde_json::from_value(snake_case_keys(payload))?;
    if finished
        .update
        .as_ref()
        .is_some_and(|u| *u == ReaderSoftwareUpdate::default())
    {
        finished.update = None;
    }
    Ok(Some(finished))
}

// ── Locations ──────────────────────────────────────────────────────

pub fn locations(payload: Value) -> Result<LocationList, CoreError> {
    if object_exists(Some(&payload)).is_none() {
        return Ok(LocationList::default());
    }
    Ok(serde_json::from_value(snake_case_keys(payload))?)
}

// ── Simulator ──────────────────────────────────────────────────────

/// Simulator configuration as a backend reports it. The bridge shape is
/// already canonical, so keys are not rewritten.
pub fn simulator_configuration(payload: Value) -> Result<SimulatorConfiguration, CoreError> {
    match payload {
        Value::Object(_) => Ok(serde_json::from_value(payload)?),
        _ => Ok(SimulatorConfiguration::default()),
    }
}

// ── Device style ───────────────────────────────────────────────────

/// How a reader of this type connects.
pub fn device_style(device_type: DeviceType) -> DeviceStyle {
    match device_type {
        DeviceType::Chipper2X | DeviceType::StripeM2 | DeviceType::WisePad3 => {
            DeviceStyle::Bluetooth
        }
        DeviceType::AppleBuiltIn => DeviceStyle::Local,
        _ => DeviceStyle::Internet,
    }
}
