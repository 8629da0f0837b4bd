//! Canonicalizes vendor state payloads.
//!
//! A `devices_state` entry looks like `{"_id": "...", "state": ...}` where
//! `state` is either one state object or a list of per-channel wrappers of
//! the form `{"number": 2, "state": {"state": "ON", "brightness": 80}}`.

use serde_json::Value;
use tracing::warn;

use crate::engine::EntityState;
use crate::engine::Error;
use crate::engine::Result;
use crate::engine::StatusSnapshot;
use crate::engine::entity::entity_id;

const STATUS_ENDPOINT: &str = "v2/devices_state";

/// Normalize one inner state object (`{"state", "status", "brightness"}`).
///
/// Only the exact string `"ON"` means on. Absent fields stay absent.
pub fn normalize_state(raw: &Value) -> EntityState {
    let on = raw.get("state").and_then(Value::as_str) == Some("ON");

    let status = raw.get("status").and_then(|v| match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    });

    let brightness = raw.get("brightness").and_then(brightness_percent);

    EntityState {
        on,
        status,
        brightness,
    }
}

fn brightness_percent(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(raw.clamp(0.0, 100.0).round() as u8)
}

fn channel_number(item: &Value) -> Option<Result<u32>> {
    let number = item.get("number")?;
    let parsed = match number {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Some(parsed.ok_or_else(|| {
        Error::protocol(STATUS_ENDPOINT, format!("invalid channel number {}", number))
    }))
}

/// Normalize one per-device state entry into `(entity_id, state)` pairs.
///
/// Pairs come out in payload order; callers merging them into a map get
/// last-write-wins for repeated channels.
pub fn normalize(entry: &Value) -> Result<Vec<(String, EntityState)>> {
    let device_id = entry
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::protocol(STATUS_ENDPOINT, "state entry without _id"))?;

    let Some(state) = entry.get("state") else {
        return Ok(Vec::new());
    };

    match state {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let relay_no = match channel_number(item) {
                    Some(number) => number?,
                    None => 1,
                };
                let inner = item.get("state").unwrap_or(&Value::Null);
                out.push((entity_id(device_id, relay_no), normalize_state(inner)));
            }
            Ok(out)
        }
        Value::Object(_) => Ok(vec![(entity_id(device_id, 1), normalize_state(state))]),
        other => Err(Error::protocol(
            STATUS_ENDPOINT,
            format!("device {} has unexpected state {}", device_id, other),
        )),
    }
}

/// Merge a bulk status list into one snapshot, last write wins.
///
/// Malformed entries are logged and skipped.
pub fn aggregate(entries: &[Value]) -> StatusSnapshot {
    let mut snapshot = StatusSnapshot::new();
    for entry in entries {
        match normalize(entry) {
            Ok(pairs) => snapshot.extend(pairs),
            Err(e) => warn!("Skipping state entry: {}", e),
        }
    }
    snapshot
}
