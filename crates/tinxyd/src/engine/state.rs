use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// Normalized state of one entity as of one poll.
///
/// Never merged field-by-field: a newer value for the same entity replaces the
/// older one wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntityState {
    pub on: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Brightness percentage (0-100), if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
}

/// Last known good state for every reachable entity, keyed by `entity_id`.
pub type StatusSnapshot = HashMap<String, EntityState>;

/// Best-effort per-device details reported by an endpoint.
///
/// Used for device-registry updates; not part of the entity state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// RSSI in dBm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<i64>,
    /// SSID the device is associated with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// What one endpoint returned during one poll cycle.
#[derive(Debug, Clone, Default)]
pub struct EndpointReport {
    pub statuses: StatusSnapshot,
    /// Keyed by vendor `device_id`.
    pub metadata: HashMap<String, DeviceMetadata>,
}

impl EndpointReport {
    pub fn from_statuses(statuses: StatusSnapshot) -> Self {
        Self {
            statuses,
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_state_default() {
        let state = EntityState::default();
        assert!(!state.on);
        assert_eq!(state.status, None);
        assert_eq!(state.brightness, None);
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let state = EntityState {
            on: true,
            status: None,
            brightness: Some(80),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({"on": true, "brightness": 80}));
    }
}
