//! Canonical entity model.
//!
//! An entity is one independently controllable channel (relay) of a vendor
//! device. Entities are rebuilt from scratch on every catalog sync.

use serde::Deserialize;
use serde::Serialize;
use strum::Display;
use strum::EnumString;

/// Semantic kind assigned by the classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum Kind {
    Switch,
    Light,
    Fan,
    /// Never produced by the classifier; lock behaviour is derived from `gtype`.
    Lock,
}

/// Per-device secrets carried by the vendor catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub mqtt_password: Option<String>,
    pub uuid: Option<String>,
}

impl Credentials {
    /// Build credentials only when the record carried at least one of them.
    pub fn from_parts(mqtt_password: Option<String>, uuid: Option<String>) -> Option<Self> {
        if mqtt_password.is_none() && uuid.is_none() {
            return None;
        }
        Some(Self {
            mqtt_password,
            uuid,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// `"{device_id}-{relay_no}"`, stable across syncs.
    pub entity_id: String,
    pub device_id: String,
    /// 1-based channel index.
    pub relay_no: u32,
    pub name: String,
    /// Kind computed by the classifier.
    pub kind: Kind,
    /// Vendor-provided per-channel label (e.g. `"Fan"`, `"Tubelight"`).
    ///
    /// For single-channel devices this is the classifier kind rendered as text.
    pub user_kind: String,
    pub traits: Vec<String>,
    pub gtype: String,
    pub tinxy_type: String,
    pub long_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

/// Derive the entity identifier for a channel of a device.
pub fn entity_id(device_id: &str, relay_no: u32) -> String {
    format!("{}-{}", device_id, relay_no)
}
