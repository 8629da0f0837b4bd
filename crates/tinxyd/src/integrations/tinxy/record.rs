//! Raw vendor catalog records, as returned by `GET v2/devices/`.

use serde::Deserialize;
use serde::Serialize;

/// Deserialize a field that can be either a string or an integer.
///
/// The vendor reports `firmwareVersion` (and several node `/info` fields) as a
/// number for some models and as a string for others.
pub(super) fn deserialize_string_or_int<'de, D>(
    deserializer: D,
) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    struct StringOrInt;

    impl<'de> de::Visitor<'de> for StringOrInt {
        type Value = Option<String>;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("string, integer, or null")
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_string<E>(self, v: String) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v.to_string()))
        }
    }

    deserializer.deserialize_any(StringOrInt)
}

/// One entry of the vendor device catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDeviceRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    pub name: String,

    pub type_id: TypeInfo,

    /// Channel names; empty for single-channel devices.
    #[serde(default)]
    pub devices: Vec<String>,

    /// Per-channel vendor labels, aligned index-for-index with `devices`.
    #[serde(default)]
    pub device_types: Vec<String>,

    #[serde(default)]
    pub mqtt_password: Option<String>,

    #[serde(default)]
    pub uuid_ref: Option<UuidRef>,

    #[serde(default, deserialize_with = "deserialize_string_or_int")]
    pub firmware_version: Option<String>,
}

/// The `typeId` object of a catalog record.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TypeInfo {
    /// Vendor type code, e.g. `WIFI_4SWITCH`.
    pub name: String,

    #[serde(default)]
    pub gtype: String,

    #[serde(default)]
    pub long_name: String,

    #[serde(default)]
    pub traits: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UuidRef {
    #[serde(default)]
    pub uuid: Option<String>,
}

impl RawDeviceRecord {
    pub fn type_code(&self) -> &str {
        &self.type_id.name
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid_ref.as_ref()?.uuid.as_deref()
    }
}
