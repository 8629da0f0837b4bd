//! Expands vendor catalog records into per-channel entities.

use serde_json::Value;
use tracing::debug;
use tracing::warn;

use super::classify::classify;
use super::record::RawDeviceRecord;
use crate::engine::Catalog;
use crate::engine::Credentials;
use crate::engine::Device;
use crate::engine::Entity;
use crate::engine::Error;
use crate::engine::Kind;
use crate::engine::Result;
use crate::engine::entity::entity_id;

pub const MANUFACTURER: &str = "Tinxy.in";

/// Single-channel bulb type, always exposed as a light.
pub const BULB_TYPE: &str = "EVA_BULB";

/// Vendor type codes that produce entities. Anything else is skipped.
pub const ALLOWLIST: &[&str] = &[
    "Dimmable Light",
    "EM_DOOR_LOCK",
    "EVA_BULB",
    "Fan",
    "WIFI_2SWITCH_V1",
    "WIFI_2SWITCH_V3",
    "WIFI_3SWITCH_1FAN",
    "WIFI_3SWITCH_1FAN_V3",
    "WIFI_4DIMMER",
    "WIFI_4SWITCH",
    "WIFI_4SWITCH_V2",
    "WIFI_4SWITCH_V3",
    "WIFI_6SWITCH_V1",
    "WIFI_6SWITCH_V3",
    "WIFI_BULB_WHITE_V1",
    "WIFI_SWITCH",
    "WIFI_SWITCH_1FAN_V1",
    "WIFI_SWITCH_V2",
    "WIFI_SWITCH_V3",
    "WIRED_DOOR_LOCK",
    "WIRED_DOOR_LOCK_V2",
    "WIRED_DOOR_LOCK_V3",
];

const CATALOG_ENDPOINT: &str = "v2/devices";

pub fn is_supported(tinxy_type: &str) -> bool {
    ALLOWLIST.contains(&tinxy_type)
}

fn credentials(record: &RawDeviceRecord) -> Option<Credentials> {
    Credentials::from_parts(
        record.mqtt_password.clone(),
        record.uuid().map(str::to_string),
    )
}

fn entity(
    record: &RawDeviceRecord,
    relay_no: u32,
    name: String,
    kind: Kind,
    user_kind: String,
    credentials: Option<Credentials>,
) -> Entity {
    Entity {
        entity_id: entity_id(&record.id, relay_no),
        device_id: record.id.clone(),
        relay_no,
        name,
        kind,
        user_kind,
        traits: record.type_id.traits.clone(),
        gtype: record.type_id.gtype.clone(),
        tinxy_type: record.type_id.name.clone(),
        long_description: record.type_id.long_name.clone(),
        credentials,
    }
}

/// Turn one catalog record into zero or more entities.
///
/// Unsupported types yield an empty list. A multi-channel record whose
/// `deviceTypes` is shorter than `devices` is a protocol error.
pub fn parse_record(record: &RawDeviceRecord) -> Result<Vec<Entity>> {
    let tinxy_type = record.type_code();

    if !is_supported(tinxy_type) {
        debug!(
            device_id = %record.id,
            tinxy_type,
            "Skipping device with unsupported type"
        );
        return Ok(Vec::new());
    }

    if record.devices.is_empty() {
        if tinxy_type == BULB_TYPE {
            let kind = Kind::Light;
            return Ok(vec![entity(
                record,
                1,
                record.name.clone(),
                kind,
                kind.to_string(),
                None,
            )]);
        }

        let kind = classify(tinxy_type, 0);
        return Ok(vec![entity(
            record,
            1,
            record.name.clone(),
            kind,
            kind.to_string(),
            credentials(record),
        )]);
    }

    if record.device_types.len() < record.devices.len() {
        return Err(Error::protocol(
            CATALOG_ENDPOINT,
            format!(
                "device {} lists {} channels but only {} channel types",
                record.id,
                record.devices.len(),
                record.device_types.len()
            ),
        ));
    }

    let creds = credentials(record);
    let entities = record
        .devices
        .iter()
        .zip(&record.device_types)
        .enumerate()
        .map(|(index, (channel, user_kind))| {
            entity(
                record,
                (index + 1) as u32,
                format!("{} {}", record.name, channel),
                classify(tinxy_type, index),
                user_kind.clone(),
                creds.clone(),
            )
        })
        .collect();

    Ok(entities)
}

fn device_for(record: &RawDeviceRecord, entities: &[Entity]) -> Device {
    let mut device = Device::new(record.id.clone(), record.name.clone());
    device.manufacturer = Some(MANUFACTURER.to_string());
    if !record.type_id.long_name.is_empty() {
        device.model = Some(record.type_id.long_name.clone());
    }
    device.sw_version = record.firmware_version.clone();
    device.credentials = credentials(record);
    for entity in entities {
        device.add_entity(entity.entity_id.clone());
    }
    device
}

/// Build a catalog from the raw `GET v2/devices/` response.
///
/// Records that fail to decode or parse are logged and skipped; the rest of
/// the catalog is still produced.
pub fn parse_catalog(records: Vec<Value>) -> Catalog {
    let mut entities = Vec::new();
    let mut devices = Vec::new();

    for (index, value) in records.into_iter().enumerate() {
        let record: RawDeviceRecord = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(e) => {
                let err = Error::protocol(CATALOG_ENDPOINT, format!("record {}: {}", index, e));
                warn!("Skipping catalog record: {}", err);
                continue;
            }
        };

        match parse_record(&record) {
            Ok(parsed) if parsed.is_empty() => {}
            Ok(parsed) => {
                devices.push(device_for(&record, &parsed));
                entities.extend(parsed);
            }
            Err(e) => warn!("Skipping catalog record: {}", e),
        }
    }

    Catalog::new(entities, devices)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> RawDeviceRecord {
        serde_json::from_value(value).unwrap()
    }

    fn summary(catalog: &Catalog) -> String {
        catalog
            .entities()
            .iter()
            .map(|e| format!("{} {} [{}/{}] {}", e.entity_id, e.name, e.kind, e.user_kind, e.gtype))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_four_switch_record() {
        let rec = record(json!({
            "_id": "D1",
            "name": "Hall",
            "typeId": {
                "name": "WIFI_4SWITCH",
                "gtype": "action.devices.types.SWITCH",
                "long_name": "Tinxy 4 Node",
                "traits": ["action.devices.traits.OnOff"]
            },
            "devices": ["Light", "Fan", "Socket", "TV"],
            "deviceTypes": ["Tubelight", "Fan", "Socket", "TV"],
            "mqttPassword": "pw",
            "uuidRef": {"uuid": "u-1"}
        }));

        let entities = parse_record(&rec).unwrap();
        assert_eq!(entities.len(), 4);
        let ids: Vec<_> = entities.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["D1-1", "D1-2", "D1-3", "D1-4"]);
        let relays: Vec<_> = entities.iter().map(|e| e.relay_no).collect();
        assert_eq!(relays, vec![1, 2, 3, 4]);
        assert_eq!(entities[0].name, "Hall Light");
        assert_eq!(entities[0].kind, Kind::Switch);
        assert_eq!(entities[0].user_kind, "Tubelight");
        assert_eq!(entities[1].user_kind, "Fan");
        for e in &entities {
            let creds = e.credentials.as_ref().unwrap();
            assert_eq!(creds.mqtt_password.as_deref(), Some("pw"));
            assert_eq!(creds.uuid.as_deref(), Some("u-1"));
            assert_eq!(e.long_description, "Tinxy 4 Node");
        }
    }

    #[test]
    fn test_fan_record_keeps_both_kinds() {
        let rec = record(json!({
            "_id": "F1",
            "name": "Bedroom",
            "typeId": {"name": "WIFI_3SWITCH_1FAN", "gtype": "action.devices.types.SWITCH"},
            "devices": ["Fan", "Light", "Socket", "Lamp"],
            "deviceTypes": ["Fan", "Tubelight", "Socket", "LED Bulb"]
        }));

        let entities = parse_record(&rec).unwrap();
        assert_eq!(entities[0].kind, Kind::Fan);
        assert_eq!(entities[1].kind, Kind::Switch);
        assert_eq!(entities[1].user_kind, "Tubelight");
        assert_eq!(entities[3].kind, Kind::Switch);
        assert_eq!(entities[3].user_kind, "LED Bulb");
        assert!(entities.iter().all(|e| e.credentials.is_none()));
    }

    #[test]
    fn test_single_channel_generic() {
        let rec = record(json!({
            "_id": "S1",
            "name": "Geyser",
            "typeId": {"name": "WIFI_SWITCH"},
            "devices": [],
            "mqttPassword": "pw"
        }));

        let entities = parse_record(&rec).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_id, "S1-1");
        assert_eq!(entities[0].relay_no, 1);
        assert_eq!(entities[0].name, "Geyser");
        assert_eq!(entities[0].kind, Kind::Switch);
        assert_eq!(entities[0].user_kind, "Switch");
        let creds = entities[0].credentials.as_ref().unwrap();
        assert_eq!(creds.mqtt_password.as_deref(), Some("pw"));
        assert_eq!(creds.uuid, None);
    }

    #[test]
    fn test_single_channel_fan() {
        let rec = record(json!({"_id": "F2", "name": "Ceiling", "typeId": {"name": "Fan"}}));
        let entities = parse_record(&rec).unwrap();
        assert_eq!(entities[0].kind, Kind::Fan);
        assert_eq!(entities[0].user_kind, "Fan");
    }

    #[test]
    fn test_bulb_is_always_light() {
        let rec = record(json!({
            "_id": "B1",
            "name": "Porch",
            "typeId": {"name": "EVA_BULB", "gtype": "action.devices.types.LIGHT"},
            "mqttPassword": "pw",
            "uuidRef": {"uuid": "u-2"}
        }));

        let entities = parse_record(&rec).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].entity_id, "B1-1");
        assert_eq!(entities[0].kind, Kind::Light);
        assert_eq!(entities[0].user_kind, "Light");
        assert_eq!(entities[0].credentials, None);
    }

    #[test]
    fn test_unsupported_types_yield_nothing() {
        let single = record(json!({"_id": "H1", "name": "Hub", "typeId": {"name": "EVA_HUB"}}));
        assert!(parse_record(&single).unwrap().is_empty());

        let multi = record(json!({
            "_id": "X1",
            "name": "Mystery",
            "typeId": {"name": "WIFI_8SWITCH_V9"},
            "devices": ["A", "B"],
            "deviceTypes": ["Socket", "Socket"]
        }));
        assert!(parse_record(&multi).unwrap().is_empty());
    }

    #[test]
    fn test_short_device_types_is_protocol_error() {
        let rec = record(json!({
            "_id": "D2",
            "name": "Kitchen",
            "typeId": {"name": "WIFI_2SWITCH_V1"},
            "devices": ["A", "B"],
            "deviceTypes": ["Socket"]
        }));

        let err = parse_record(&rec).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(err.to_string().contains("D2"));
    }

    #[test]
    fn test_identifiers_are_stable() {
        let value = json!({
            "_id": "D3",
            "name": "Study",
            "typeId": {"name": "WIFI_2SWITCH_V3"},
            "devices": ["Lamp", "Fan"],
            "deviceTypes": ["LED Bulb", "Fan"]
        });
        let first = parse_record(&record(value.clone())).unwrap();
        let second = parse_record(&record(value)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_catalog_skips_bad_records() {
        let catalog = parse_catalog(vec![
            json!({
                "_id": "D1",
                "name": "Hall",
                "typeId": {"name": "WIFI_2SWITCH_V1", "gtype": "action.devices.types.SWITCH"},
                "devices": ["Light", "Fan"],
                "deviceTypes": ["Tubelight", "Fan"]
            }),
            json!({"name": "no id or type"}),
            json!({
                "_id": "D2",
                "name": "Broken",
                "typeId": {"name": "WIFI_2SWITCH_V1"},
                "devices": ["A", "B"],
                "deviceTypes": []
            }),
            json!({"_id": "H1", "name": "Hub", "typeId": {"name": "EVA_HUB"}}),
            json!({
                "_id": "L1",
                "name": "Front Door",
                "typeId": {"name": "WIRED_DOOR_LOCK", "gtype": "action.devices.types.LOCK"}
            }),
            json!({
                "_id": "B1",
                "name": "Porch",
                "typeId": {"name": "EVA_BULB", "gtype": "action.devices.types.LIGHT"}
            }),
        ]);

        insta::assert_snapshot!(summary(&catalog), @r"
        D1-1 Hall Light [Switch/Tubelight] action.devices.types.SWITCH
        D1-2 Hall Fan [Switch/Fan] action.devices.types.SWITCH
        L1-1 Front Door [Switch/Switch] action.devices.types.LOCK
        B1-1 Porch [Light/Light] action.devices.types.LIGHT
        ");

        let ids: Vec<_> = catalog.devices().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["D1", "L1", "B1"]);
        assert_eq!(catalog.locks().len(), 1);
        assert_eq!(catalog.lights().len(), 1);
    }

    #[test]
    fn test_device_registry_entry() {
        let catalog = parse_catalog(vec![json!({
            "_id": "D1",
            "name": "Hall",
            "typeId": {"name": "WIFI_2SWITCH_V1", "long_name": "Tinxy 2 Node"},
            "devices": ["Light", "Fan"],
            "deviceTypes": ["Tubelight", "Fan"],
            "firmwareVersion": 42,
            "mqttPassword": "pw",
            "uuidRef": {"uuid": "u-1"}
        })]);

        let device = catalog.device("D1").unwrap();
        assert_eq!(device.manufacturer.as_deref(), Some("Tinxy.in"));
        assert_eq!(device.model.as_deref(), Some("Tinxy 2 Node"));
        assert_eq!(device.sw_version.as_deref(), Some("42"));
        assert_eq!(device.entity_ids, vec!["D1-1", "D1-2"]);

        let secrets = catalog.secrets_by_device();
        assert_eq!(secrets["D1"].name, "Hall");
        assert_eq!(secrets["D1"].uuid, "u-1");
    }
}
