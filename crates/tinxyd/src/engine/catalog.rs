//! The per-account catalog: every entity and device known after one sync.
//!
//! A catalog is immutable once built. The coordinator swaps in a new one on
//! each successful resync.

use std::collections::HashMap;
use std::collections::HashSet;

use serde::Serialize;

use super::device::Device;
use super::entity::Entity;
use super::entity::Kind;

/// Google Home device type used by the vendor for door locks.
pub const GTYPE_LOCK: &str = "action.devices.types.LOCK";

#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    entities: Vec<Entity>,
    devices: Vec<Device>,
}

/// MQTT password and UUID for a device, as needed for local control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSecret {
    pub name: String,
    pub mqtt_password: String,
    pub uuid: String,
}

impl Catalog {
    /// Assemble a catalog, keeping the first occurrence of each `entity_id`
    /// and of each device id.
    pub fn new(entities: Vec<Entity>, devices: Vec<Device>) -> Self {
        let mut seen = HashSet::new();
        let entities = entities
            .into_iter()
            .filter(|e| {
                let fresh = seen.insert(e.entity_id.clone());
                if !fresh {
                    tracing::warn!("Dropping duplicate entity id {}", e.entity_id);
                }
                fresh
            })
            .collect();

        let mut seen = HashSet::new();
        let devices = devices
            .into_iter()
            .filter(|d| seen.insert(d.id.clone()))
            .collect();

        Self { entities, devices }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entity(&self, entity_id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.entity_id == entity_id)
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == device_id)
    }

    pub fn contains_entity(&self, entity_id: &str) -> bool {
        self.entity(entity_id).is_some()
    }

    pub fn contains_device(&self, device_id: &str) -> bool {
        self.devices.iter().any(|d| d.id == device_id)
    }

    fn of_kind(&self, kind: Kind) -> Vec<&Entity> {
        self.entities.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn switches(&self) -> Vec<&Entity> {
        self.of_kind(Kind::Switch)
    }

    pub fn lights(&self) -> Vec<&Entity> {
        self.of_kind(Kind::Light)
    }

    pub fn fans(&self) -> Vec<&Entity> {
        self.of_kind(Kind::Fan)
    }

    /// Lock entities are recognised by `gtype`, not by classifier kind.
    pub fn locks(&self) -> Vec<&Entity> {
        self.entities
            .iter()
            .filter(|e| e.gtype == GTYPE_LOCK)
            .collect()
    }

    /// Devices whose record carried both an MQTT password and a UUID.
    pub fn secrets_by_device(&self) -> HashMap<String, DeviceSecret> {
        self.devices
            .iter()
            .filter_map(|d| {
                let creds = d.credentials.as_ref()?;
                Some((
                    d.id.clone(),
                    DeviceSecret {
                        name: d.name.clone(),
                        mqtt_password: creds.mqtt_password.clone()?,
                        uuid: creds.uuid.clone()?,
                    },
                ))
            })
            .collect()
    }
}
