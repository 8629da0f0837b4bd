//! Direct polling of nodes on the local network via `GET /info`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::parser::MANUFACTURER;
use super::record::deserialize_string_or_int;
use crate::config::NodeConfig;
use crate::engine::Catalog;
use crate::engine::CatalogSource;
use crate::engine::Credentials;
use crate::engine::Device;
use crate::engine::DeviceMetadata;
use crate::engine::Endpoint;
use crate::engine::EndpointReport;
use crate::engine::Entity;
use crate::engine::EntityState;
use crate::engine::Error;
use crate::engine::Kind;
use crate::engine::Result;
use crate::engine::StatusSnapshot;
use crate::engine::entity::entity_id;

/// Relay types that report a brightness triplet.
const DIMMABLE: &[&str] = &["light", "fan"];

const LOCAL_TYPE: &str = "LOCAL_NODE";

/// Body of a node's `/info` response.
#[derive(Debug, Deserialize)]
pub struct NodeInfo {
    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    pub rssi: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_string_or_int")]
    pub ip: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_int")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_int")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_int")]
    pub chip_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_int")]
    pub ssid: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_int")]
    pub firmware: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_int")]
    pub model: Option<String>,
    /// One digit per relay, `1` meaning on.
    #[serde(default, deserialize_with = "deserialize_string_or_int")]
    pub state: Option<String>,
    /// Three-digit brightness per relay, concatenated.
    #[serde(default, deserialize_with = "deserialize_string_or_int")]
    pub bright: Option<String>,
}

/// An integer that may arrive as a number or a numeric string; anything else
/// reads as absent.
fn deserialize_lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Numeric `bright` values lose their leading zeros.
fn pad_triplets(bright: &str) -> String {
    let width = bright.len().div_ceil(3) * 3;
    format!("{:0>width$}", bright)
}

fn brightness_triplet(bright: &str, index: usize) -> Option<u8> {
    let triplet = bright.get(index * 3..index * 3 + 3)?;
    let value: u16 = triplet.parse().ok()?;
    Some(value.min(100) as u8)
}

/// Turn an `/info` body into per-relay states and device metadata.
pub fn decode_info(info: &NodeInfo, node: &NodeConfig) -> EndpointReport {
    let mut statuses = StatusSnapshot::new();
    let bright = info.bright.as_deref().map(pad_triplets);
    let state = info.state.as_deref().unwrap_or_default();
    if state.is_empty() {
        debug!("Node {} reported no relay state", node.device_id);
    }

    for (index, digit) in state.chars().enumerate() {
        let on = digit == '1';
        let relay_type = node.devices.get(index).map(|r| r.kind.as_str());
        let brightness = match (&bright, relay_type) {
            (Some(bright), Some(kind)) if DIMMABLE.contains(&kind) => {
                brightness_triplet(bright, index)
            }
            _ => None,
        };

        statuses.insert(
            entity_id(&node.device_id, (index + 1) as u32),
            EntityState {
                on,
                status: Some(if on { "on" } else { "off" }.to_string()),
                brightness,
            },
        );
    }

    let metadata = DeviceMetadata {
        firmware: info.firmware.clone(),
        model: info.model.clone(),
        signal_strength: info.rssi,
        network_id: info.ssid.clone(),
        ip: info.ip.clone(),
        version: info.version.clone(),
    };

    EndpointReport {
        statuses,
        metadata: HashMap::from([(node.device_id.clone(), metadata)]),
    }
}

fn relay_kind(relay_type: &str) -> Kind {
    match relay_type {
        "light" => Kind::Light,
        "fan" => Kind::Fan,
        _ => Kind::Switch,
    }
}

/// Catalog entries for configured nodes, as the cloud would describe them.
pub fn node_catalog(nodes: &[NodeConfig]) -> Catalog {
    let mut entities = Vec::new();
    let mut devices = Vec::new();

    for node in nodes {
        let credentials = Credentials::from_parts(node.mqtt_password.clone(), None);
        let mut device = Device::new(node.device_id.clone(), node.name.clone());
        device.manufacturer = Some(MANUFACTURER.to_string());
        device.credentials = credentials.clone();

        for (index, relay) in node.devices.iter().enumerate() {
            let relay_no = (index + 1) as u32;
            let entity = Entity {
                entity_id: entity_id(&node.device_id, relay_no),
                device_id: node.device_id.clone(),
                relay_no,
                name: format!("{} {}", node.name, relay.name).trim().to_string(),
                kind: relay_kind(&relay.kind),
                user_kind: relay.kind.clone(),
                traits: Vec::new(),
                gtype: String::new(),
                tinxy_type: LOCAL_TYPE.to_string(),
                long_description: String::new(),
                credentials: credentials.clone(),
            };
            device.add_entity(entity.entity_id.clone());
            entities.push(entity);
        }
        devices.push(device);
    }

    Catalog::new(entities, devices)
}

/// One node polled over HTTP.
pub struct LocalNode {
    name: String,
    base_url: String,
    node: NodeConfig,
    http: reqwest::Client,
}

impl LocalNode {
    pub fn new(node: NodeConfig, timeout: Duration) -> Result<Self> {
        if node.ip_address.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "node {} has no IP address",
                node.device_id
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: format!("node {}", node.ip_address),
            base_url: base_url(&node.ip_address),
            node,
            http,
        })
    }

    pub async fn fetch_info(&self) -> Result<NodeInfo> {
        let url = format!("{}/info", self.base_url);
        debug!(node = %self.node.device_id, %url, "Fetching node info");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::transport(&self.name, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::protocol(
                &self.name,
                format!("HTTP status {}", status),
            ));
        }

        // Nodes do not always send a JSON content type.
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(&self.name, e))?;
        serde_json::from_slice(&body)
            .map_err(|e| Error::protocol(&self.name, format!("invalid /info body: {}", e)))
    }
}

fn base_url(address: &str) -> String {
    let address = address.trim().trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    }
}

#[async_trait]
impl Endpoint for LocalNode {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<EndpointReport> {
        let info = self.fetch_info().await?;
        Ok(decode_info(&info, &self.node))
    }
}

/// Static catalog built from configured nodes.
pub struct NodeCatalog {
    nodes: Vec<NodeConfig>,
}

impl NodeCatalog {
    pub fn new(nodes: Vec<NodeConfig>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl CatalogSource for NodeCatalog {
    fn name(&self) -> &str {
        "local"
    }

    async fn fetch_catalog(&self) -> Result<Catalog> {
        Ok(node_catalog(&self.nodes))
    }
}
