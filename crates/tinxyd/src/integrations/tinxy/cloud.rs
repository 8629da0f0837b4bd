//! Client for the vendor cloud API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;
use tracing::debug;

use super::normalize::aggregate;
use super::normalize::normalize_state;
use super::parser::parse_catalog;
use crate::config::CloudConfig;
use crate::engine::Catalog;
use crate::engine::CatalogSource;
use crate::engine::Commander;
use crate::engine::Endpoint;
use crate::engine::EndpointReport;
use crate::engine::Entity;
use crate::engine::EntityState;
use crate::engine::Error;
use crate::engine::Result;
use crate::engine::StatusSnapshot;

const SOURCE: &str = "tinxyd";

pub struct CloudClient {
    http: reqwest::Client,
    api_url: String,
    api_token: String,
}

impl CloudClient {
    pub fn new(config: &CloudConfig, timeout: Duration) -> Result<Self> {
        if config.api_token.trim().is_empty() {
            return Err(Error::Configuration("no API token provided".to_string()));
        }
        if config.api_url.trim().is_empty() {
            return Err(Error::Configuration("no API URL provided".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
    ) -> Result<T> {
        debug!(%method, path, "Cloud request");

        let mut request = self
            .http
            .request(method, self.url(path))
            .bearer_auth(&self.api_token);
        if let Some(payload) = payload {
            request = request.json(&payload);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::transport(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::protocol(path, format!("HTTP status {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::protocol(path, format!("invalid response body: {}", e)))
    }

    /// Raw catalog records.
    pub async fn get_device_list(&self) -> Result<Vec<Value>> {
        self.request(Method::GET, "v2/devices/", None).await
    }

    pub async fn sync_devices(&self) -> Result<Catalog> {
        let records = self.get_device_list().await?;
        Ok(parse_catalog(records))
    }

    pub async fn get_all_status(&self) -> Result<StatusSnapshot> {
        let entries: Vec<Value> = self.request(Method::GET, "v2/devices_state", None).await?;
        Ok(aggregate(&entries))
    }

    pub async fn get_device_state(&self, device_id: &str, relay_no: u32) -> Result<EntityState> {
        let path = format!("v2/devices/{}/state?deviceNumber={}", device_id, relay_no);
        let raw: Value = self.request(Method::GET, &path, None).await?;
        Ok(normalize_state(&raw))
    }

    pub async fn set_device_state(
        &self,
        device_id: &str,
        relay_no: u32,
        on: bool,
        brightness: Option<u8>,
    ) -> Result<Value> {
        let path = format!("v2/devices/{}/toggle", device_id);
        let payload = toggle_payload(relay_no, on, brightness);
        self.request(Method::POST, &path, Some(payload)).await
    }
}

fn toggle_payload(relay_no: u32, on: bool, brightness: Option<u8>) -> Value {
    let mut request = json!({ "state": u8::from(on) });
    if let Some(brightness) = brightness {
        request["brightness"] = json!(brightness);
    }
    json!({
        "request": request,
        "deviceNumber": relay_no,
        "source": SOURCE,
    })
}

#[async_trait]
impl CatalogSource for CloudClient {
    fn name(&self) -> &str {
        "cloud"
    }

    async fn fetch_catalog(&self) -> Result<Catalog> {
        self.sync_devices().await
    }
}

#[async_trait]
impl Endpoint for CloudClient {
    fn name(&self) -> &str {
        "cloud"
    }

    async fn fetch(&self) -> Result<EndpointReport> {
        Ok(EndpointReport::from_statuses(self.get_all_status().await?))
    }
}

#[async_trait]
impl Commander for CloudClient {
    async fn set_state(&self, entity: &Entity, on: bool, brightness: Option<u8>) -> Result<()> {
        self.set_device_state(&entity.device_id, entity.relay_no, on, brightness)
            .await?;
        Ok(())
    }

    async fn get_state(&self, entity: &Entity) -> Result<EntityState> {
        self.get_device_state(&entity.device_id, entity.relay_no).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use axum::Json;
    use axum::Router;
    use axum::extract::Path;
    use axum::extract::Query;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::routing::post;

    use super::*;

    type Recorded = Arc<Mutex<Vec<Value>>>;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn fake_cloud(recorded: Recorded) -> Router {
        Router::new()
            .route(
                "/v2/devices/",
                get(|headers: HeaderMap| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    if auth != "Bearer secret" {
                        return Err(StatusCode::UNAUTHORIZED);
                    }
                    Ok(Json(json!([
                        {
                            "_id": "D1",
                            "name": "Hall",
                            "typeId": {"name": "WIFI_2SWITCH_V1", "long_name": "2 Node"},
                            "devices": ["Light", "Fan"],
                            "deviceTypes": ["Tubelight", "Fan"]
                        },
                        {"_id": "H1", "name": "Hub", "typeId": {"name": "EVA_HUB"}}
                    ])))
                }),
            )
            .route(
                "/v2/devices_state",
                get(|| async {
                    Json(json!([
                        {"_id": "D1", "state": [
                            {"number": 1, "state": {"state": "ON"}},
                            {"number": 2, "state": {"state": "OFF", "status": "1"}}
                        ]}
                    ]))
                }),
            )
            .route(
                "/v2/devices/:id/state",
                get(
                    |Path(id): Path<String>,
                     Query(query): Query<std::collections::HashMap<String, String>>| async move {
                        let relay = query.get("deviceNumber").map(String::as_str);
                        let state = if id == "D1" && relay == Some("2") { "ON" } else { "OFF" };
                        Json(json!({"state": state, "brightness": 30}))
                    },
                ),
            )
            .route(
                "/v2/devices/:id/toggle",
                post(
                    |State(recorded): State<Recorded>,
                     Path(id): Path<String>,
                     Json(body): Json<Value>| async move {
                        recorded.lock().unwrap().push(json!({"id": id, "body": body}));
                        Json(json!({"status": "ok"}))
                    },
                ),
            )
            .with_state(recorded)
    }

    fn config(url: &str, token: &str) -> CloudConfig {
        CloudConfig {
            api_token: token.to_string(),
            api_url: url.to_string(),
        }
    }

    #[test]
    fn test_new_requires_token() {
        let err = CloudClient::new(&config("http://localhost/", ""), Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_toggle_payload() {
        assert_eq!(
            toggle_payload(2, true, None),
            json!({"request": {"state": 1}, "deviceNumber": 2, "source": "tinxyd"})
        );
        assert_eq!(
            toggle_payload(1, false, Some(40)),
            json!({"request": {"state": 0, "brightness": 40}, "deviceNumber": 1, "source": "tinxyd"})
        );
    }

    #[tokio::test]
    async fn test_sync_devices() {
        let url = serve(fake_cloud(Recorded::default())).await;
        let client = CloudClient::new(&config(&url, "secret"), Duration::from_secs(5)).unwrap();

        let catalog = client.fetch_catalog().await.unwrap();
        let ids: Vec<_> = catalog.entities().iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["D1-1", "D1-2"]);
        assert_eq!(catalog.devices().len(), 1);
        assert_eq!(catalog.devices()[0].model.as_deref(), Some("2 Node"));
    }

    #[tokio::test]
    async fn test_bad_token_is_protocol_error() {
        let url = serve(fake_cloud(Recorded::default())).await;
        let client = CloudClient::new(&config(&url, "wrong"), Duration::from_secs(5)).unwrap();

        let err = client.get_device_list().await.unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_fetch_all_status() {
        let url = serve(fake_cloud(Recorded::default())).await;
        let client = CloudClient::new(&config(&url, "secret"), Duration::from_secs(5)).unwrap();

        let report = client.fetch().await.unwrap();
        assert_eq!(report.statuses.len(), 2);
        assert!(report.statuses["D1-1"].on);
        assert!(!report.statuses["D1-2"].on);
        assert_eq!(report.statuses["D1-2"].status.as_deref(), Some("1"));
        assert!(report.metadata.is_empty());
    }

    #[tokio::test]
    async fn test_get_device_state() {
        let url = serve(fake_cloud(Recorded::default())).await;
        let client = CloudClient::new(&config(&url, "secret"), Duration::from_secs(5)).unwrap();

        let state = client.get_device_state("D1", 2).await.unwrap();
        assert!(state.on);
        assert_eq!(state.brightness, Some(30));

        let state = client.get_device_state("D1", 1).await.unwrap();
        assert!(!state.on);
    }

    #[tokio::test]
    async fn test_commander_reads_catalog_entity() {
        let url = serve(fake_cloud(Recorded::default())).await;
        let client = CloudClient::new(&config(&url, "secret"), Duration::from_secs(5)).unwrap();

        let catalog = client.fetch_catalog().await.unwrap();
        let entity = catalog.entity("D1-2").unwrap();
        let state = Commander::get_state(&client, entity).await.unwrap();
        assert!(state.on);
        assert_eq!(state.brightness, Some(30));
    }

    #[tokio::test]
    async fn test_set_device_state() {
        let recorded = Recorded::default();
        let url = serve(fake_cloud(recorded.clone())).await;
        let client = CloudClient::new(&config(&url, "secret"), Duration::from_secs(5)).unwrap();

        client.set_device_state("D1", 2, true, Some(75)).await.unwrap();

        let calls = recorded.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![json!({
                "id": "D1",
                "body": {"request": {"state": 1, "brightness": 75}, "deviceNumber": 2, "source": "tinxyd"}
            })]
        );
    }

    #[tokio::test]
    async fn test_unreachable_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let client = CloudClient::new(&config(&url, "secret"), Duration::from_secs(5)).unwrap();
        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
    }
}
