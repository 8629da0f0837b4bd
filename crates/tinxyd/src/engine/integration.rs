use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;

use super::catalog::Catalog;
use super::entity::Entity;
use super::error::Result;
use super::state::EndpointReport;
use super::state::EntityState;
use crate::config::Config;

/// Result type for integration factory functions
pub type IntegrationFactoryResult = anyhow::Result<Option<Integration>>;

pub struct IntegrationContext<'a> {
    pub config: &'a Config,
}

/// Factories for every compiled-in integration.
///
/// Each returns `Ok(None)` when its section is absent from the configuration.
#[distributed_slice]
pub static REGISTRY: [fn(&IntegrationContext) -> IntegrationFactoryResult];

/// Something the coordinator can poll for state once per cycle.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Label used in logs and cycle reports.
    fn name(&self) -> &str;

    /// Fetch the current state of everything behind this endpoint.
    ///
    /// Transport and protocol faults are returned, never panicked on; the
    /// coordinator skips this endpoint for the cycle.
    async fn fetch(&self) -> Result<EndpointReport>;
}

/// Source of the account's device catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_catalog(&self) -> Result<Catalog>;
}

/// Forwards on/off/brightness commands to the vendor.
#[async_trait]
pub trait Commander: Send + Sync {
    async fn set_state(&self, entity: &Entity, on: bool, brightness: Option<u8>) -> Result<()>;

    /// Read one entity's state directly, bypassing the poll cycle.
    async fn get_state(&self, entity: &Entity) -> Result<EntityState>;
}

/// What one configured integration contributes to the coordinator.
pub struct Integration {
    pub name: String,
    pub catalog: Option<Arc<dyn CatalogSource>>,
    pub endpoints: Vec<Arc<dyn Endpoint>>,
    pub commander: Option<Arc<dyn Commander>>,
}

impl Integration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            catalog: None,
            endpoints: Vec::new(),
            commander: None,
        }
    }

    pub fn with_catalog(mut self, source: Arc<dyn CatalogSource>) -> Self {
        self.catalog = Some(source);
        self
    }

    pub fn with_endpoint(mut self, endpoint: Arc<dyn Endpoint>) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn with_commander(mut self, commander: Arc<dyn Commander>) -> Self {
        self.commander = Some(commander);
        self
    }
}

impl std::fmt::Debug for Integration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integration")
            .field("name", &self.name)
            .field("catalog", &self.catalog.as_ref().map(|c| c.name().to_string()))
            .field(
                "endpoints",
                &self.endpoints.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("commander", &self.commander.is_some())
            .finish()
    }
}

/// Build every integration enabled by `config`.
///
/// A factory that fails aborts startup: its faults are configuration faults.
pub fn integrations_from_config(config: &Config) -> anyhow::Result<Vec<Integration>> {
    let ctx = IntegrationContext { config };
    let mut integrations = Vec::new();
    for constr in REGISTRY {
        if let Some(integration) = constr(&ctx)? {
            tracing::info!("Integration enabled: {:?}", integration);
            integrations.push(integration);
        }
    }
    // Registry order is link order; sort so merge order is reproducible.
    integrations.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(integrations)
}
