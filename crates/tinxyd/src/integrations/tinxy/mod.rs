//! Tinxy devices, via the vendor cloud and via nodes on the LAN.

pub mod classify;
#[cfg(feature = "integration_cloud")]
mod cloud;
#[cfg(feature = "integration_local")]
mod local;
pub mod normalize;
pub mod parser;
pub mod record;

use std::sync::Arc;

use anyhow::Context;
#[cfg(feature = "integration_cloud")]
pub use cloud::CloudClient;
use linkme::distributed_slice;
#[cfg(feature = "integration_local")]
pub use local::LocalNode;
#[cfg(feature = "integration_local")]
pub use local::NodeCatalog;

use crate::engine;

#[cfg(feature = "integration_cloud")]
#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_cloud(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let cloud_config = if let Some(c) = &ctx.config.integrations.cloud {
        c
    } else {
        return Ok(None);
    };

    let client = Arc::new(
        CloudClient::new(cloud_config, ctx.config.sync.request_timeout())
            .context("Failed to create cloud client")?,
    );

    Ok(Some(
        engine::Integration::new("cloud")
            .with_catalog(client.clone())
            .with_endpoint(client.clone())
            .with_commander(client),
    ))
}

#[cfg(feature = "integration_local")]
#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_local(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let nodes = &ctx.config.integrations.local;
    if nodes.is_empty() {
        return Ok(None);
    }

    let mut integration = engine::Integration::new("local")
        .with_catalog(Arc::new(NodeCatalog::new(nodes.clone())));
    for node in nodes {
        let endpoint = LocalNode::new(node.clone(), ctx.config.sync.request_timeout())
            .with_context(|| format!("Failed to create local node {}", node.device_id))?;
        integration = integration.with_endpoint(Arc::new(endpoint));
    }

    Ok(Some(integration))
}

#[cfg(all(test, feature = "integration_cloud", feature = "integration_local"))]
mod tests {
    use crate::config::Config;
    use crate::engine::integrations_from_config;

    #[test]
    fn test_factories_follow_config() {
        let config = Config::from_toml(
            r#"
            [integrations.cloud]
            api_token = "abc"

            [[integrations.local]]
            device_id = "N1"
            ip_address = "10.0.0.2"

            [[integrations.local]]
            device_id = "N2"
            ip_address = "10.0.0.3"
            "#,
        )
        .unwrap();

        let integrations = integrations_from_config(&config).unwrap();
        let names: Vec<_> = integrations.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["cloud", "local"]);

        assert!(integrations[0].commander.is_some());
        assert_eq!(integrations[0].endpoints.len(), 1);
        assert!(integrations[1].commander.is_none());
        let endpoints: Vec<_> = integrations[1].endpoints.iter().map(|e| e.name()).collect();
        assert_eq!(endpoints, vec!["node 10.0.0.2", "node 10.0.0.3"]);
    }

    #[test]
    fn test_local_only() {
        let config = Config::from_toml(
            r#"
            [[integrations.local]]
            device_id = "N1"
            ip_address = "10.0.0.2"
            "#,
        )
        .unwrap();

        let integrations = integrations_from_config(&config).unwrap();
        assert_eq!(integrations.len(), 1);
        assert_eq!(integrations[0].name, "local");
        assert!(integrations[0].catalog.is_some());
    }
}
