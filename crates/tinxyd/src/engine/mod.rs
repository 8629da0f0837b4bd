mod catalog;
mod coordinator;
mod device;
pub mod entity;
mod error;
mod integration;
pub mod state;

pub use catalog::Catalog;
pub use catalog::DeviceSecret;
pub use catalog::GTYPE_LOCK;
pub use coordinator::CycleReport;
pub use coordinator::Phase;
pub use coordinator::SyncCoordinator;
pub use device::Device;
pub use entity::Credentials;
pub use entity::Entity;
pub use entity::Kind;
pub use error::BoxError;
pub use error::Error;
pub use error::Result;
pub use integration::CatalogSource;
pub use integration::Commander;
pub use integration::Endpoint;
pub use integration::Integration;
pub use integration::IntegrationContext;
pub use integration::IntegrationFactoryResult;
pub use integration::REGISTRY as INTEGRATION_REGISTRY;
pub use integration::integrations_from_config;
pub use state::DeviceMetadata;
pub use state::EndpointReport;
pub use state::EntityState;
pub use state::StatusSnapshot;
