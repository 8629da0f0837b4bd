pub mod api;
pub mod config;
mod engine;
mod integrations;

pub use config::Config;
pub use config::ConfigError;
pub use config::LogLevel;
pub use engine::BoxError;
pub use engine::Catalog;
pub use engine::CatalogSource;
pub use engine::Commander;
pub use engine::Credentials;
pub use engine::CycleReport;
pub use engine::Device;
pub use engine::DeviceMetadata;
pub use engine::DeviceSecret;
pub use engine::Endpoint;
pub use engine::EndpointReport;
pub use engine::Entity;
pub use engine::EntityState;
pub use engine::Error;
pub use engine::GTYPE_LOCK;
pub use engine::Integration;
pub use engine::Kind;
pub use engine::Phase;
pub use engine::StatusSnapshot;
pub use engine::SyncCoordinator;
pub use engine::integrations_from_config;
pub use integrations::tinxy::classify::classify;
pub use integrations::tinxy::normalize::aggregate;
pub use integrations::tinxy::normalize::normalize;
pub use integrations::tinxy::normalize::normalize_state;
pub use integrations::tinxy::parser::parse_catalog;
pub use integrations::tinxy::parser::parse_record;
pub use integrations::tinxy::record::RawDeviceRecord;
