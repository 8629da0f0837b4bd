use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use strum::Display;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::catalog::Catalog;
use super::error::Error;
use super::error::Result;
use super::integration::CatalogSource;
use super::integration::Commander;
use super::integration::Endpoint;
use super::integration::Integration;
use super::state::DeviceMetadata;
use super::state::EndpointReport;
use super::state::EntityState;
use super::state::StatusSnapshot;

/// Where the coordinator is within a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Polling,
    Aggregating,
    Published,
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub succeeded: Vec<String>,
    /// Endpoint name and the fault that made us skip it.
    pub failed: Vec<(String, String)>,
    /// Snapshot entries written by this cycle.
    pub updated: usize,
}

/// Polls every endpoint on a fixed schedule and publishes the merged state.
///
/// Readers get `Arc`s to immutable values; every publish is a single pointer
/// swap, so nobody observes a half-merged snapshot.
pub struct SyncCoordinator {
    catalog: ArcSwap<Catalog>,

    /// Set after the first successful catalog sync; until then snapshot
    /// entries are not filtered against the catalog.
    catalog_loaded: AtomicBool,

    snapshot: ArcSwap<StatusSnapshot>,

    /// Device metadata keyed by vendor device id
    metadata: ArcSwap<HashMap<String, DeviceMetadata>>,

    phase: std::sync::Mutex<Phase>,

    cycles: AtomicU64,

    /// Last good catalog of each source, in registration order. Also
    /// serialises writers (poll cycles, catalog syncs and refreshes).
    writer: Mutex<Vec<Option<Arc<Catalog>>>>,

    catalog_sources: Vec<Arc<dyn CatalogSource>>,
    endpoints: Vec<Arc<dyn Endpoint>>,
    commander: Option<Arc<dyn Commander>>,

    /// Upper bound for a single endpoint fetch
    request_timeout: Duration,
}

impl SyncCoordinator {
    pub fn new(integrations: Vec<Integration>, request_timeout: Duration) -> Self {
        let mut catalog_sources = Vec::new();
        let mut endpoints = Vec::new();
        let mut commander = None;

        for integration in integrations {
            catalog_sources.extend(integration.catalog);
            endpoints.extend(integration.endpoints);
            if commander.is_none() {
                commander = integration.commander;
            }
        }

        Self {
            catalog: ArcSwap::new(Arc::default()),
            catalog_loaded: AtomicBool::new(false),
            snapshot: ArcSwap::new(Arc::default()),
            metadata: ArcSwap::new(Arc::default()),
            phase: std::sync::Mutex::new(Phase::Idle),
            cycles: AtomicU64::new(0),
            writer: Mutex::new(vec![None; catalog_sources.len()]),
            catalog_sources,
            endpoints,
            commander,
            request_timeout,
        }
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog.load_full()
    }

    pub fn current_snapshot(&self) -> Arc<StatusSnapshot> {
        self.snapshot.load_full()
    }

    pub fn metadata(&self, device_id: &str) -> Option<DeviceMetadata> {
        self.metadata.load().get(device_id).cloned()
    }

    pub fn phase(&self) -> Phase {
        self.phase.lock().map(|p| *p).unwrap_or(Phase::Idle)
    }

    /// Number of completed poll cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn commander(&self) -> Option<Arc<dyn Commander>> {
        self.commander.clone()
    }

    pub fn endpoint_names(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.name().to_string()).collect()
    }

    fn set_phase(&self, phase: Phase) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase;
        }
    }

    /// Rebuild the catalog from every catalog source and swap it in.
    ///
    /// Sources are fetched independently. A source that fails keeps
    /// contributing its last good catalog; the sync only fails when every
    /// source failed. State and metadata for entities that disappeared from
    /// the merged catalog are dropped.
    pub async fn sync_catalog(&self) -> Result<usize> {
        if self.catalog_sources.is_empty() {
            debug!("No catalog sources configured, skipping catalog sync");
            return Ok(0);
        }

        let mut by_source = self.writer.lock().await;

        let mut first_error = None;
        let mut refreshed = 0;
        for (slot, source) in by_source.iter_mut().zip(&self.catalog_sources) {
            match source.fetch_catalog().await {
                Ok(catalog) => {
                    info!(
                        "Catalog from {}: {} devices, {} entities",
                        source.name(),
                        catalog.devices().len(),
                        catalog.entities().len()
                    );
                    *slot = Some(Arc::new(catalog));
                    refreshed += 1;
                }
                Err(e) => {
                    warn!(
                        "Catalog source {} failed, keeping its previous catalog: {}",
                        source.name(),
                        e
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        if refreshed == 0 {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let mut entities = Vec::new();
        let mut devices = Vec::new();
        for catalog in by_source.iter().flatten() {
            entities.extend_from_slice(catalog.entities());
            devices.extend_from_slice(catalog.devices());
        }

        let catalog = Catalog::new(entities, devices);
        let count = catalog.entities().len();

        let entity_ids: HashSet<&str> = catalog
            .entities()
            .iter()
            .map(|e| e.entity_id.as_str())
            .collect();
        let device_ids: HashSet<&str> = catalog.devices().iter().map(|d| d.id.as_str()).collect();

        let mut snapshot = StatusSnapshot::clone(&self.snapshot.load());
        snapshot.retain(|entity_id, _| entity_ids.contains(entity_id.as_str()));
        let mut metadata = HashMap::clone(&self.metadata.load());
        metadata.retain(|device_id, _| device_ids.contains(device_id.as_str()));

        self.catalog.store(Arc::new(catalog));
        self.catalog_loaded.store(true, Ordering::Release);
        self.snapshot.store(Arc::new(snapshot));
        self.metadata.store(Arc::new(metadata));

        Ok(count)
    }

    /// Publish one freshly read state outside the poll cycle.
    ///
    /// Returns false, publishing nothing, when the entity is not in the
    /// loaded catalog.
    pub async fn publish_state(&self, entity_id: &str, state: EntityState) -> bool {
        let _writer = self.writer.lock().await;

        if self.catalog_loaded.load(Ordering::Acquire)
            && !self.catalog.load().contains_entity(entity_id)
        {
            return false;
        }

        let mut snapshot = StatusSnapshot::clone(&self.snapshot.load());
        snapshot.insert(entity_id.to_string(), state);
        self.snapshot.store(Arc::new(snapshot));
        true
    }

    /// Run one Polling → Aggregating → Published cycle.
    ///
    /// Never fails: endpoints that fault are reported and skipped, and their
    /// entities keep their previously published state.
    pub async fn poll_once(&self) -> CycleReport {
        let _writer = self.writer.lock().await;
        let cycle = self.cycles.load(Ordering::Relaxed) + 1;

        self.set_phase(Phase::Polling);
        let outcomes = self.fetch_all().await;

        self.set_phase(Phase::Aggregating);
        let mut report = CycleReport {
            cycle,
            ..CycleReport::default()
        };

        let catalog = self.catalog.load();
        let known: Option<HashSet<&str>> = self
            .catalog_loaded
            .load(Ordering::Acquire)
            .then(|| catalog.entities().iter().map(|e| e.entity_id.as_str()).collect());

        let mut snapshot = StatusSnapshot::clone(&self.snapshot.load());
        let mut metadata = HashMap::clone(&self.metadata.load());

        for (name, outcome) in outcomes {
            match outcome {
                Ok(endpoint_report) => {
                    for (entity_id, state) in endpoint_report.statuses {
                        if let Some(known) = &known {
                            if !known.contains(entity_id.as_str()) {
                                debug!("Ignoring state for unknown entity {}", entity_id);
                                continue;
                            }
                        }
                        snapshot.insert(entity_id, state);
                        report.updated += 1;
                    }
                    for (device_id, device_metadata) in endpoint_report.metadata {
                        if known.is_some() && !catalog.contains_device(&device_id) {
                            continue;
                        }
                        metadata.insert(device_id, device_metadata);
                    }
                    report.succeeded.push(name);
                }
                Err(e) if !e.is_recoverable() => {
                    error!("Endpoint {} is misconfigured: {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
                Err(e) => {
                    warn!("Endpoint {} skipped this cycle: {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        self.set_phase(Phase::Published);
        self.snapshot.store(Arc::new(snapshot));
        self.metadata.store(Arc::new(metadata));
        self.cycles.store(cycle, Ordering::Relaxed);

        debug!(
            "Cycle {} published: {} updated, {} ok, {} failed",
            cycle,
            report.updated,
            report.succeeded.len(),
            report.failed.len()
        );

        self.set_phase(Phase::Idle);
        report
    }

    /// Fetch every endpoint concurrently and wait for all of them.
    ///
    /// Results come back in registration order regardless of completion order.
    async fn fetch_all(&self) -> Vec<(String, Result<EndpointReport>)> {
        let timeout = self.request_timeout;
        let handles: Vec<_> = self
            .endpoints
            .iter()
            .map(|endpoint| {
                let endpoint = Arc::clone(endpoint);
                tokio::spawn(async move {
                    match tokio::time::timeout(timeout, endpoint.fetch()).await {
                        Ok(result) => result,
                        Err(_) => Err(Error::Timeout {
                            endpoint: endpoint.name().to_string(),
                            timeout,
                        }),
                    }
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (endpoint, handle) in self.endpoints.iter().zip(handles) {
            let name = endpoint.name().to_string();
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(Error::transport(name.clone(), e)),
            };
            outcomes.push((name, result));
        }
        outcomes
    }

    /// Poll forever, resyncing the catalog on its own schedule.
    ///
    /// Cancellation is external: drop the future to stop.
    pub async fn run(&self, poll_interval: Duration, catalog_interval: Duration) {
        let mut poll = tokio::time::interval(poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut resync = tokio::time::interval(catalog_interval);
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the caller syncs on startup.
        resync.tick().await;

        info!(
            "Polling {} endpoints every {:?}",
            self.endpoints.len(),
            poll_interval
        );

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    let report = self.poll_once().await;
                    for (name, error) in &report.failed {
                        debug!("Cycle {}: {} failed: {}", report.cycle, name, error);
                    }
                }
                _ = resync.tick() => {
                    match self.sync_catalog().await {
                        Ok(count) => info!("Catalog resynced: {} entities", count),
                        Err(e) => warn!("Catalog resync failed, keeping previous catalog: {}", e),
                    }
                }
            }
        }
    }
}
