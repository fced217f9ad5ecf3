//! Competition core and the shared application state around it.

pub mod clock;
pub mod driver;
mod error;
pub mod ids;
pub mod problem;
pub mod season;
pub mod timestamp;

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::{
    config::AppConfig,
    dao::{kv_store::KeyValueStore, snapshot::SnapshotRepository, storage::StorageResult},
    export::ExportSink,
    gateway::MessagingGateway,
};

pub use self::error::ContestError;
use self::{clock::Clock, driver::Driver, ids::IdGenerator};

/// Handle to the application state shared by routes and background jobs.
pub type SharedState = Arc<AppState>;

/// External capabilities the application is wired with.
pub struct Collaborators {
    /// Where snapshots are kept.
    pub store: Arc<dyn KeyValueStore>,
    /// Chat platform.
    pub gateway: Arc<dyn MessagingGateway>,
    /// Season archive.
    pub export: Arc<dyn ExportSink>,
    /// Source of "now".
    pub clock: Arc<dyn Clock>,
    /// Scheduled-message id allocator.
    pub ids: Arc<dyn IdGenerator>,
}

/// Central application state: the driver plus its collaborators.
///
/// The driver sits behind a single async mutex. Commands and poller passes
/// hold it for their whole run, gateway calls included, so they never
/// interleave.
pub struct AppState {
    driver: Mutex<Driver>,
    snapshots: SnapshotRepository,
    gateway: Arc<dyn MessagingGateway>,
    export: Arc<dyn ExportSink>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] around an existing driver.
    pub fn new(config: AppConfig, collaborators: Collaborators, driver: Driver) -> SharedState {
        let snapshots = SnapshotRepository::new(collaborators.store, config.utc_offset);
        Arc::new(Self {
            driver: Mutex::new(driver),
            snapshots,
            gateway: collaborators.gateway,
            export: collaborators.export,
            clock: collaborators.clock,
            ids: collaborators.ids,
            config,
        })
    }

    /// Construct the state from the last snapshot found in the store.
    pub async fn load(config: AppConfig, collaborators: Collaborators) -> StorageResult<SharedState> {
        let snapshots = SnapshotRepository::new(collaborators.store.clone(), config.utc_offset);
        let driver = snapshots.load().await?;
        Ok(Self::new(config, collaborators, driver))
    }

    /// Acquire exclusive access to the driver.
    pub async fn driver(&self) -> MutexGuard<'_, Driver> {
        self.driver.lock().await
    }

    /// Persist the full driver tree.
    pub async fn commit(&self, driver: &Driver) -> StorageResult<()> {
        self.snapshots.save(driver).await
    }

    /// Replace `driver` with the last persisted snapshot.
    pub async fn reload(&self, driver: &mut Driver) -> StorageResult<()> {
        *driver = self.snapshots.load().await?;
        Ok(())
    }

    /// Snapshot repository.
    pub fn snapshots(&self) -> &SnapshotRepository {
        &self.snapshots
    }

    /// Chat platform gateway.
    pub fn gateway(&self) -> &dyn MessagingGateway {
        self.gateway.as_ref()
    }

    /// Season archive sink.
    pub fn export(&self) -> &dyn ExportSink {
        self.export.as_ref()
    }

    /// Current time in the reference timezone.
    pub fn now(&self) -> time::PrimitiveDateTime {
        self.clock.now()
    }

    /// Scheduled-message id allocator.
    pub fn ids(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
