//! CLI command implementations.

pub mod categories;
pub mod pending;
pub mod sync;

use fintrack_model::{Budget, Category, SavingsGoal, SyncEntity, Transaction};
use fintrack_store::{EntityStore, FileEntityStore, FileOutbox, ReplayOrder, StoreResult};
use fintrack_sync_engine::{
    ReqwestClient, RestEntityClient, SyncConfig, SyncCoordinator, SyncResult, TableReconciler,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Tables known to the CLI, in display order.
pub const TABLES: [&str; 4] = [
    Category::TABLE,
    Transaction::TABLE,
    Budget::TABLE,
    SavingsGoal::TABLE,
];

/// Backend connection settings from the command line.
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    /// Base URL of the backend.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl RemoteOptions {
    /// Builds the engine configuration.
    pub fn config(&self, newest_first: bool) -> SyncConfig {
        let order = if newest_first {
            ReplayOrder::NewestFirst
        } else {
            ReplayOrder::OldestFirst
        };
        SyncConfig::new(self.base_url.clone())
            .with_timeout(self.timeout)
            .with_replay_order(order)
    }
}

/// Opens the shared outbox of a data directory.
pub fn open_outbox(dir: &Path) -> StoreResult<Arc<FileOutbox>> {
    Ok(Arc::new(FileOutbox::open(dir)?))
}

fn reconciler<E: SyncEntity>(
    dir: &Path,
    outbox: &Arc<FileOutbox>,
    client: &Arc<ReqwestClient>,
    config: &SyncConfig,
) -> SyncResult<TableReconciler<E>> {
    let entities = Arc::new(FileEntityStore::<E>::open(dir)?);
    let remote = RestEntityClient::<E, _>::new(config.base_url(), Arc::clone(client));
    Ok(
        TableReconciler::<E>::new(entities, outbox.clone(), Arc::new(remote))
            .with_order(config.replay_order),
    )
}

/// Builds a coordinator over every table of a data directory.
///
/// Transactions and budgets resolve their category through the category
/// file, so they send remote category ids.
pub fn open_coordinator(dir: &Path, config: &SyncConfig) -> SyncResult<SyncCoordinator> {
    let outbox = open_outbox(dir)?;
    let client = Arc::new(ReqwestClient::new(config)?);
    let categories: Arc<dyn EntityStore<Category>> =
        Arc::new(FileEntityStore::<Category>::open(dir)?);

    let coordinator = SyncCoordinator::new();
    coordinator
        .register(reconciler::<Category>(dir, &outbox, &client, config)?)
        .register(
            reconciler::<Transaction>(dir, &outbox, &client, config)?
                .with_categories(Arc::clone(&categories)),
        )
        .register(reconciler::<Budget>(dir, &outbox, &client, config)?.with_categories(categories))
        .register(reconciler::<SavingsGoal>(dir, &outbox, &client, config)?);
    Ok(coordinator)
}
