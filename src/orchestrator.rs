//! Engine startup and cross-account orchestration

use std::sync::Arc;
use tracing::{info, warn};

use crate::classifier::Classifier;
use crate::client::MailClient;
use crate::config::SyncSettings;
use crate::error::Result;
use crate::models::Account;
use crate::notify::Notifier;
use crate::pipeline::MessageIndexer;
use crate::store::{AggregateField, Bucket, IndexStore};
use crate::supervisor::{AccountSupervisor, SupervisorHandle};

/// Aggregate document counts for the reporting layer
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub total: u64,
    pub by_account: Vec<Bucket>,
    pub by_folder: Vec<Bucket>,
    pub by_folder_type: Vec<Bucket>,
}

/// Starts one connection supervisor per account and answers stats queries.
///
/// Supervisors run as independent tasks; the engine never waits for one
/// account on behalf of another.
pub struct SyncEngine {
    client: Arc<dyn MailClient>,
    store: Arc<dyn IndexStore>,
    indexer: Arc<MessageIndexer>,
    settings: SyncSettings,
}

impl SyncEngine {
    pub fn new(
        client: Arc<dyn MailClient>,
        store: Arc<dyn IndexStore>,
        classifier: Arc<dyn Classifier>,
        notifiers: Vec<Arc<dyn Notifier>>,
        settings: SyncSettings,
    ) -> Self {
        let indexer = Arc::new(MessageIndexer::new(store.clone(), classifier, notifiers));
        Self {
            client,
            store,
            indexer,
            settings,
        }
    }

    /// Ensure the index exists, then launch every account's supervisor.
    ///
    /// The index check is the only fatal failure; account connections fail
    /// independently inside their own tasks.
    pub async fn start(&self, accounts: Vec<Account>) -> Result<Vec<SupervisorHandle>> {
        self.store.ensure_index().await?;

        if accounts.is_empty() {
            warn!("No accounts configured; the engine has nothing to sync");
        }

        let mut handles = Vec::with_capacity(accounts.len());
        for account in accounts {
            info!(account = %account.id, host = %account.host, "Starting supervisor");
            let supervisor = AccountSupervisor::new(
                account,
                self.client.clone(),
                self.indexer.clone(),
                self.settings.clone(),
            );
            let account_id = supervisor.account_id().to_string();
            let state = supervisor.state();
            let task = tokio::spawn(supervisor.run());
            handles.push(SupervisorHandle {
                account_id,
                state,
                task,
            });
        }
        Ok(handles)
    }

    /// Read-only reporting query; not part of the sync hot path
    pub async fn stats(&self) -> Result<SyncReport> {
        Ok(SyncReport {
            total: self.store.count().await?,
            by_account: self.store.aggregate(AggregateField::Account).await?,
            by_folder: self.store.aggregate(AggregateField::Folder).await?,
            by_folder_type: self.store.aggregate(AggregateField::FolderType).await?,
        })
    }
}
