//! Bounded historical backfill for a single folder

use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::client::MailSession;
use crate::config::SyncSettings;
use crate::error::Result;
use crate::models::{Account, Mailbox};
use crate::pipeline::{MessageIndexer, Outcome};
use crate::supervisor::FolderLocks;

/// Pause length for the periodic yield during backfill
const YIELD_PAUSE: std::time::Duration = std::time::Duration::from_millis(10);

/// Counters for one folder's backfill pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillStats {
    pub fetched: usize,
    pub indexed: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Fetch the folder's historical window and run every message through the
/// pipeline.
///
/// Holds the folder lock for the whole pass, so live updates on the same
/// folder cannot race it; the lock is released on every exit path. A failed
/// message is counted and logged without stopping the pass; fetch failures
/// propagate to the caller, which treats them as a per-folder error.
pub async fn backfill_folder(
    session: &mut (dyn MailSession + '_),
    account: &Account,
    mailbox: &Mailbox,
    indexer: &MessageIndexer,
    settings: &SyncSettings,
    locks: &FolderLocks,
) -> Result<BackfillStats> {
    let _guard = locks.acquire(&mailbox.path).await;

    let since = Utc::now() - Duration::days(settings.backfill_days);
    debug!(
        account = %account.id,
        folder = %mailbox.path,
        since = %since.format("%Y-%m-%d"),
        "Starting backfill"
    );

    let messages = session.fetch_since(&mailbox.path, since).await?;

    let mut stats = BackfillStats {
        fetched: messages.len(),
        ..Default::default()
    };

    for (processed, raw) in messages.iter().enumerate() {
        match indexer.handle(account, raw, mailbox).await {
            Ok(Outcome::Indexed(_)) => stats.indexed += 1,
            Ok(Outcome::Duplicate) => stats.duplicates += 1,
            Ok(Outcome::Skipped) => stats.skipped += 1,
            Err(e) => {
                // One bad message must not take down the folder pass
                stats.failed += 1;
                tracing::warn!(
                    account = %account.id,
                    folder = %mailbox.path,
                    uid = ?raw.uid,
                    "Failed to index message: {}",
                    e
                );
            }
        }

        // Don't starve the account task's other work on large folders
        if (processed + 1) % settings.yield_every == 0 {
            tokio::time::sleep(YIELD_PAUSE).await;
        }
    }

    info!(
        account = %account.id,
        folder = %mailbox.path,
        fetched = stats.fetched,
        indexed = stats.indexed,
        duplicates = stats.duplicates,
        "Backfill complete"
    );
    Ok(stats)
}
