//! Per-account connection supervisor
//!
//! Owns the connection state machine for exactly one account: connect,
//! discover folders, backfill, then listen for live updates with periodic
//! keep-alive probes, reconnecting after a fixed delay whenever the
//! connection dies. Instances never share state, so one account's failures
//! cannot leak into another's.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex as TokioMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::backfill::backfill_folder;
use crate::client::{MailClient, MailSession, SessionEvent};
use crate::config::SyncSettings;
use crate::error::{Result, SyncError};
use crate::models::{Account, ConnectionState, Mailbox, SpecialUse};
use crate::pipeline::MessageIndexer;

/// Per-folder exclusive locks, scoped to one account.
///
/// Serializes backfill and live-update fetches on the same folder. Never
/// held across anything but the fetch-and-process critical section.
#[derive(Clone, Default)]
pub struct FolderLocks {
    inner: Arc<StdMutex<HashMap<String, Arc<TokioMutex<()>>>>>,
}

impl FolderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, path: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap();
            map.entry(path.to_string())
                .or_insert_with(|| Arc::new(TokioMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Handle to a running supervisor task
pub struct SupervisorHandle {
    pub account_id: String,
    pub state: watch::Receiver<ConnectionState>,
    pub task: tokio::task::JoinHandle<()>,
}

pub struct AccountSupervisor {
    account: Account,
    client: Arc<dyn MailClient>,
    indexer: Arc<MessageIndexer>,
    settings: SyncSettings,
    locks: FolderLocks,
    /// Liveness of the live subscriber; events arriving after the
    /// connection closed must be ignored, not just unlikely
    live: Arc<AtomicBool>,
    state_tx: watch::Sender<ConnectionState>,
    /// Folder list cached for the lifetime of the current connection
    folders: Vec<Mailbox>,
}

impl AccountSupervisor {
    pub fn new(
        account: Account,
        client: Arc<dyn MailClient>,
        indexer: Arc<MessageIndexer>,
        settings: SyncSettings,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            account,
            client,
            indexer,
            settings,
            locks: FolderLocks::new(),
            live: Arc::new(AtomicBool::new(false)),
            state_tx,
            folders: Vec::new(),
        }
    }

    /// Subscribe to connection state changes
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn account_id(&self) -> &str {
        &self.account.id
    }

    fn set_state(&self, next: ConnectionState) {
        debug!(account = %self.account.id, state = %next, "Connection state");
        self.state_tx.send_replace(next);
    }

    /// Run the supervisor until the task is aborted. Every connection
    /// failure funnels into the same fixed-delay reconnect path; nothing
    /// here is allowed to panic the account task.
    pub async fn run(mut self) {
        loop {
            match self.run_connection().await {
                Ok(()) => {
                    info!(account = %self.account.id, "Connection ended");
                }
                Err(e) if e.is_transient() => {
                    warn!(account = %self.account.id, "Connection lost: {}", e);
                }
                Err(e) => {
                    warn!(account = %self.account.id, "Connection failed: {}", e);
                }
            }

            self.live.store(false, Ordering::SeqCst);
            self.folders.clear();
            // A failed connect never left Disconnected; only an established
            // connection passes through Closed
            if *self.state_tx.borrow() != ConnectionState::Disconnected {
                self.set_state(ConnectionState::Closed);
            }

            let delay = Duration::from_secs(self.settings.reconnect_secs);
            debug!(
                account = %self.account.id,
                delay_secs = self.settings.reconnect_secs,
                "Scheduling reconnect"
            );
            tokio::time::sleep(delay).await;
            self.set_state(ConnectionState::Reconnecting);
        }
    }

    /// One full connection lifecycle: connect, discover, backfill every
    /// folder, then listen on the inbox until the connection dies.
    async fn run_connection(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Connecting);
        let mut session = match self.client.connect(&self.account).await {
            Ok(session) => session,
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };
        self.set_state(ConnectionState::Connected);
        info!(account = %self.account.id, "Connected");

        self.folders = session.list_folders().await?;
        info!(account = %self.account.id, folders = self.folders.len(), "Discovered folders");

        self.set_state(ConnectionState::Syncing);
        for folder in &self.folders {
            match backfill_folder(
                session.as_mut(),
                &self.account,
                folder,
                &self.indexer,
                &self.settings,
                &self.locks,
            )
            .await
            {
                Ok(_) => {}
                Err(e) if e.invalidates_connection() => return Err(e),
                Err(e) => {
                    // Folder-scoped failure: log and move on to the next one
                    warn!(
                        account = %self.account.id,
                        folder = %folder.path,
                        "Backfill failed: {}",
                        e
                    );
                }
            }
        }

        let Some(inbox) = self
            .folders
            .iter()
            .find(|f| f.special_use == SpecialUse::Inbox)
            .cloned()
        else {
            warn!(account = %self.account.id, "No inbox folder discovered; nothing to watch");
            return Ok(());
        };

        self.live.store(true, Ordering::SeqCst);
        self.set_state(ConnectionState::Listening);
        let result = self.listen(session.as_mut(), &inbox).await;
        self.live.store(false, Ordering::SeqCst);
        result
    }

    /// Live phase: wait for new-message events, probing the connection with
    /// a no-op whenever a keep-alive period passes quietly.
    async fn listen(&self, session: &mut (dyn MailSession + '_), inbox: &Mailbox) -> Result<()> {
        let keepalive = Duration::from_secs(self.settings.keepalive_secs);
        loop {
            match session.wait_for_event(&inbox.path, keepalive).await? {
                SessionEvent::Closed => {
                    return Err(SyncError::ConnectionClosed(
                        "server closed the connection".to_string(),
                    ));
                }
                SessionEvent::Tick => {
                    if let Err(e) = session.noop().await {
                        return Err(SyncError::ConnectionClosed(format!(
                            "keep-alive probe failed: {}",
                            e
                        )));
                    }
                    debug!(account = %self.account.id, "Keep-alive probe ok");
                }
                SessionEvent::NewMessage => {
                    match self.handle_new_message(session, inbox).await {
                        Ok(()) => {}
                        Err(e) if e.invalidates_connection() => return Err(e),
                        Err(e) => {
                            warn!(account = %self.account.id, "Live update failed: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// Fetch and index the most recent message on the watched folder.
    /// Returns immediately when the subscriber has been deactivated.
    async fn handle_new_message(
        &self,
        session: &mut (dyn MailSession + '_),
        inbox: &Mailbox,
    ) -> Result<()> {
        if !self.live.load(Ordering::SeqCst) {
            debug!(account = %self.account.id, "Ignoring event on inactive subscriber");
            return Ok(());
        }

        let _guard = self.locks.acquire(&inbox.path).await;
        let status = session.status(&inbox.path).await?;
        if status.next_seq <= 1 {
            return Ok(());
        }
        let latest = status.next_seq - 1;

        let Some(raw) = session.fetch_by_seq(&inbox.path, latest).await? else {
            debug!(account = %self.account.id, seq = latest, "Latest message vanished");
            return Ok(());
        };

        let outcome = self.indexer.handle(&self.account, &raw, inbox).await?;
        debug!(
            account = %self.account.id,
            seq = latest,
            outcome = ?outcome,
            "Processed live update"
        );
        Ok(())
    }

    #[cfg(test)]
    fn deactivate(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn activate(&self) {
        self.live.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Classification, Classifier};
    use crate::client::FolderStatus;
    use crate::error::Result;
    use crate::models::{EmailCategory, RawMessage};
    use crate::store::{IndexStore, MemoryIndexStore};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::AtomicUsize;

    struct OkClassifier;

    #[async_trait]
    impl Classifier for OkClassifier {
        async fn classify(&self, _subject: &str, _body: &str) -> Result<Classification> {
            Ok(Classification {
                category: EmailCategory::NotInterested,
                confidence: 1.0,
            })
        }
    }

    /// Session fake that counts fetches and always reports one message
    struct CountingSession {
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MailSession for CountingSession {
        async fn list_folders(&mut self) -> Result<Vec<Mailbox>> {
            Ok(vec![])
        }

        async fn fetch_since(
            &mut self,
            _folder: &str,
            _since: DateTime<Utc>,
        ) -> Result<Vec<RawMessage>> {
            Ok(vec![])
        }

        async fn status(&mut self, _folder: &str) -> Result<FolderStatus> {
            Ok(FolderStatus {
                exists: 1,
                next_seq: 2,
            })
        }

        async fn fetch_by_seq(&mut self, _folder: &str, _seq: u32) -> Result<Option<RawMessage>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Some(RawMessage {
                uid: Some(1),
                message_id: Some("<live@test>".to_string()),
                subject: "live".to_string(),
                from: "a@example.com".to_string(),
                to: vec![],
                date: None,
                body: String::new(),
            }))
        }

        async fn noop(&mut self) -> Result<()> {
            Ok(())
        }

        async fn wait_for_event(
            &mut self,
            _folder: &str,
            _timeout: Duration,
        ) -> Result<SessionEvent> {
            Ok(SessionEvent::Tick)
        }
    }

    struct NoConnect;

    #[async_trait]
    impl MailClient for NoConnect {
        async fn connect(&self, _account: &Account) -> Result<Box<dyn MailSession>> {
            Err(SyncError::Network("unreachable".to_string()))
        }
    }

    fn supervisor(store: Arc<MemoryIndexStore>) -> AccountSupervisor {
        let account = Account {
            id: "a1".to_string(),
            host: "imap.example.com".to_string(),
            port: 993,
            username: "u".to_string(),
            password: "p".to_string(),
            use_tls: true,
        };
        let indexer = Arc::new(MessageIndexer::new(store, Arc::new(OkClassifier), vec![]));
        AccountSupervisor::new(account, Arc::new(NoConnect), indexer, SyncSettings::default())
    }

    fn inbox() -> Mailbox {
        Mailbox {
            name: "INBOX".to_string(),
            path: "INBOX".to_string(),
            flags: vec![],
            special_use: SpecialUse::Inbox,
        }
    }

    #[tokio::test]
    async fn test_inactive_subscriber_ignores_events() {
        let store = Arc::new(MemoryIndexStore::new());
        let supervisor = supervisor(store.clone());
        let fetches = Arc::new(AtomicUsize::new(0));
        let mut session = CountingSession {
            fetches: fetches.clone(),
        };

        supervisor.deactivate();
        supervisor
            .handle_new_message(&mut session, &inbox())
            .await
            .unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_active_subscriber_fetches_latest() {
        let store = Arc::new(MemoryIndexStore::new());
        let supervisor = supervisor(store.clone());
        let fetches = Arc::new(AtomicUsize::new(0));
        let mut session = CountingSession {
            fetches: fetches.clone(),
        };

        supervisor.activate();
        supervisor
            .handle_new_message(&mut session, &inbox())
            .await
            .unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_folder_locks_serialize() {
        let locks = FolderLocks::new();
        let guard = locks.acquire("INBOX").await;

        // A second acquire on the same folder must wait
        let locks2 = locks.clone();
        let second = tokio::spawn(async move {
            let _guard = locks2.acquire("INBOX").await;
        });
        tokio::task::yield_now().await;
        assert!(!second.is_finished());

        drop(guard);
        second.await.unwrap();

        // A different folder is unaffected
        let _other = locks.acquire("Sent").await;
    }
}
