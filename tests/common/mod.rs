//! Common test utilities and fixtures

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use inboxd::classifier::{Classification, Classifier};
use inboxd::client::{FolderStatus, MailClient, MailSession, SessionEvent};
use inboxd::error::{Result, SyncError};
use inboxd::folders;
use inboxd::models::{Account, EmailCategory, Mailbox, RawMessage};
use inboxd::notify::{NotificationEvent, Notifier};

pub fn test_account(id: &str) -> Account {
    Account {
        id: id.to_string(),
        host: format!("imap.{}.example.com", id),
        port: 993,
        username: format!("{}@example.com", id),
        password: "secret".to_string(),
        use_tls: true,
    }
}

pub fn test_mailbox(path: &str) -> Mailbox {
    Mailbox {
        name: path.to_string(),
        path: path.to_string(),
        flags: vec![],
        special_use: folders::classify(path, &[]),
    }
}

pub fn test_message(message_id: &str, subject: &str) -> RawMessage {
    RawMessage {
        uid: None,
        message_id: Some(message_id.to_string()),
        subject: subject.to_string(),
        from: "Alice Example <alice@example.com>".to_string(),
        to: vec!["me@example.com".to_string()],
        date: None,
        body: format!("body of {}", subject),
    }
}

/// Script for one connection's lifetime
#[derive(Clone, Default)]
pub struct SessionScript {
    pub folders: Vec<Mailbox>,
    /// Backfill content per folder path
    pub messages: HashMap<String, Vec<RawMessage>>,
    /// Messages that "arrive" after backfill; visible to status/fetch_by_seq
    /// but not to fetch_since
    pub live: HashMap<String, Vec<RawMessage>>,
    /// Folders whose backfill fetch fails with a protocol error
    pub failing_folders: Vec<String>,
    /// Events delivered in order; when exhausted the session idles
    pub events: Vec<SessionEvent>,
}

impl SessionScript {
    pub fn with_inbox(messages: Vec<RawMessage>) -> Self {
        let inbox = test_mailbox("INBOX");
        let mut script = SessionScript {
            folders: vec![inbox.clone()],
            ..Default::default()
        };
        script.messages.insert(inbox.path, messages);
        script
    }
}

/// Per-account connection scripting and counters
#[derive(Default)]
pub struct AccountScript {
    pub fail_connect: std::sync::atomic::AtomicBool,
    sessions: Mutex<VecDeque<SessionScript>>,
    fallback: Mutex<Option<SessionScript>>,
    connects: AtomicUsize,
    single_fetches: AtomicUsize,
}

impl AccountScript {
    pub fn push_session(&self, script: SessionScript) {
        self.sessions.lock().unwrap().push_back(script);
    }

    /// Script used once the queued sessions are exhausted
    pub fn set_fallback(&self, script: SessionScript) {
        *self.fallback.lock().unwrap() = Some(script);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn single_fetches(&self) -> usize {
        self.single_fetches.load(Ordering::SeqCst)
    }
}

/// Mail client whose sessions replay pre-scripted folders, messages, and
/// events. Dispatches per account id, so one client instance can serve a
/// multi-account engine.
#[derive(Default)]
pub struct ScriptedMailClient {
    accounts: Mutex<HashMap<String, Arc<AccountScript>>>,
}

impl ScriptedMailClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the script for an account
    pub fn script(&self, account_id: &str) -> Arc<AccountScript> {
        self.accounts
            .lock()
            .unwrap()
            .entry(account_id.to_string())
            .or_default()
            .clone()
    }
}

#[async_trait]
impl MailClient for ScriptedMailClient {
    async fn connect(&self, account: &Account) -> Result<Box<dyn MailSession>> {
        let script = self.script(&account.id);
        script.connects.fetch_add(1, Ordering::SeqCst);

        if script.fail_connect.load(Ordering::SeqCst) {
            return Err(SyncError::Network("scripted connect failure".to_string()));
        }

        let session_script = script
            .sessions
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| script.fallback.lock().unwrap().clone())
            .unwrap_or_default();

        Ok(Box::new(ScriptedSession {
            events: session_script.events.iter().copied().collect(),
            script: session_script,
            counters: script,
        }))
    }
}

pub struct ScriptedSession {
    script: SessionScript,
    events: VecDeque<SessionEvent>,
    counters: Arc<AccountScript>,
}

impl ScriptedSession {
    fn all_messages(&self, folder: &str) -> Vec<RawMessage> {
        let mut all = self
            .script
            .messages
            .get(folder)
            .cloned()
            .unwrap_or_default();
        all.extend(self.script.live.get(folder).cloned().unwrap_or_default());
        all
    }
}

#[async_trait]
impl MailSession for ScriptedSession {
    async fn list_folders(&mut self) -> Result<Vec<Mailbox>> {
        Ok(self.script.folders.clone())
    }

    async fn fetch_since(
        &mut self,
        folder: &str,
        _since: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>> {
        if self.script.failing_folders.iter().any(|f| f == folder) {
            return Err(SyncError::Protocol(format!(
                "scripted fetch failure on {}",
                folder
            )));
        }
        Ok(self
            .script
            .messages
            .get(folder)
            .cloned()
            .unwrap_or_default())
    }

    async fn status(&mut self, folder: &str) -> Result<FolderStatus> {
        let exists = self.all_messages(folder).len() as u32;
        Ok(FolderStatus {
            exists,
            next_seq: exists + 1,
        })
    }

    async fn fetch_by_seq(&mut self, folder: &str, seq: u32) -> Result<Option<RawMessage>> {
        self.counters.single_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .all_messages(folder)
            .get(seq.saturating_sub(1) as usize)
            .cloned())
    }

    async fn noop(&mut self) -> Result<()> {
        Ok(())
    }

    async fn wait_for_event(
        &mut self,
        _folder: &str,
        timeout: Duration,
    ) -> Result<SessionEvent> {
        if let Some(event) = self.events.pop_front() {
            return Ok(event);
        }
        tokio::time::sleep(timeout).await;
        Ok(SessionEvent::Tick)
    }
}

/// Classifier returning a fixed category, or failing on demand
pub struct StubClassifier {
    category: EmailCategory,
    fail: bool,
}

impl StubClassifier {
    pub fn always(category: EmailCategory) -> Self {
        Self {
            category,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            category: EmailCategory::NotInterested,
            fail: true,
        }
    }
}

#[async_trait]
impl Classifier for StubClassifier {
    async fn classify(&self, _subject: &str, _body: &str) -> Result<Classification> {
        if self.fail {
            return Err(SyncError::Classification(
                "scripted classifier failure".to_string(),
            ));
        }
        Ok(Classification {
            category: self.category,
            confidence: 1.0,
        })
    }
}

/// Notifier that records every delivered event
pub struct RecordingNotifier {
    name: &'static str,
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Poll a condition under virtual time, panicking if it never holds
pub async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..2000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("timed out waiting for: {}", what);
}
