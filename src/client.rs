//! Protocol client seam for remote mailbox access
//!
//! The sync engine talks to mail servers through these traits only. The
//! production IMAP adapter lives in [`crate::imap`]; tests substitute
//! scripted implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::Result;
use crate::models::{Account, Mailbox, RawMessage};

/// Events surfaced by a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The server signalled new activity on the watched folder
    NewMessage,
    /// Nothing happened within the requested wait; the caller decides
    /// whether to probe the connection
    Tick,
    /// The server closed the connection
    Closed,
}

/// Snapshot of a folder's message counters
#[derive(Debug, Clone, Copy)]
pub struct FolderStatus {
    /// Number of messages currently in the folder
    pub exists: u32,
    /// Sequence number the next arriving message will get
    pub next_seq: u32,
}

/// Factory for per-account connections
#[async_trait]
pub trait MailClient: Send + Sync {
    /// Establish an authenticated session for the given account
    async fn connect(&self, account: &Account) -> Result<Box<dyn MailSession>>;
}

/// One authenticated connection to a mail server.
///
/// All operations take `&mut self`: a session is owned by a single account
/// supervisor and never shared.
#[async_trait]
pub trait MailSession: Send {
    /// Discover the account's folders, with their protocol flags
    async fn list_folders(&mut self) -> Result<Vec<Mailbox>>;

    /// Fetch all messages received since `since`, with full envelope and
    /// source content, in the order the server yields them
    async fn fetch_since(
        &mut self,
        folder: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RawMessage>>;

    /// Query the folder's current message counters
    async fn status(&mut self, folder: &str) -> Result<FolderStatus>;

    /// Fetch a single message by sequence number
    async fn fetch_by_seq(&mut self, folder: &str, seq: u32) -> Result<Option<RawMessage>>;

    /// No-op probe confirming the connection is still usable
    async fn noop(&mut self) -> Result<()>;

    /// Wait for the next event on the watched folder, or `Tick` after
    /// `timeout`. A broken connection surfaces as `Closed` or as a
    /// transient error.
    async fn wait_for_event(&mut self, folder: &str, timeout: Duration) -> Result<SessionEvent>;
}
