use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A configured mailbox account. Immutable once loaded; the sync engine only
/// ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
}

/// Semantic role of a folder, derived from its name and protocol flags
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SpecialUse {
    Inbox,
    Sent,
    Drafts,
    Spam,
    Trash,
    Important,
    Starred,
    Archive,
    Custom,
}

impl SpecialUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialUse::Inbox => "inbox",
            SpecialUse::Sent => "sent",
            SpecialUse::Drafts => "drafts",
            SpecialUse::Spam => "spam",
            SpecialUse::Trash => "trash",
            SpecialUse::Important => "important",
            SpecialUse::Starred => "starred",
            SpecialUse::Archive => "archive",
            SpecialUse::Custom => "custom",
        }
    }
}

impl fmt::Display for SpecialUse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered folder on a remote account. Derived once per discovery pass
/// and cached for the lifetime of the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mailbox {
    pub name: String,
    pub path: String,
    pub flags: Vec<String>,
    pub special_use: SpecialUse,
}

/// Per-account connection lifecycle state, owned exclusively by that
/// account's supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Syncing,
    Listening,
    Closed,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Syncing => "syncing",
            ConnectionState::Listening => "listening",
            ConnectionState::Closed => "closed",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// A message as fetched from the protocol client: envelope fields plus the
/// source content
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub uid: Option<u32>,
    pub message_id: Option<String>,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    pub date: Option<DateTime<Utc>>,
    pub body: String,
}

/// Category labels produced by the classification service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EmailCategory {
    Interested,
    MeetingBooked,
    NotInterested,
    Spam,
    OutOfOffice,
}

impl EmailCategory {
    pub const ALL: [EmailCategory; 5] = [
        EmailCategory::Interested,
        EmailCategory::MeetingBooked,
        EmailCategory::NotInterested,
        EmailCategory::Spam,
        EmailCategory::OutOfOffice,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailCategory::Interested => "Interested",
            EmailCategory::MeetingBooked => "MeetingBooked",
            EmailCategory::NotInterested => "NotInterested",
            EmailCategory::Spam => "Spam",
            EmailCategory::OutOfOffice => "OutOfOffice",
        }
    }

    /// Parse a label, tolerating case and separator differences
    /// ("meeting booked" and "MeetingBooked" are the same label)
    pub fn from_label(label: &str) -> Option<EmailCategory> {
        let normalized: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        Self::ALL
            .iter()
            .find(|c| c.as_str().to_lowercase() == normalized)
            .copied()
    }
}

impl fmt::Display for EmailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The document persisted to the index store, keyed by fingerprint.
///
/// Field names are part of the contract with the reporting layer; do not
/// rename without a migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDocument {
    pub id: String,
    pub message_id: String,
    pub subject: String,
    pub from: String,
    pub to: Vec<String>,
    pub date: Option<DateTime<Utc>>,
    pub account: String,
    pub folder: String,
    pub folder_type: SpecialUse,
    pub raw_content: String,
    pub ai_category: EmailCategory,
    pub ai_confidence: f32,
}
