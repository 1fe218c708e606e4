//! Multi-account mailbox synchronization engine
//!
//! Ingests mail from any number of remote accounts, classifies and indexes
//! each message exactly once, and fans out notifications for messages in the
//! interesting category.
//!
//! # Overview
//!
//! - **Connection supervision**: one independent task per account running a
//!   connect / backfill / listen / reconnect state machine
//! - **Backfill**: bounded historical fetch per discovered folder
//! - **Live updates**: IDLE-driven fetch of newly arrived inbox messages
//! - **Deduplication**: SHA-256 fingerprints over normalized Message-IDs as
//!   the index store primary key
//! - **Classification**: LLM-backed category labels with a fail-closed
//!   fallback
//! - **Notifications**: best-effort chat and webhook fan-out
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use inboxd::classifier::LlmClassifier;
//! use inboxd::config::Config;
//! use inboxd::imap::ImapMailClient;
//! use inboxd::orchestrator::SyncEngine;
//! use inboxd::store::ElasticIndexStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("inboxd.toml".as_ref()).await?;
//!
//!     let engine = SyncEngine::new(
//!         Arc::new(ImapMailClient::new()),
//!         Arc::new(ElasticIndexStore::new(&config.index.url, &config.index.index)),
//!         Arc::new(LlmClassifier::new(
//!             &config.classifier.endpoint,
//!             &config.classifier.model,
//!             config.classifier.api_key.clone(),
//!         )),
//!         vec![],
//!         config.sync.clone(),
//!     );
//!
//!     let _handles = engine.start(config.accounts()).await?;
//!     tokio::signal::ctrl_c().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`backfill`] - Bounded historical fetch per folder
//! - [`classifier`] - Classification service client
//! - [`client`] - Protocol client trait seam
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`fingerprint`] - Message-ID fingerprinting
//! - [`folders`] - Folder special-use classification
//! - [`imap`] - Production IMAP adapter
//! - [`models`] - Core data structures
//! - [`notify`] - Chat and webhook notification sinks
//! - [`orchestrator`] - Engine startup and stats
//! - [`pipeline`] - Per-message processing
//! - [`store`] - Index store trait and adapters
//! - [`supervisor`] - Per-account connection state machine

pub mod backfill;
pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod folders;
pub mod imap;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod pipeline;
pub mod store;
pub mod supervisor;

// Re-export commonly used types for convenience
pub use error::{Result, SyncError};

// Core data models
pub use models::{
    Account, ConnectionState, EmailCategory, Mailbox, MessageDocument, RawMessage, SpecialUse,
};

// Protocol seam
pub use client::{FolderStatus, MailClient, MailSession, SessionEvent};

// Engine types
pub use orchestrator::{SyncEngine, SyncReport};
pub use pipeline::{MessageIndexer, Outcome};
pub use supervisor::{AccountSupervisor, SupervisorHandle};

// Store types
pub use store::{AggregateField, Bucket, ElasticIndexStore, IndexStore, MemoryIndexStore};

// Classifier and notifier seams
pub use classifier::{Classification, Classifier, LlmClassifier, FALLBACK_CATEGORY};
pub use notify::{NotificationEvent, Notifier, SlackNotifier, WebhookNotifier};

// Config types
pub use config::{AccountConfig, Config, SyncSettings};
