//! Per-message processing: fingerprint, dedup, classify, persist, notify

use std::sync::Arc;
use tracing::{debug, warn};

use crate::classifier::{Classifier, FALLBACK_CATEGORY};
use crate::error::Result;
use crate::fingerprint::fingerprint;
use crate::models::{Account, EmailCategory, Mailbox, MessageDocument, RawMessage};
use crate::notify::{notify_all, NotificationEvent, Notifier};
use crate::store::IndexStore;

/// What happened to a message handed to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new document was persisted with this category
    Indexed(EmailCategory),
    /// The document already existed; nothing was written
    Duplicate,
    /// The message had no protocol identifier and cannot be fingerprinted
    Skipped,
}

/// Classifies, persists, and fans out one message at a time.
///
/// Shared across all account supervisors; the index store's overwrite-by-id
/// semantics makes concurrent calls for the same logical message converge.
pub struct MessageIndexer {
    store: Arc<dyn IndexStore>,
    classifier: Arc<dyn Classifier>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl MessageIndexer {
    pub fn new(
        store: Arc<dyn IndexStore>,
        classifier: Arc<dyn Classifier>,
        notifiers: Vec<Arc<dyn Notifier>>,
    ) -> Self {
        Self {
            store,
            classifier,
            notifiers,
        }
    }

    /// Process one fetched message.
    ///
    /// Exactly one index write per distinct message; duplicate calls are
    /// no-ops. Classifier failure degrades to the fallback category and
    /// never aborts indexing; notification failures are logged and
    /// swallowed. Index store errors propagate to the caller.
    pub async fn handle(
        &self,
        account: &Account,
        raw: &RawMessage,
        mailbox: &Mailbox,
    ) -> Result<Outcome> {
        let Some(message_id) = raw.message_id.as_deref() else {
            debug!(
                account = %account.id,
                folder = %mailbox.path,
                uid = ?raw.uid,
                "Skipping message without Message-ID"
            );
            return Ok(Outcome::Skipped);
        };

        let id = fingerprint(message_id);
        if self.store.get(&id).await?.is_some() {
            debug!(account = %account.id, id = %id, "Document exists, skipping");
            return Ok(Outcome::Duplicate);
        }

        let classification = match self.classifier.classify(&raw.subject, &raw.body).await {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    account = %account.id,
                    subject = %raw.subject,
                    "Classification failed, using fallback: {}",
                    e
                );
                crate::classifier::Classification {
                    category: FALLBACK_CATEGORY,
                    confidence: 0.0,
                }
            }
        };

        let doc = MessageDocument {
            id: id.clone(),
            message_id: message_id.to_string(),
            subject: raw.subject.clone(),
            from: raw.from.clone(),
            to: raw.to.clone(),
            date: raw.date,
            account: account.id.clone(),
            folder: mailbox.path.clone(),
            folder_type: mailbox.special_use,
            raw_content: raw.body.clone(),
            ai_category: classification.category,
            ai_confidence: classification.confidence,
        };
        self.store.put(&id, &doc).await?;

        debug!(
            account = %account.id,
            folder = %mailbox.path,
            category = %classification.category,
            "Indexed message"
        );

        if classification.category == EmailCategory::Interested {
            let event = NotificationEvent {
                subject: raw.subject.clone(),
                from: raw.from.clone(),
                account: account.id.clone(),
            };
            notify_all(&self.notifiers, &event).await;
        }

        Ok(Outcome::Indexed(classification.category))
    }
}
