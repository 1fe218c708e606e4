//! Email classification via an OpenAI-compatible chat-completions endpoint

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde_json::json;

use crate::error::{Result, SyncError};
use crate::models::EmailCategory;

/// Category used when the classification service is unavailable or returns
/// garbage. Fails closed: never triggers notifications.
pub const FALLBACK_CATEGORY: EmailCategory = EmailCategory::NotInterested;

/// A classification result with the model's confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub category: EmailCategory,
    pub confidence: f32,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify a message into one of the five category labels
    async fn classify(&self, subject: &str, body: &str) -> Result<Classification>;
}

/// Classifier calling an OpenAI-compatible chat API
pub struct LlmClassifier {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

/// Body text beyond this length adds cost without adding signal
const MAX_BODY_CHARS: usize = 4000;

impl LlmClassifier {
    pub fn new(endpoint: &str, model: &str, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    fn prompt(subject: &str, body: &str) -> String {
        let mut body = body.to_string();
        if body.len() > MAX_BODY_CHARS {
            let mut cut = MAX_BODY_CHARS;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        format!(
            "Classify the following email into exactly one of these categories: \
             Interested, MeetingBooked, NotInterested, Spam, OutOfOffice.\n\
             Reply with the category name only.\n\n\
             Subject: {}\n\nBody:\n{}",
            subject, body
        )
    }

    /// Extract a category from the model's reply. Exact label matches score
    /// full confidence; a label buried in extra prose scores lower.
    fn parse_label(content: &str) -> Option<Classification> {
        if let Some(category) = EmailCategory::from_label(content) {
            return Some(Classification {
                category,
                confidence: 1.0,
            });
        }

        // Longest label first: "NotInterested" must win over its
        // "Interested" suffix
        let mut by_length = EmailCategory::ALL;
        by_length.sort_by_key(|c| std::cmp::Reverse(c.as_str().len()));

        let lower = content.to_lowercase();
        by_length
            .iter()
            .find(|c| lower.contains(&c.as_str().to_lowercase()))
            .map(|&category| Classification {
                category,
                confidence: 0.7,
            })
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    async fn classify(&self, subject: &str, body: &str) -> Result<Classification> {
        let request = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                { "role": "user", "content": Self::prompt(subject, body) }
            ]
        });

        let mut builder = self.http.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SyncError::Classification(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SyncError::Classification(format!(
                "classifier returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SyncError::Classification(format!("invalid response: {}", e)))?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| SyncError::Classification("no completion in response".to_string()))?;

        Self::parse_label(content).ok_or_else(|| {
            SyncError::Classification(format!("unrecognized label: {:?}", content))
        })
    }
}
