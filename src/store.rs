//! Message index store: trait plus the Elasticsearch-compatible adapter and
//! an in-memory implementation

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Result, SyncError};
use crate::models::MessageDocument;

/// Fields the stats query can group by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateField {
    Account,
    Folder,
    FolderType,
}

impl AggregateField {
    /// Document field name as stored in the index
    pub fn field_name(&self) -> &'static str {
        match self {
            AggregateField::Account => "account",
            AggregateField::Folder => "folder",
            AggregateField::FolderType => "folderType",
        }
    }
}

/// One group in an aggregation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub key: String,
    pub count: u64,
}

/// Storage for message documents, keyed by fingerprint.
///
/// The create/overwrite-by-id semantics of `put` is the engine's sole
/// cross-account synchronization primitive: concurrent writes for the same
/// logical message converge to a single document.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Create the index/schema if it does not exist. Idempotent.
    async fn ensure_index(&self) -> Result<()>;

    /// Look up a document by id. `Ok(None)` means not found; any other
    /// failure is an error.
    async fn get(&self, id: &str) -> Result<Option<MessageDocument>>;

    /// Create or overwrite the document with the given id
    async fn put(&self, id: &str, doc: &MessageDocument) -> Result<()>;

    /// Total number of stored documents
    async fn count(&self) -> Result<u64>;

    /// Group document counts by the given field
    async fn aggregate(&self, field: AggregateField) -> Result<Vec<Bucket>>;
}

/// Index store backed by an Elasticsearch-compatible HTTP API
pub struct ElasticIndexStore {
    http: reqwest::Client,
    base_url: String,
    index: String,
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(rename = "_source")]
    source: MessageDocument,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

impl ElasticIndexStore {
    pub fn new(base_url: &str, index: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        }
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base_url, self.index)
    }

    fn doc_url(&self, id: &str) -> String {
        format!("{}/_doc/{}", self.index_url(), id)
    }

    fn mappings() -> serde_json::Value {
        json!({
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "messageId": { "type": "keyword" },
                    "subject": { "type": "text" },
                    "from": { "type": "keyword" },
                    "to": { "type": "keyword" },
                    "date": { "type": "date" },
                    "account": { "type": "keyword" },
                    "folder": { "type": "keyword" },
                    "folderType": { "type": "keyword" },
                    "rawContent": { "type": "text" },
                    "aiCategory": { "type": "keyword" },
                    "aiConfidence": { "type": "float" }
                }
            }
        })
    }
}

#[async_trait]
impl IndexStore for ElasticIndexStore {
    async fn ensure_index(&self) -> Result<()> {
        let response = self
            .http
            .put(self.index_url())
            .json(&Self::mappings())
            .send()
            .await
            .map_err(|e| SyncError::IndexStore(format!("create index request failed: {}", e)))?;

        if response.status().is_success() {
            tracing::info!(index = %self.index, "Created index");
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if body.contains("resource_already_exists_exception") {
            tracing::debug!(index = %self.index, "Index already exists");
            return Ok(());
        }

        Err(SyncError::IndexStore(format!(
            "create index returned {}: {}",
            status, body
        )))
    }

    async fn get(&self, id: &str) -> Result<Option<MessageDocument>> {
        let response = self
            .http
            .get(self.doc_url(id))
            .send()
            .await
            .map_err(|e| SyncError::IndexStore(format!("get request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(SyncError::IndexStore(format!(
                "get {} returned {}",
                id,
                response.status()
            )));
        }

        let body: GetResponse = response
            .json()
            .await
            .map_err(|e| SyncError::IndexStore(format!("invalid get response: {}", e)))?;
        Ok(Some(body.source))
    }

    async fn put(&self, id: &str, doc: &MessageDocument) -> Result<()> {
        let response = self
            .http
            .put(self.doc_url(id))
            .json(doc)
            .send()
            .await
            .map_err(|e| SyncError::IndexStore(format!("put request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SyncError::IndexStore(format!(
                "put {} returned {}",
                id,
                response.status()
            )));
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let response = self
            .http
            .get(format!("{}/_count", self.index_url()))
            .send()
            .await
            .map_err(|e| SyncError::IndexStore(format!("count request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SyncError::IndexStore(format!(
                "count returned {}",
                response.status()
            )));
        }

        let body: CountResponse = response
            .json()
            .await
            .map_err(|e| SyncError::IndexStore(format!("invalid count response: {}", e)))?;
        Ok(body.count)
    }

    async fn aggregate(&self, field: AggregateField) -> Result<Vec<Bucket>> {
        let query = json!({
            "size": 0,
            "aggs": {
                "counts": {
                    "terms": { "field": field.field_name(), "size": 1000 }
                }
            }
        });

        let response = self
            .http
            .post(format!("{}/_search", self.index_url()))
            .json(&query)
            .send()
            .await
            .map_err(|e| SyncError::IndexStore(format!("aggregate request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(SyncError::IndexStore(format!(
                "aggregate returned {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SyncError::IndexStore(format!("invalid aggregate response: {}", e)))?;

        let buckets = body["aggregations"]["counts"]["buckets"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        Ok(buckets
            .iter()
            .filter_map(|b| {
                Some(Bucket {
                    key: b["key"].as_str()?.to_string(),
                    count: b["doc_count"].as_u64()?,
                })
            })
            .collect())
    }
}

/// In-memory index store.
///
/// Used by the test suite and handy as a stand-in before a search cluster is
/// available.
#[derive(Default)]
pub struct MemoryIndexStore {
    documents: RwLock<HashMap<String, MessageDocument>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored documents, unordered
    pub fn documents(&self) -> Vec<MessageDocument> {
        self.documents.read().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn ensure_index(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<MessageDocument>> {
        Ok(self.documents.read().unwrap().get(id).cloned())
    }

    async fn put(&self, id: &str, doc: &MessageDocument) -> Result<()> {
        self.documents
            .write()
            .unwrap()
            .insert(id.to_string(), doc.clone());
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.documents.read().unwrap().len() as u64)
    }

    async fn aggregate(&self, field: AggregateField) -> Result<Vec<Bucket>> {
        let documents = self.documents.read().unwrap();
        let mut counts: HashMap<String, u64> = HashMap::new();
        for doc in documents.values() {
            let key = match field {
                AggregateField::Account => doc.account.clone(),
                AggregateField::Folder => doc.folder.clone(),
                AggregateField::FolderType => doc.folder_type.to_string(),
            };
            *counts.entry(key).or_default() += 1;
        }

        let mut buckets: Vec<Bucket> = counts
            .into_iter()
            .map(|(key, count)| Bucket { key, count })
            .collect();
        buckets.sort_by(|a, b| b.count.cmp(&a.count).then(a.key.cmp(&b.key)));
        Ok(buckets)
    }
}
