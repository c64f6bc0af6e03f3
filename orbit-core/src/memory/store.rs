//! Namespaced key-value store abstraction backing the vector retriever and
//! any adapter that needs semantic search over a document collection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::SystemTime;
use thiserror::Error;

/// A hierarchical path identifying a collection, e.g. `["docs", "qa-sql"]`.
pub type Namespace = Vec<String>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("embedding error: {0}")]
    EmbeddingError(String),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

/// One stored value plus its namespace/key and timestamps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Item {
    pub namespace: Namespace,
    pub key: String,
    pub value: JsonValue,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Item {
    pub fn with_timestamps(
        namespace: Namespace,
        key: String,
        value: JsonValue,
        created_at: SystemTime,
        updated_at: SystemTime,
    ) -> Self {
        Self {
            namespace,
            key,
            value,
            created_at,
            updated_at,
        }
    }
}

/// An item returned from `search`, with an optional relevance score.
#[derive(Clone, Debug)]
pub struct SearchItem {
    pub item: Item,
    pub score: Option<f64>,
}

impl SearchItem {
    pub fn with_score(item: Item, score: f64) -> Self {
        Self {
            item,
            score: Some(score),
        }
    }

    pub fn from_item(item: Item) -> Self {
        Self { item, score: None }
    }
}

/// A flattened search hit, convenient for adapters that only need key/value/score.
#[derive(Clone, Debug, Serialize)]
pub struct StoreSearchHit {
    pub key: String,
    pub value: JsonValue,
    pub score: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    pub query: Option<String>,
    pub filter: Option<JsonValue>,
    pub limit: usize,
    pub offset: usize,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self {
            query: None,
            filter: None,
            limit: 10,
            offset: 0,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NamespaceMatchType {
    Prefix,
    Suffix,
}

#[derive(Clone, Debug)]
pub struct MatchCondition {
    pub path: Vec<String>,
    pub match_type: NamespaceMatchType,
}

#[derive(Clone, Debug, Default)]
pub struct ListNamespacesOptions {
    pub match_conditions: Vec<MatchCondition>,
    pub max_depth: Option<usize>,
    pub offset: usize,
    pub limit: usize,
}

impl ListNamespacesOptions {
    pub fn new() -> Self {
        Self {
            match_conditions: Vec::new(),
            max_depth: None,
            offset: 0,
            limit: 1000,
        }
    }
}

pub enum StoreOp {
    Get {
        namespace: Namespace,
        key: String,
    },
    Put {
        namespace: Namespace,
        key: String,
        value: Option<JsonValue>,
    },
    Search {
        namespace_prefix: Namespace,
        options: SearchOptions,
    },
    ListNamespaces {
        options: ListNamespacesOptions,
    },
}

pub enum StoreOpResult {
    Get(Option<Item>),
    Put,
    Search(Vec<SearchItem>),
    ListNamespaces(Vec<Namespace>),
}

/// A namespaced key-value store, with optional semantic search over `query`.
#[async_trait]
pub trait Store: Send + Sync {
    async fn put(&self, namespace: &Namespace, key: &str, value: &JsonValue) -> Result<(), StoreError>;
    async fn get(&self, namespace: &Namespace, key: &str) -> Result<Option<JsonValue>, StoreError>;
    async fn get_item(&self, namespace: &Namespace, key: &str) -> Result<Option<Item>, StoreError>;
    async fn delete(&self, namespace: &Namespace, key: &str) -> Result<(), StoreError>;
    async fn list(&self, namespace: &Namespace) -> Result<Vec<String>, StoreError>;
    async fn search(
        &self,
        namespace_prefix: &Namespace,
        options: SearchOptions,
    ) -> Result<Vec<SearchItem>, StoreError>;
    async fn list_namespaces(
        &self,
        options: ListNamespacesOptions,
    ) -> Result<Vec<Namespace>, StoreError>;
    async fn batch(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreOpResult>, StoreError>;
    async fn search_simple(
        &self,
        namespace: &Namespace,
        query: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<StoreSearchHit>, StoreError>;
}
