//! Document store boundary.
//!
//! The ledger never talks to a database directly. Every read and write goes
//! through [`DocumentStore`], a keyed JSON document API with per-document
//! versions. Writes are conditional on the version the caller last observed,
//! which is what the optimistic-concurrency retry loops in the repositories
//! are built on.

pub mod memory;
pub mod mysql;

use std::cmp::Ordering;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by a document store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// The expected version no longer matches (or the key already exists on insert)
    #[error("version conflict on {collection}/{id}")]
    Conflict { collection: String, id: String },

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed document: {0}")]
    Malformed(String),
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn conflict(collection: &str, id: &str) -> Self {
        StoreError::Conflict {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    /// Timeouts and outages, as opposed to answers from a healthy store
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Unavailable(_))
    }
}

/// A stored document together with its concurrency version
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub version: u64,
    pub body: Value,
}

/// Comparison operator for [`DocumentStore::query_by_field`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Operand must be a JSON array; matches when the field equals any element
    In,
}

impl FieldOp {
    /// Evaluate the operator against a field value.
    ///
    /// Ordering operators only compare numbers with numbers and strings with
    /// strings (ISO dates sort correctly as strings). A missing field never
    /// matches.
    pub fn matches(self, actual: Option<&Value>, operand: &Value) -> bool {
        let Some(actual) = actual else {
            return false;
        };

        match self {
            FieldOp::Eq => actual == operand,
            FieldOp::Ne => actual != operand,
            FieldOp::In => operand
                .as_array()
                .map(|values| values.iter().any(|v| v == actual))
                .unwrap_or(false),
            FieldOp::Lt => compare(actual, operand) == Some(Ordering::Less),
            FieldOp::Lte => matches!(
                compare(actual, operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FieldOp::Gt => compare(actual, operand) == Some(Ordering::Greater),
            FieldOp::Gte => matches!(
                compare(actual, operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }

    pub(crate) fn sql_operator(self) -> &'static str {
        match self {
            FieldOp::Eq => "=",
            FieldOp::Ne => "<>",
            FieldOp::Lt => "<",
            FieldOp::Lte => "<=",
            FieldOp::Gt => ">",
            FieldOp::Gte => ">=",
            FieldOp::In => "IN",
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// One conditional write inside [`DocumentStore::atomic_batch`]
#[derive(Debug, Clone)]
pub struct BatchWrite {
    pub collection: String,
    pub id: String,
    pub expected_version: u64,
    pub body: Value,
}

/// Keyed JSON document store with conditional writes
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a new document under a store-assigned key
    async fn create(&self, collection: &str, body: Value) -> StoreResult<String>;

    /// Store a new document under a caller-chosen key; `Conflict` if the key exists
    async fn insert(&self, collection: &str, id: &str, body: Value) -> StoreResult<()>;

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Document>;

    /// Replace the body if the stored version still equals `expected_version`.
    /// Returns the new version.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        body: Value,
    ) -> StoreResult<u64>;

    async fn delete(&self, collection: &str, id: &str, expected_version: u64) -> StoreResult<()>;

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        op: FieldOp,
        value: Value,
    ) -> StoreResult<Vec<Document>>;

    /// Apply independent conditional writes. Each item succeeds or fails on its
    /// own; the caller inspects the per-item results.
    async fn atomic_batch(&self, writes: Vec<BatchWrite>) -> StoreResult<Vec<StoreResult<u64>>>;
}

/// Decorator that bounds every store call with a timeout
pub struct TimedStore {
    inner: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Store call timed out");
                Err(StoreError::Timeout(self.timeout))
            }
        }
    }
}

#[async_trait]
impl DocumentStore for TimedStore {
    async fn create(&self, collection: &str, body: Value) -> StoreResult<String> {
        self.bounded(self.inner.create(collection, body)).await
    }

    async fn insert(&self, collection: &str, id: &str, body: Value) -> StoreResult<()> {
        self.bounded(self.inner.insert(collection, id, body)).await
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Document> {
        self.bounded(self.inner.get(collection, id)).await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        expected_version: u64,
        body: Value,
    ) -> StoreResult<u64> {
        self.bounded(self.inner.update(collection, id, expected_version, body))
            .await
    }

    async fn delete(&self, collection: &str, id: &str, expected_version: u64) -> StoreResult<()> {
        self.bounded(self.inner.delete(collection, id, expected_version))
            .await
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        op: FieldOp,
        value: Value,
    ) -> StoreResult<Vec<Document>> {
        self.bounded(self.inner.query_by_field(collection, field, op, value))
            .await
    }

    async fn atomic_batch(&self, writes: Vec<BatchWrite>) -> StoreResult<Vec<StoreResult<u64>>> {
        self.bounded(self.inner.atomic_batch(writes)).await
    }
}
