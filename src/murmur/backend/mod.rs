//! Hosted document database collaborator.
//!
//! The client never talks to a concrete database directly. Everything it needs
//! from the hosted backend (live queries, one-shot fetches and document writes)
//! goes through the [`DocumentStore`] trait so the synchronization engine can be
//! driven by any store, including the in-process [`InMemoryStore`] used by tests
//! and the integration harness.

pub mod memory;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub use memory::InMemoryStore;

/// Backend-assigned document identifier.
pub type DocumentId = String;

/// Field map of a single document.
pub type Fields = BTreeMap<String, FieldValue>;

/// A single field value as delivered by the backend.
///
/// Timestamps can arrive in several shapes: a native [`FieldValue::Timestamp`],
/// a `{seconds, nanoseconds}` map, or raw epoch/string values. They are all
/// normalized by [`crate::murmur::timestamps::resolve_timestamp`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Map(BTreeMap<String, FieldValue>),
    /// Write-only sentinel; the store replaces it with its own clock on write.
    ServerTimestamp,
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, FieldValue>> {
        match self {
            FieldValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Rank of the value's type in the cross-type query ordering.
    fn type_rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Integer(_) | FieldValue::Double(_) => 2,
            FieldValue::Timestamp(_) | FieldValue::ServerTimestamp => 3,
            FieldValue::String(_) => 4,
            FieldValue::Map(_) => 5,
        }
    }

    /// Total ordering used by stores when sorting and applying cursors.
    ///
    /// Values of different types order by type rank (null, bool, number,
    /// timestamp, string, map). Maps compare equal among themselves.
    pub fn query_cmp(&self, other: &FieldValue) -> Ordering {
        use FieldValue::*;
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Integer(a), Double(b)) => (*a as f64).total_cmp(b),
            (Double(a), Integer(b)) => a.total_cmp(&(*b as f64)),
            (Double(a), Double(b)) => a.total_cmp(b),
            (Timestamp(a), Timestamp(b)) => a.cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(value)
    }
}

/// A stored document: backend id plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(FieldValue::as_bool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, FieldValue),
}

impl Filter {
    fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::Eq(field, expected) => document.get(field) == Some(expected),
        }
    }
}

/// Query over a single collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    /// Only documents whose order-by value is strictly older than this cursor.
    pub before: Option<FieldValue>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(path: impl Into<String>) -> Self {
        Self {
            collection: path.into(),
            filters: Vec::new(),
            order_by: None,
            before: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn before(mut self, cursor: impl Into<FieldValue>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Evaluates the query against a snapshot of the collection.
    pub fn evaluate(&self, documents: &[Document]) -> Vec<Document> {
        let mut results: Vec<Document> = documents
            .iter()
            .filter(|doc| self.filters.iter().all(|f| f.matches(doc)))
            .cloned()
            .collect();

        if let Some(order) = &self.order_by {
            // Documents without the ordering field never match an ordered query.
            results.retain(|doc| doc.get(&order.field).is_some());

            if let Some(cursor) = &self.before {
                results.retain(|doc| {
                    doc.get(&order.field)
                        .is_some_and(|v| v.query_cmp(cursor) == Ordering::Less)
                });
            }

            results.sort_by(|a, b| {
                let (Some(av), Some(bv)) = (a.get(&order.field), b.get(&order.field)) else {
                    return Ordering::Equal;
                };
                let ord = av.query_cmp(bv).then_with(|| a.id.cmp(&b.id));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            results.truncate(limit);
        }

        results
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    Overwrite,
    Merge,
}

/// Errors surfaced by the backend collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("subscription dropped: {0}")]
    SubscriptionDropped(String),
}

/// One emission of a live query: the full current result set, or an error.
pub type LiveQueryEvent = std::result::Result<Vec<Document>, BackendError>;

/// Store-side end of a live query.
#[derive(Debug, Clone)]
pub struct LiveQuerySender {
    sender: mpsc::UnboundedSender<LiveQueryEvent>,
}

impl LiveQuerySender {
    /// Delivers an emission. Returns `false` once the handle has been cancelled or dropped.
    pub fn emit(&self, event: LiveQueryEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Cancellable handle yielding the emissions of a standing query.
///
/// Dropping the handle detaches it the same way [`LiveQuery::cancel`] does.
#[derive(Debug)]
pub struct LiveQuery {
    receiver: mpsc::UnboundedReceiver<LiveQueryEvent>,
}

impl LiveQuery {
    pub fn channel() -> (LiveQuerySender, LiveQuery) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (LiveQuerySender { sender }, LiveQuery { receiver })
    }

    /// Waits for the next emission. `None` once the store has detached the query.
    pub async fn next(&mut self) -> Option<LiveQueryEvent> {
        self.receiver.recv().await
    }

    /// Detaches from the store. Nothing is delivered after this call.
    pub fn cancel(mut self) {
        self.receiver.close();
    }
}

/// Operations the client consumes from the hosted document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Opens a standing query. The current result set is emitted immediately and
    /// again after every change affecting the collection.
    async fn subscribe(&self, query: Query) -> std::result::Result<LiveQuery, BackendError>;

    /// Runs a query once.
    async fn fetch_once(&self, query: Query) -> std::result::Result<Vec<Document>, BackendError>;

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> std::result::Result<Option<Document>, BackendError>;

    /// Creates a document with a backend-assigned id.
    async fn create_document(
        &self,
        collection: &str,
        fields: Fields,
    ) -> std::result::Result<DocumentId, BackendError>;

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        mode: SetMode,
    ) -> std::result::Result<(), BackendError>;
}
