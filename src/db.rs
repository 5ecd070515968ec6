// src/db.rs
use crate::config::StoreBackend;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use scylla::{frame::response::result::Row, query::Query, Session, SessionBuilder};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Holdings,
    Allocations,
    Performances,
    Summaries,
    Transactions,
}

impl Collection {
    pub const PORTFOLIO: [Collection; 4] = [
        Collection::Holdings,
        Collection::Allocations,
        Collection::Performances,
        Collection::Summaries,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Holdings => "holdings",
            Collection::Allocations => "allocations",
            Collection::Performances => "performances",
            Collection::Summaries => "summaries",
            Collection::Transactions => "transactions",
        }
    }
}

/// Schemaless document storage. Reads return documents in insertion order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;

    async fn find_one(&self, collection: Collection) -> Result<Option<Value>, StoreError>;

    async fn insert_many(&self, collection: Collection, docs: Vec<Value>) -> Result<(), StoreError>;

    async fn delete_all(&self, collection: Collection) -> Result<(), StoreError>;

    /// Releases the backend. Every later operation fails with
    /// `StoreError::Closed`.
    async fn close(&self) -> Result<(), StoreError>;
}

/// Opens the configured backend. The returned handle is shared by the query
/// service and must be closed at shutdown.
pub async fn open(backend: &StoreBackend) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match backend {
        StoreBackend::Memory => {
            warn!("Using in-memory store; data is lost when the process exits.");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Scylla { uri } => Ok(Arc::new(ScyllaStore::connect(uri).await?)),
    }
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Value>>>,
    closed: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        self.ensure_open()?;
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).cloned().unwrap_or_default())
    }

    async fn find_one(&self, collection: Collection) -> Result<Option<Value>, StoreError> {
        self.ensure_open()?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.first())
            .cloned())
    }

    async fn insert_many(&self, collection: Collection, docs: Vec<Value>) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut collections = self.collections.write().await;
        collections.entry(collection).or_default().extend(docs);
        Ok(())
    }

    async fn delete_all(&self, collection: Collection) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.collections.write().await.remove(&collection);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        self.collections.write().await.clear();
        Ok(())
    }
}

const KEYSPACE_DDL: &str = "CREATE KEYSPACE IF NOT EXISTS wealth_manager WITH REPLICATION = {'class': 'SimpleStrategy', 'replication_factor': 1}";
const TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS wealth_manager.documents (collection TEXT, seq BIGINT, id TEXT, doc TEXT, PRIMARY KEY (collection, seq, id)) WITH CLUSTERING ORDER BY (seq ASC, id ASC)";

/// Each collection is one partition. `seq` clusters documents in insertion
/// order, `id` (the document's `_id`) keeps rows distinct when two writers
/// land on the same `seq`, and `doc` holds the JSON text.
pub struct ScyllaStore {
    session: RwLock<Option<Session>>,
    last_seq: AtomicI64,
}

impl ScyllaStore {
    pub async fn connect(uri: &str) -> Result<Self, StoreError> {
        let session = SessionBuilder::new()
            .known_node(uri)
            .build()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        session.query(KEYSPACE_DDL, &[]).await.map_err(query_error)?;
        session.query(TABLE_DDL, &[]).await.map_err(query_error)?;

        info!("Successfully connected to ScyllaDB at {}.", uri);
        Ok(ScyllaStore {
            session: RwLock::new(Some(session)),
            last_seq: AtomicI64::new(0),
        })
    }

    async fn select(&self, collection: Collection, limit: Option<i32>) -> Result<Vec<Value>, StoreError> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(StoreError::Closed)?;
        let result = match limit {
            Some(limit) => {
                let query = Query::new(
                    "SELECT doc FROM wealth_manager.documents WHERE collection = ? LIMIT ?",
                );
                session.query(query, (collection.as_str(), limit)).await
            }
            None => {
                let query = Query::new("SELECT doc FROM wealth_manager.documents WHERE collection = ?");
                session.query(query, (collection.as_str(),)).await
            }
        }
        .map_err(query_error)?;

        result
            .rows
            .unwrap_or_default()
            .into_iter()
            .map(|row| decode_row(collection, row))
            .collect()
    }
}

/// Claims `count` consecutive sequence numbers starting no earlier than
/// `now` and strictly after anything this process handed out before, so a
/// clock that stalls or steps backwards never reuses a `seq`.
fn reserve_seq(last: &AtomicI64, now: i64, count: usize) -> i64 {
    let span = count.max(1) as i64;
    let previous = last
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            Some(now.max(current + 1) + span - 1)
        })
        .unwrap_or_else(|current| current);
    now.max(previous + 1)
}

fn document_key(doc: &Value) -> String {
    doc.get("_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn query_error<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::Query(err.to_string())
}

fn decode_row(collection: Collection, row: Row) -> Result<Value, StoreError> {
    let text = row
        .columns
        .first()
        .and_then(|column| column.as_ref())
        .and_then(|value| value.as_text())
        .ok_or_else(|| StoreError::Corrupt {
            collection: collection.as_str(),
            message: "missing doc column".to_string(),
        })?;
    serde_json::from_str(text).map_err(|e| StoreError::Corrupt {
        collection: collection.as_str(),
        message: e.to_string(),
    })
}

#[async_trait]
impl DocumentStore for ScyllaStore {
    async fn find_all(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        self.select(collection, None).await
    }

    async fn find_one(&self, collection: Collection) -> Result<Option<Value>, StoreError> {
        Ok(self.select(collection, Some(1)).await?.into_iter().next())
    }

    async fn insert_many(&self, collection: Collection, docs: Vec<Value>) -> Result<(), StoreError> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(StoreError::Closed)?;
        let query = Query::new(
            "INSERT INTO wealth_manager.documents (collection, seq, id, doc) VALUES (?, ?, ?, ?)",
        );
        let base = reserve_seq(&self.last_seq, Utc::now().timestamp_micros(), docs.len());
        for (offset, doc) in docs.iter().enumerate() {
            let text = serde_json::to_string(doc).map_err(|e| StoreError::Corrupt {
                collection: collection.as_str(),
                message: e.to_string(),
            })?;
            session
                .query(
                    query.clone(),
                    (collection.as_str(), base + offset as i64, document_key(doc), text),
                )
                .await
                .map_err(query_error)?;
        }
        Ok(())
    }

    async fn delete_all(&self, collection: Collection) -> Result<(), StoreError> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(StoreError::Closed)?;
        let query = Query::new("DELETE FROM wealth_manager.documents WHERE collection = ?");
        session
            .query(query, (collection.as_str(),))
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        // Dropping the session shuts down its connection pool.
        if self.session.write().await.take().is_some() {
            info!("Closed ScyllaDB session.");
        }
        Ok(())
    }
}
