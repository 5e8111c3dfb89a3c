use super::{Collection, Document, StoredDocument};
use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Builder, Connection, Database};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

struct DbHandle {
    // Keeps the database open for the lifetime of the connection.
    _db: Database,
    conn: tokio::sync::Mutex<Connection>,
}

#[derive(Debug, Clone)]
struct FallbackEntry {
    collection: Collection,
    stored: StoredDocument,
}

/// Thin append/query store for prediction documents.
pub struct PredictionStore {
    db: Option<DbHandle>,
    // In-memory fallback storage
    fallback: Arc<Mutex<Vec<FallbackEntry>>>,
}

impl PredictionStore {
    pub async fn new(db_path: &str) -> Result<Self> {
        let mut storage = Self {
            db: None,
            fallback: Arc::new(Mutex::new(Vec::new())),
        };

        // Try to initialize database
        match storage.init_database(db_path).await {
            Ok(()) => {
                info!("Database initialized successfully: {}", db_path);
            }
            Err(e) => {
                warn!(
                    "Database initialization failed, using in-memory fallback: {}",
                    e
                );
            }
        }

        Ok(storage)
    }

    /// Store whose every write fails: no database and a poisoned fallback.
    #[cfg(test)]
    pub(crate) fn unavailable() -> Self {
        let fallback = Arc::new(Mutex::new(Vec::new()));
        let poisoned = Arc::clone(&fallback);
        let _ = std::thread::spawn(move || {
            let _guard = poisoned.lock();
            panic!("fallback poisoned for test");
        })
        .join();
        Self { db: None, fallback }
    }

    pub fn is_persistent(&self) -> bool {
        self.db.is_some()
    }

    async fn init_database(&mut self, db_path: &str) -> Result<()> {
        let db = Builder::new_local(db_path).build().await?;

        // A single connection keeps `:memory:` databases coherent.
        let conn = db.connect()?;
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                document TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            (),
        )
        .await?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection_created_at ON documents (collection, created_at)",
            (),
        )
        .await?;

        self.db = Some(DbHandle {
            _db: db,
            conn: tokio::sync::Mutex::new(conn),
        });
        Ok(())
    }

    /// Stamps `created_at`, appends the document and returns its id.
    pub async fn insert(&self, collection: Collection, document: Document) -> Result<String> {
        let stored = StoredDocument {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            document,
        };

        if let Some(ref db) = self.db {
            match self.insert_into_db(db, collection, &stored).await {
                Ok(()) => {
                    debug!("Document {} saved to {}", stored.id, collection);
                    return Ok(stored.id);
                }
                Err(e) => {
                    warn!("Failed to save to database, using fallback: {}", e);
                }
            }
        }

        let id = stored.id.clone();
        self.insert_into_fallback(FallbackEntry { collection, stored })?;
        Ok(id)
    }

    async fn insert_into_db(
        &self,
        db: &DbHandle,
        collection: Collection,
        stored: &StoredDocument,
    ) -> Result<()> {
        let document = serde_json::to_string(&stored.document)?;
        let conn = db.conn.lock().await;
        conn.execute(
            "INSERT INTO documents (id, collection, document, created_at) VALUES (?, ?, ?, ?)",
            (
                stored.id.as_str(),
                collection.as_str(),
                document,
                format_timestamp(&stored.created_at),
            ),
        )
        .await?;
        Ok(())
    }

    fn insert_into_fallback(&self, entry: FallbackEntry) -> Result<()> {
        let mut fallback = self
            .fallback
            .lock()
            .map_err(|e| Error::internal(format!("Mutex lock failed: {e}")))?;
        fallback.push(entry);
        Ok(())
    }

    /// Most recent documents first, at most `limit` of them.
    pub async fn query_recent(
        &self,
        collection: Collection,
        limit: usize,
    ) -> Result<Vec<StoredDocument>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // A failed read is an error, not an empty history.
        let mut documents = match self.db {
            Some(ref db) => self.query_db(db, collection, limit).await.map_err(|e| {
                error!("Failed to read {} from database: {}", collection, e);
                e
            })?,
            None => Vec::new(),
        };

        // Writes that missed the database still count as history.
        let mut recent_fallback = self.recent_from_fallback(collection, limit)?;
        if !recent_fallback.is_empty() {
            documents.append(&mut recent_fallback);
            documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            documents.truncate(limit);
        }

        debug!(
            "Retrieved {} documents from {}",
            documents.len(),
            collection
        );
        Ok(documents)
    }

    async fn query_db(
        &self,
        db: &DbHandle,
        collection: Collection,
        limit: usize,
    ) -> Result<Vec<StoredDocument>> {
        let conn = db.conn.lock().await;
        let mut rows = conn
            .query(
                "SELECT id, document, created_at FROM documents WHERE collection = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
                (collection.as_str(), limit as i64),
            )
            .await?;

        let mut documents = Vec::new();
        while let Some(row) = rows.next().await? {
            documents.push(parse_row(&row)?);
        }
        Ok(documents)
    }

    fn recent_from_fallback(
        &self,
        collection: Collection,
        limit: usize,
    ) -> Result<Vec<StoredDocument>> {
        let fallback = self
            .fallback
            .lock()
            .map_err(|e| Error::internal(format!("Mutex lock failed: {e}")))?;

        let mut documents: Vec<StoredDocument> = fallback
            .iter()
            .rev()
            .filter(|entry| entry.collection == collection)
            .map(|entry| entry.stored.clone())
            .collect();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        documents.truncate(limit);
        Ok(documents)
    }

    pub async fn get(&self, collection: Collection, id: &str) -> Result<Option<StoredDocument>> {
        if let Some(ref db) = self.db {
            let conn = db.conn.lock().await;
            let found = async {
                let mut rows = conn
                    .query(
                        "SELECT id, document, created_at FROM documents WHERE collection = ? AND id = ?",
                        (collection.as_str(), id),
                    )
                    .await?;
                match rows.next().await? {
                    Some(row) => parse_row(&row).map(Some),
                    None => Ok(None),
                }
            }
            .await;
            match found {
                Ok(Some(document)) => return Ok(Some(document)),
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to read {} from database: {}", collection, e);
                    return Err(e);
                }
            }
        }

        let fallback = self
            .fallback
            .lock()
            .map_err(|e| Error::internal(format!("Mutex lock failed: {e}")))?;
        Ok(fallback
            .iter()
            .find(|entry| entry.collection == collection && entry.stored.id == id)
            .map(|entry| entry.stored.clone()))
    }
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    // Fixed width, so text order matches time order.
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_row(row: &libsql::Row) -> Result<StoredDocument> {
    let id: String = row.get(0)?;
    let document: String = row.get(1)?;
    let created_at: String = row.get(2)?;

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::internal(format!("Failed to parse timestamp: {e}")))?
        .with_timezone(&Utc);

    Ok(StoredDocument {
        id,
        created_at,
        document: serde_json::from_str(&document)?,
    })
}
