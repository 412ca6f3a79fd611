//! SQLite-backed vector index using `sqlite-vec`.
//!
//! Chunks live in a plain `chunks` table; their vectors live in a `vec0`
//! virtual table joined by rowid. Similarity search is a brute-force
//! `vec_distance_cosine` scan filtered to one namespace, which is plenty for
//! per-document namespaces of a few hundred chunks.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use tokio_rusqlite::{Connection, ffi};
use tracing::{debug, warn};

use super::{ChunkRecord, IndexError, VectorIndex};

/// Vector index over a SQLite database with the `sqlite-vec` extension.
#[derive(Clone)]
pub struct SqliteVectorIndex {
    conn: Connection,
    dimensions: usize,
}

impl SqliteVectorIndex {
    /// Open (or create) the index at `path` for vectors of the given width.
    pub async fn open(path: impl AsRef<Path>, dimensions: usize) -> Result<Self, IndexError> {
        register_sqlite_vec()?;
        let conn = Connection::open(path)
            .await
            .map_err(|err| IndexError::Storage(err.to_string()))?;
        Self::finish_open(conn, dimensions).await
    }

    /// Open a throwaway in-memory index, mainly for tests.
    pub async fn open_in_memory(dimensions: usize) -> Result<Self, IndexError> {
        register_sqlite_vec()?;
        let conn = Connection::open_in_memory()
            .await
            .map_err(|err| IndexError::Storage(err.to_string()))?;
        Self::finish_open(conn, dimensions).await
    }

    async fn finish_open(conn: Connection, dimensions: usize) -> Result<Self, IndexError> {
        conn.call(|conn| {
            let result = conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0));
            match result {
                Ok(version) => {
                    debug!(version, "sqlite-vec extension loaded");
                    Ok(())
                }
                Err(err) => Err(tokio_rusqlite::Error::Error(err)),
            }
        })
        .await
        .map_err(|err| IndexError::Storage(err.to_string()))?;

        let index = Self { conn, dimensions };
        index.ensure_schema().await?;
        Ok(index)
    }

    async fn ensure_schema(&self) -> Result<(), IndexError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                namespace TEXT NOT NULL,
                file_name TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_namespace ON chunks(namespace);
            CREATE VIRTUAL TABLE IF NOT EXISTS chunks_embeddings USING vec0(
                embedding float[{}]
            );",
            self.dimensions
        );
        self.conn
            .call(move |conn| {
                conn.execute_batch(&ddl)
                    .map_err(tokio_rusqlite::Error::Error)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error<tokio_rusqlite::Error>| {
                IndexError::Storage(err.to_string())
            })
    }

    /// Vector width this index was opened with.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn insert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<(), IndexError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(chunks.len());
        for record in chunks {
            let Some(embedding) = record.embedding.clone() else {
                warn!(id = %record.id, "skipping chunk without embedding");
                continue;
            };
            if embedding.len() != self.dimensions {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimensions,
                    got: embedding.len(),
                });
            }
            let embedding_json = serde_json::to_string(&embedding)
                .map_err(|err| IndexError::Storage(err.to_string()))?;
            rows.push((record, embedding_json));
        }
        if rows.is_empty() {
            return Ok(());
        }

        self.conn
            .call(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Error)?;
                for (record, embedding_json) in rows {
                    tx.execute(
                        "INSERT INTO chunks (id, namespace, file_name, chunk_index, content, metadata) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        (
                            &record.id,
                            &record.namespace,
                            &record.file_name,
                            record.chunk_index as i64,
                            &record.content,
                            record.metadata.to_string(),
                        ),
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                    let rowid = tx.last_insert_rowid();
                    tx.execute(
                        "INSERT INTO chunks_embeddings (rowid, embedding) VALUES (?1, ?2)",
                        (rowid, &embedding_json),
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                }
                tx.commit().map_err(tokio_rusqlite::Error::Error)?;
                Ok(())
            })
            .await
            .map_err(|err: tokio_rusqlite::Error<tokio_rusqlite::Error>| {
                IndexError::Storage(err.to_string())
            })
    }

    async fn search(
        &self,
        namespace: &str,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }
        let embedding_json =
            serde_json::to_string(query).map_err(|err| IndexError::Storage(err.to_string()))?;
        let namespace = namespace.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT c.id, c.namespace, c.file_name, c.chunk_index, c.content, c.metadata, \
                         vec_distance_cosine(e.embedding, vec_f32(?1)) as distance \
                         FROM chunks c \
                         JOIN chunks_embeddings e ON c.rowid = e.rowid \
                         WHERE c.namespace = ?2 \
                         ORDER BY distance ASC \
                         LIMIT {}",
                        top_k
                    ))
                    .map_err(tokio_rusqlite::Error::Error)?;

                let rows = stmt
                    .query_map((&embedding_json, &namespace), |row| {
                        let record = ChunkRecord {
                            id: row.get(0)?,
                            namespace: row.get(1)?,
                            file_name: row.get(2)?,
                            chunk_index: row.get::<_, i64>(3)? as usize,
                            content: row.get(4)?,
                            metadata: row
                                .get::<_, String>(5)
                                .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
                                .unwrap_or_default(),
                            // Vectors stay in the vec0 table; readers never need them back.
                            embedding: None,
                        };
                        let distance: f32 = row.get(6)?;
                        // Cosine distance to similarity.
                        Ok((record, 1.0 - distance))
                    })
                    .map_err(tokio_rusqlite::Error::Error)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Error)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error<tokio_rusqlite::Error>| {
                IndexError::Storage(err.to_string())
            })
    }

    async fn sample_leading(
        &self,
        namespace: &str,
        limit: usize,
    ) -> Result<Vec<ChunkRecord>, IndexError> {
        let namespace = namespace.to_string();

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT id, namespace, file_name, chunk_index, content, metadata \
                         FROM chunks WHERE namespace = ?1 \
                         ORDER BY chunk_index ASC \
                         LIMIT {}",
                        limit
                    ))
                    .map_err(tokio_rusqlite::Error::Error)?;

                let rows = stmt
                    .query_map([&namespace], |row| {
                        Ok(ChunkRecord {
                            id: row.get(0)?,
                            namespace: row.get(1)?,
                            file_name: row.get(2)?,
                            chunk_index: row.get::<_, i64>(3)? as usize,
                            content: row.get(4)?,
                            metadata: row
                                .get::<_, String>(5)
                                .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
                                .unwrap_or_default(),
                            embedding: None,
                        })
                    })
                    .map_err(tokio_rusqlite::Error::Error)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Error)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error<tokio_rusqlite::Error>| {
                IndexError::Storage(err.to_string())
            })
    }

    async fn has_vectors(&self, namespace: &str) -> Result<bool, IndexError> {
        let namespace = namespace.to_string();

        self.conn
            .call(move |conn| {
                let exists: i64 = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM chunks WHERE namespace = ?1)",
                        [&namespace],
                        |row| row.get(0),
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                Ok(exists != 0)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error<tokio_rusqlite::Error>| {
                IndexError::Storage(err.to_string())
            })
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<usize, IndexError> {
        let namespace = namespace.to_string();

        self.conn
            .call(move |conn| {
                let tx = conn
                    .transaction()
                    .map_err(tokio_rusqlite::Error::Error)?;
                tx.execute(
                    "DELETE FROM chunks_embeddings WHERE rowid IN \
                     (SELECT rowid FROM chunks WHERE namespace = ?1)",
                    [&namespace],
                )
                .map_err(tokio_rusqlite::Error::Error)?;
                let deleted = tx
                    .execute("DELETE FROM chunks WHERE namespace = ?1", [&namespace])
                    .map_err(tokio_rusqlite::Error::Error)?;
                tx.commit().map_err(tokio_rusqlite::Error::Error)?;
                Ok(deleted)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error<tokio_rusqlite::Error>| {
                IndexError::Storage(err.to_string())
            })
    }

    async fn count(&self, namespace: &str) -> Result<usize, IndexError> {
        let namespace = namespace.to_string();

        self.conn
            .call(move |conn| {
                let count: i64 = conn
                    .query_row(
                        "SELECT COUNT(*) FROM chunks WHERE namespace = ?1",
                        [&namespace],
                        |row| row.get(0),
                    )
                    .map_err(tokio_rusqlite::Error::Error)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err: tokio_rusqlite::Error<tokio_rusqlite::Error>| {
                IndexError::Storage(err.to_string())
            })
    }
}

/// Register `sqlite-vec` as an auto extension, once per process.
fn register_sqlite_vec() -> Result<(), IndexError> {
    static REGISTER: OnceLock<Result<(), String>> = OnceLock::new();

    REGISTER
        .get_or_init(|| unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!(
                    "failed to register sqlite-vec extension (code {rc})"
                ))
            } else {
                Ok(())
            }
        })
        .clone()
        .map_err(IndexError::Storage)
}
