use std::cmp::Ordering;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use super::{CaseRecord, CaseStore, CaseStoreError, CorpusInfo, RetrievedCase};

/// SQLite-backed case store.
///
/// Embeddings are stored as little-endian f32 blobs next to the case
/// text. Similarity search is brute-force cosine distance computed in
/// Rust; the corpus sizes this service targets do not justify an ANN
/// index.
pub struct SqliteCaseStore {
    conn: Mutex<Connection>,
    model_name: String,
    dimensions: usize,
}

impl std::fmt::Debug for SqliteCaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCaseStore")
            .field("model_name", &self.model_name)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl SqliteCaseStore {
    /// Open (or create) the corpus database at `path`.
    ///
    /// Fails with `ModelMismatch` when existing rows were embedded with
    /// a different model or dimensionality than the pair given here; a
    /// stale corpus is a configuration error, caught before the first
    /// query rather than per request.
    pub fn open(path: &Path, model_name: &str, dimensions: usize) -> Result<Self, CaseStoreError> {
        let conn = Connection::open(path)
            .map_err(|e| CaseStoreError::Storage(format!("failed to open database: {e}")))?;
        Self::from_connection(conn, model_name, dimensions)
    }

    /// Open an in-memory corpus (for testing).
    pub fn open_in_memory(model_name: &str, dimensions: usize) -> Result<Self, CaseStoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CaseStoreError::Storage(format!("failed to open in-memory db: {e}")))?;
        Self::from_connection(conn, model_name, dimensions)
    }

    fn from_connection(
        conn: Connection,
        model_name: &str,
        dimensions: usize,
    ) -> Result<Self, CaseStoreError> {
        let store = Self {
            conn: Mutex::new(conn),
            model_name: model_name.to_string(),
            dimensions,
        };
        store.migrate()?;
        store.check_corpus_compat()?;
        Ok(store)
    }

    /// Read the stored model/dimensions/count of an existing corpus
    /// without loading an embedder (for operator tooling).
    pub fn describe(path: &Path) -> Result<CorpusInfo, CaseStoreError> {
        let conn = Connection::open(path)
            .map_err(|e| CaseStoreError::Storage(format!("failed to open database: {e}")))?;
        let stored: Option<(String, i64)> = conn
            .query_row(
                "SELECT model_name, dimensions FROM cases LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| CaseStoreError::Storage(format!("failed to read corpus: {e}")))?;
        let count: usize = conn
            .query_row("SELECT COUNT(*) FROM cases", [], |row| row.get(0))
            .map_err(|e| CaseStoreError::Storage(format!("failed to count cases: {e}")))?;
        let (model_name, dimensions) = match stored {
            Some((m, d)) => (m, d as usize),
            None => (String::new(), 0),
        };
        Ok(CorpusInfo {
            model_name,
            dimensions,
            case_count: count,
        })
    }

    fn migrate(&self) -> Result<(), CaseStoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS cases (
                case_id TEXT PRIMARY KEY,
                legal_principles TEXT NOT NULL,
                verdict TEXT NOT NULL,
                embedding BLOB NOT NULL,
                source_file TEXT NOT NULL,
                model_name TEXT NOT NULL,
                dimensions INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| CaseStoreError::Storage(format!("migration failed: {e}")))?;
        Ok(())
    }

    fn check_corpus_compat(&self) -> Result<(), CaseStoreError> {
        let conn = self.conn.lock().unwrap();
        let stored: Option<(String, i64)> = conn
            .query_row(
                "SELECT model_name, dimensions FROM cases LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| CaseStoreError::Storage(format!("compat check failed: {e}")))?;

        if let Some((stored_model, stored_dims)) = stored {
            if stored_model != self.model_name || stored_dims as usize != self.dimensions {
                return Err(CaseStoreError::ModelMismatch {
                    stored_model,
                    stored_dimensions: stored_dims as usize,
                });
            }
        }
        Ok(())
    }
}

/// Encode an embedding as a little-endian byte blob.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &v in embedding {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian byte blob back into an embedding.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine distance `1 - cosine_similarity`. A zero-norm vector has
/// similarity 0 with everything, so its distance is 1.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

impl CaseStore for SqliteCaseStore {
    fn insert(&self, record: &CaseRecord) -> Result<(), CaseStoreError> {
        if record.embedding.len() != self.dimensions {
            return Err(CaseStoreError::DimensionMismatch {
                expected: self.dimensions,
                got: record.embedding.len(),
            });
        }

        let conn = self.conn.lock().unwrap();
        let blob = embedding_to_bytes(&record.embedding);
        let now = Utc::now().to_rfc3339();

        let result = conn.execute(
            "INSERT INTO cases (case_id, legal_principles, verdict, embedding, source_file, model_name, dimensions, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.case_id,
                record.legal_principles,
                record.verdict,
                blob,
                record.source_file,
                self.model_name,
                self.dimensions as i64,
                now,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(CaseStoreError::DuplicateCase(record.case_id.clone()))
            }
            Err(e) => Err(CaseStoreError::Storage(format!(
                "failed to insert case: {e}"
            ))),
        }
    }

    fn retrieve(&self, query: &[f32], top_k: usize) -> Result<Vec<RetrievedCase>, CaseStoreError> {
        if query.len() != self.dimensions {
            return Err(CaseStoreError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT case_id, legal_principles, verdict, embedding, source_file FROM cases",
            )
            .map_err(|e| CaseStoreError::Storage(format!("failed to prepare retrieval: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                let case_id: String = row.get(0)?;
                let legal_principles: String = row.get(1)?;
                let verdict: String = row.get(2)?;
                let blob: Vec<u8> = row.get(3)?;
                let source_file: String = row.get(4)?;
                Ok((case_id, legal_principles, verdict, blob, source_file))
            })
            .map_err(|e| CaseStoreError::Storage(format!("retrieval query failed: {e}")))?;

        let mut scored: Vec<RetrievedCase> = Vec::new();
        for row in rows {
            let (case_id, legal_principles, verdict, blob, source_file) =
                row.map_err(|e| CaseStoreError::Storage(format!("failed to read row: {e}")))?;
            let embedding = bytes_to_embedding(&blob);
            let distance = cosine_distance(query, &embedding);
            scored.push(RetrievedCase {
                case: CaseRecord {
                    case_id,
                    legal_principles,
                    verdict,
                    embedding,
                    source_file,
                },
                distance,
            });
        }

        // Ascending distance; equal distances order by case_id so the
        // result is deterministic.
        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.case.case_id.cmp(&b.case.case_id))
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    fn info(&self) -> Result<CorpusInfo, CaseStoreError> {
        let conn = self.conn.lock().unwrap();
        let count: usize = conn
            .query_row("SELECT COUNT(*) FROM cases", [], |row| row.get(0))
            .map_err(|e| CaseStoreError::Storage(format!("failed to count cases: {e}")))?;

        Ok(CorpusInfo {
            model_name: self.model_name.clone(),
            dimensions: self.dimensions,
            case_count: count,
        })
    }
}
