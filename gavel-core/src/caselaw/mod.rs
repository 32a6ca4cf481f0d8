pub mod sqlite;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors from case store operations.
///
/// "No matching cases" is never an error; retrieval against an empty
/// corpus returns an empty result.
#[derive(Debug)]
pub enum CaseStoreError {
    /// Infrastructure failure (I/O, SQL, corrupt row).
    Storage(String),
    /// Vector length differs from the store's configured dimensionality.
    DimensionMismatch { expected: usize, got: usize },
    /// A record with this case_id is already persisted.
    DuplicateCase(String),
    /// The on-disk corpus was embedded with a different model or
    /// dimensionality than the one configured now.
    ModelMismatch {
        stored_model: String,
        stored_dimensions: usize,
    },
}

impl fmt::Display for CaseStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(msg) => write!(f, "storage error: {msg}"),
            Self::DimensionMismatch { expected, got } => {
                write!(f, "dimension mismatch: expected {expected}, got {got}")
            }
            Self::DuplicateCase(id) => write!(f, "case '{id}' already exists"),
            Self::ModelMismatch {
                stored_model,
                stored_dimensions,
            } => write!(
                f,
                "corpus was embedded with {stored_model} ({stored_dimensions}d); re-ingest it with the configured model"
            ),
        }
    }
}

impl std::error::Error for CaseStoreError {}

/// A legal case with its precomputed embedding.
///
/// Records are written by offline ingestion and read-only on the query
/// path. The embedding is immutable once persisted; re-embedding means
/// rewriting the whole record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseRecord {
    pub case_id: String,
    pub legal_principles: String,
    pub verdict: String,
    pub embedding: Vec<f32>,
    pub source_file: String,
}

/// A retrieval hit: the case plus its cosine distance from the query
/// vector (`1 - cosine_similarity`, range [0, 2], lower is closer).
#[derive(Debug, Clone)]
pub struct RetrievedCase {
    pub case: CaseRecord,
    pub distance: f32,
}

/// Summary of the stored corpus.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusInfo {
    pub model_name: String,
    pub dimensions: usize,
    pub case_count: usize,
}

/// Read-mostly store of embedded case records.
pub trait CaseStore: Send + Sync {
    /// Persist a new case. Fails on a duplicate `case_id` or an
    /// embedding of the wrong length.
    fn insert(&self, record: &CaseRecord) -> Result<(), CaseStoreError>;

    /// The `top_k` cases closest to `query` by ascending cosine
    /// distance, ties broken by ascending `case_id`. An empty corpus
    /// yields an empty result, not an error.
    fn retrieve(&self, query: &[f32], top_k: usize) -> Result<Vec<RetrievedCase>, CaseStoreError>;

    fn info(&self) -> Result<CorpusInfo, CaseStoreError>;
}
