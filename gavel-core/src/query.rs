//! Query orchestration: embed, retrieve, compose.

use std::fmt;
use std::sync::Arc;

use crate::answer::{self, AnswerPayload};
use crate::caselaw::{CaseStore, CaseStoreError};
use crate::embedding::{EmbedError, Embedder};

/// Default number of cases retrieved per query.
pub const DEFAULT_TOP_K: usize = 3;

/// A query failed before an answer could be composed.
///
/// Either variant is fatal for the request; there is no partial-result
/// fallback and no retry. "Nothing retrieved" is not represented here —
/// the composer turns an empty retrieval into its fixed answer.
#[derive(Debug)]
pub enum QueryError {
    Embedding(EmbedError),
    Store(CaseStoreError),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedding(e) => write!(f, "embedding unavailable: {e}"),
            Self::Store(e) => write!(f, "case store unavailable: {e}"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Sequences the query path over an embedder and a case store.
///
/// Stateless across requests; both collaborators are shared read-only
/// handles constructed at startup.
pub struct QueryEngine {
    embedder: Arc<dyn Embedder>,
    cases: Arc<dyn CaseStore>,
    top_k: usize,
}

impl QueryEngine {
    pub fn new(embedder: Arc<dyn Embedder>, cases: Arc<dyn CaseStore>, top_k: usize) -> Self {
        Self {
            embedder,
            cases,
            top_k,
        }
    }

    /// Answer one legal question.
    ///
    /// The caller is responsible for the credit precondition; this
    /// engine neither checks nor debits balances.
    pub fn answer(&self, query: &str) -> Result<AnswerPayload, QueryError> {
        let vectors = self
            .embedder
            .embed(&[query])
            .map_err(QueryError::Embedding)?;
        let vector = vectors.into_iter().next().ok_or_else(|| {
            QueryError::Embedding(EmbedError::EncodingFailed(
                "embedder returned no vectors".into(),
            ))
        })?;

        let retrieved = self
            .cases
            .retrieve(&vector, self.top_k)
            .map_err(QueryError::Store)?;

        Ok(answer::compose(query, &retrieved))
    }
}
