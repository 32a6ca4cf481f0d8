pub mod local;

use std::fmt;

/// Errors from the embedding layer.
///
/// Both variants are fatal for the request that hit them; the service
/// never retries an embedding call.
#[derive(Debug)]
pub enum EmbedError {
    /// The embedding model could not be loaded or initialized.
    ModelLoad(String),
    /// The model failed to encode the input texts.
    EncodingFailed(String),
}

impl fmt::Display for EmbedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelLoad(msg) => write!(f, "model load error: {msg}"),
            Self::EncodingFailed(msg) => write!(f, "encoding failed: {msg}"),
        }
    }
}

impl std::error::Error for EmbedError {}

/// Maps free text to fixed-length dense vectors.
///
/// Implementations are loaded once at process start and shared across
/// concurrent requests, so they must be `Send + Sync`. For a fixed model
/// version the mapping is deterministic: the same input text yields the
/// same vector.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts. Output order matches input order.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Dimensionality of every vector this embedder produces.
    fn dimensions(&self) -> usize;

    /// Model identifier, recorded alongside stored embeddings so a
    /// model change is detectable at startup.
    fn model_name(&self) -> &str;
}
