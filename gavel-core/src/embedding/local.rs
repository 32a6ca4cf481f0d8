use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

use super::{EmbedError, Embedder};

const MODEL: EmbeddingModel = EmbeddingModel::AllMiniLML6V2;
const DIMENSIONS: usize = 384;
const MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Local embedding provider using fastembed with ONNX runtime.
///
/// The model handle needs `&mut` for inference, so calls are serialized
/// behind a `Mutex`; the trait contract stays safe for concurrent use.
pub struct LocalEmbedder {
    model: Mutex<TextEmbedding>,
}

impl LocalEmbedder {
    pub fn new() -> Result<Self, EmbedError> {
        let options = InitOptions::new(MODEL).with_show_download_progress(true);
        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbedError::ModelLoad(e.to_string()))?;
        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for LocalEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut model = self.model.lock().unwrap();
        model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbedError::EncodingFailed(e.to_string()))
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn model_name(&self) -> &str {
        MODEL_NAME
    }
}
