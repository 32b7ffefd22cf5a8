use crate::error::Result;
use crate::types::Embedding;

/// Turns text into fixed-length vectors.
///
/// Implementations are loaded once and shared read-only between concurrent
/// callers. The same text must map to the same vector for a given model.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `bert:all-MiniLM-L6-v2:d384`).
    fn model_id(&self) -> &str;
    /// Embedding dimensionality.
    fn dim(&self) -> usize;
    /// One vector per input text, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    fn embed_one(&self, text: &str) -> Result<Embedding> {
        let mut out = self.embed_batch(&[text.to_string()])?;
        if out.len() != 1 {
            return Err(crate::error::Error::InvalidEmbedding(format!(
                "{} returned {} vectors for one text",
                self.model_id(),
                out.len()
            )));
        }
        Ok(out.remove(0))
    }
}
