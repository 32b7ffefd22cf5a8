//! shopqa-embed
//!
//! Embedding providers: a candle BERT sentence embedder for real models and a
//! deterministic hashing embedder for tests and offline development.

use std::sync::Arc;

use tracing::info;

use shopqa_core::config::EmbeddingSettings;
use shopqa_core::traits::Embedder;
use shopqa_core::Result;

pub mod bert;
pub mod device;
pub mod hashing;
pub mod pool;
pub mod tokenize;

pub use bert::SentenceEmbedder;
pub use hashing::HashingEmbedder;
pub use pool::masked_mean_l2;

/// Build the embedder selected by configuration. Call once at startup; a
/// failure here ([`shopqa_core::Error::ModelUnavailable`]) is fatal.
pub fn load_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if settings.use_fake {
        info!(dim = settings.fake_dim, "using hashing embedder");
        return Ok(Arc::new(HashingEmbedder::new(settings.fake_dim)));
    }
    Ok(Arc::new(SentenceEmbedder::load(settings)?))
}
