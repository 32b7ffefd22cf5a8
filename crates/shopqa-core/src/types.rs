//! Domain types shared by the embedder, the index store and the retriever.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A dense vector produced by an [`crate::traits::Embedder`].
pub type Embedding = Vec<f32>;

/// Open bag of corpus fields beyond `title` and `description`.
pub type Metadata = Map<String, Value>;

/// Key under which a retrieval score is attached to a document.
pub const SCORE_FIELD: &str = "_score";

/// One product record from the corpus.
///
/// The position of a document in the corpus is its index position: the join
/// key between the vector index and the persisted document list. Fields other
/// than `title` and `description` are kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub description: String,
    #[serde(flatten)]
    pub extra: Metadata,
}

impl Document {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { title: title.into(), description: description.into(), extra: Metadata::new() }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// A document returned by a search, annotated with its L2 distance to the
/// query (lower is closer). Serializes as the document's fields plus `_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub document: Document,
    #[serde(rename = "_score")]
    pub score: f32,
}

impl ScoredDocument {
    pub fn new(mut document: Document, score: f32) -> Self {
        // a corpus record may carry a stale score; only the fresh one is kept
        document.extra.remove(SCORE_FIELD);
        Self { document, score }
    }
}

/// A raw search result: index position and squared L2 distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub position: usize,
    pub distance: f32,
}
