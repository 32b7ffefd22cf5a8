use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use shopqa_core::config::{DataSettings, Settings};
use shopqa_core::corpus;
use shopqa_core::traits::Embedder;
use shopqa_core::{Document, Embedding, Error, Result, ScoredDocument};
use shopqa_vector::store::{self, StoredIndex};
use shopqa_vector::FlatIndex;

/// Index meta key holding the id of the embedder that produced the vectors.
pub const KEY_MODEL_ID: &str = "model_id";
/// Index meta key holding the BLAKE3 digest of the corpus the index was built from.
pub const KEY_CORPUS_FINGERPRINT: &str = "corpus_fingerprint";
/// Index meta key holding the digest of the document list saved with the index.
pub const KEY_DOCUMENTS_FINGERPRINT: &str = "documents_fingerprint";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieverState {
    Unbuilt,
    Ready,
}

struct Loaded {
    index: FlatIndex,
    documents: Vec<Document>,
}

/// Semantic product retrieval over a persisted flat index.
///
/// Construct once at startup, call [`Retriever::ensure_index`] before serving,
/// then share it (e.g. behind an `Arc`) between concurrent callers of
/// [`Retriever::retrieve`]. Queries issued before the index is ready fail with
/// [`Error::IndexNotReady`].
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    data: DataSettings,
    top_k: usize,
    batch_size: usize,
    check_staleness: bool,
    loaded: OnceCell<Loaded>,
    builds: AtomicUsize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, settings: &Settings) -> Self {
        Self {
            embedder,
            data: settings.data.clone(),
            top_k: settings.retrieval.top_k,
            batch_size: settings.embedding.batch_size.max(1),
            check_staleness: settings.retrieval.check_staleness,
            loaded: OnceCell::new(),
            builds: AtomicUsize::new(0),
        }
    }

    /// Load the configured embedder and wrap it. Fails with
    /// [`Error::ModelUnavailable`] when the model cannot be loaded.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = shopqa_embed::load_embedder(&settings.embedding)?;
        Ok(Self::new(embedder, settings))
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> { &self.embedder }

    pub fn state(&self) -> RetrieverState {
        if self.loaded.initialized() { RetrieverState::Ready } else { RetrieverState::Unbuilt }
    }

    /// Number of builds this instance has performed.
    pub fn build_count(&self) -> usize { self.builds.load(Ordering::SeqCst) }

    /// Load the persisted index and document list, or build both from the
    /// corpus when either is missing. Concurrent callers share a single
    /// initialization; once ready, further calls return immediately.
    pub async fn ensure_index(&self) -> Result<()> {
        self.loaded.get_or_try_init(|| self.load_or_build()).await?;
        Ok(())
    }

    /// Drop the in-memory index. Persisted artifacts are left untouched.
    pub fn close(&mut self) {
        if self.loaded.take().is_some() {
            info!("retriever closed");
        }
    }

    /// The document list in index position order.
    pub fn documents(&self) -> Result<&[Document]> {
        self.loaded.get().map(|l| l.documents.as_slice()).ok_or(Error::IndexNotReady)
    }

    /// The `top_k` documents nearest to `query` (configured default when
    /// `None`), nearest first, each carrying its L2 distance as `_score`.
    pub fn retrieve(&self, query: &str, top_k: Option<usize>) -> Result<Vec<ScoredDocument>> {
        let loaded = self.loaded.get().ok_or(Error::IndexNotReady)?;
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidQuery("query must not be blank".into()));
        }
        let k = top_k.unwrap_or(self.top_k);
        if k == 0 {
            return Err(Error::InvalidQuery("top_k must be greater than zero".into()));
        }

        let vector = self.embedder.embed_one(query)?;
        let hits = loaded.index.search(&vector, k)?;
        debug!(query, k, hits = hits.len(), "retrieved");
        hits.into_iter()
            .map(|hit| {
                let document = loaded.documents.get(hit.position).cloned().ok_or_else(|| {
                    Error::Storage(format!("index position {} has no document", hit.position))
                })?;
                Ok(ScoredDocument::new(document, hit.distance))
            })
            .collect()
    }

    async fn load_or_build(&self) -> Result<Loaded> {
        match self.load_existing().await? {
            Some(loaded) => Ok(loaded),
            None => self.build().await,
        }
    }

    /// `Ok(None)` when the artifacts are absent (or stale, if checked) and a
    /// build is needed.
    async fn load_existing(&self) -> Result<Option<Loaded>> {
        let Some(stored) = store::try_load(&self.data.index_path).await? else {
            info!(path = %self.data.index_path.display(), "no persisted index, building");
            return Ok(None);
        };
        let Some(documents) = corpus::try_load_documents(&self.data.docs_path)? else {
            info!(path = %self.data.docs_path.display(), "no persisted document list, building");
            return Ok(None);
        };
        // a build that failed after saving the index can leave an older list behind
        let documents_fp = corpus::documents_fingerprint(&documents)?;
        if stored.meta.get(KEY_DOCUMENTS_FINGERPRINT) != Some(&documents_fp) {
            warn!(path = %self.data.docs_path.display(), "document list does not belong to the index, rebuilding");
            return Ok(None);
        }
        if self.check_staleness && self.is_stale(&stored)? {
            return Ok(None);
        }

        let StoredIndex { index, meta } = stored;
        if let Some(model_id) = meta.get(KEY_MODEL_ID) {
            if model_id != self.embedder.model_id() {
                warn!(stored = %model_id, active = self.embedder.model_id(), "index was built with a different model");
            }
        }
        if !index.is_empty() && index.dim() != self.embedder.dim() {
            return Err(Error::DimensionMismatch { expected: self.embedder.dim(), got: index.dim() });
        }
        if index.len() != documents.len() {
            return Err(Error::Storage(format!(
                "index holds {} vectors but the document list holds {} documents",
                index.len(),
                documents.len()
            )));
        }
        info!(documents = documents.len(), "index loaded");
        Ok(Some(Loaded { index, documents }))
    }

    fn is_stale(&self, stored: &StoredIndex) -> Result<bool> {
        let current = match corpus::corpus_fingerprint(&self.data.products_path) {
            Ok(fp) => fp,
            Err(Error::CorpusNotFound(path)) => {
                warn!(path = %path.display(), "corpus missing, keeping existing index");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        match stored.meta.get(KEY_CORPUS_FINGERPRINT) {
            Some(recorded) if *recorded == current => Ok(false),
            _ => {
                warn!(path = %self.data.products_path.display(), "corpus changed since the index was built, rebuilding");
                Ok(true)
            }
        }
    }

    async fn build(&self) -> Result<Loaded> {
        let (documents, fingerprint) = corpus::load_corpus_with_fingerprint(&self.data.products_path)?;

        let embeddings = self.embed_documents(&documents)?;
        let index = FlatIndex::build(&embeddings)?;
        if !index.is_empty() && index.dim() != self.embedder.dim() {
            return Err(Error::DimensionMismatch { expected: self.embedder.dim(), got: index.dim() });
        }

        let mut meta = BTreeMap::new();
        meta.insert(KEY_MODEL_ID.to_string(), self.embedder.model_id().to_string());
        meta.insert(KEY_CORPUS_FINGERPRINT.to_string(), fingerprint);
        meta.insert(KEY_DOCUMENTS_FINGERPRINT.to_string(), corpus::documents_fingerprint(&documents)?);
        corpus::remove_documents(&self.data.docs_path)?;
        store::save_with_meta(&index, &self.data.index_path, &meta).await?;
        corpus::save_documents(&self.data.docs_path, &documents)?;

        self.builds.fetch_add(1, Ordering::SeqCst);
        info!(documents = documents.len(), dim = index.dim(), model = self.embedder.model_id(), "index built");
        Ok(Loaded { index, documents })
    }

    fn embed_documents(&self, documents: &[Document]) -> Result<Vec<Embedding>> {
        let pb = progress_bar(documents.len(), &self.data.products_path);
        let mut out = Vec::with_capacity(documents.len());
        for chunk in documents.chunks(self.batch_size) {
            let texts: Vec<String> = chunk.iter().map(|d| d.description.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts)?;
            if vectors.len() != texts.len() {
                return Err(Error::InvalidEmbedding(format!(
                    "{} returned {} vectors for {} texts",
                    self.embedder.model_id(),
                    vectors.len(),
                    texts.len()
                )));
            }
            out.extend(vectors);
            pb.inc(chunk.len() as u64);
        }
        pb.finish_and_clear();
        Ok(out)
    }
}

fn progress_bar(len: usize, source: &Path) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(format!("embedding {}", source.display()));
    pb
}
