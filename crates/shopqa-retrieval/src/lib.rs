//! shopqa-retrieval
//!
//! The retrieval orchestrator: builds (or loads) the product index once and
//! answers top-k queries against it.

pub mod retriever;

pub use retriever::{Retriever, RetrieverState, KEY_CORPUS_FINGERPRINT, KEY_DOCUMENTS_FINGERPRINT, KEY_MODEL_ID};
