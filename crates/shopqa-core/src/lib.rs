//! shopqa-core
//!
//! Shared domain types, error taxonomy, configuration and corpus I/O for the
//! product retrieval engine.
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod corpus;
pub mod error;
pub mod request;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{Document, Embedding, ScoredDocument, SearchHit};
