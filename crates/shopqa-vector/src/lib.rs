//! shopqa-vector
//!
//! Exact nearest-neighbour search over dense vectors and its LanceDB-backed
//! persistence.

pub mod flat;
pub mod schema;
pub mod store;
pub mod table;

pub use flat::FlatIndex;
pub use store::StoredIndex;
