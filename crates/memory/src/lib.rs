//! Durable trajectory memory
//!
//! A single-file SQLite store of trajectories with usage statistics, and the
//! hybrid retriever that ranks them for a (site, task_type, intent) request.

pub mod errors;
pub mod retrieval;
pub mod store;

pub use errors::StoreError;
pub use retrieval::{HybridRetriever, RetrievalHit, RetrievalQuery, ScoreDetail};
pub use store::{ListFilter, MemoryStore};
