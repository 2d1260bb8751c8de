//! Catalog assembly on top of the BGG binding
//!
//! - `batch`: game details for arbitrary id lists, chunked, partial failures isolated
//! - `collection`: a user's owned games, polling through deferred processing
//! - `merge`: several users' collections merged into one ownership-annotated list

pub mod batch;
pub mod collection;
pub mod merge;

// Re-export main types
pub use batch::{BatchOutcome, ChunkFailure, GameFetcher};
pub use collection::CollectionPoller;
pub use merge::{MergeEngine, MergedCatalog, OwnershipMap, SkippedUser, UserFailurePolicy};
