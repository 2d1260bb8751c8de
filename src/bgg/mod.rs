//! BGG XML API binding
//!
//! The client and fetch pipeline, the pieces it is composed of (rate
//! limiter, retry policy), and the response parser and record types.

pub mod client;
pub mod parser;
pub mod rate_limiter;
pub mod retry;
pub mod types;

// Re-export commonly used types
pub use client::BggClient;
pub use rate_limiter::{RateLimitRejection, RateLimiter};
pub use retry::{RetryDecision, RetryPolicy};
pub use types::{CollectionItem, CollectionResponse, Game};
