// Library exports for bgg-provider

pub mod error;

// BGG XML API integration
pub mod bgg; // Client, fetch pipeline, parser
pub mod config; // Configuration management

pub mod catalog; // Batch details, collection polling, ownership merge
pub mod filter; // Downstream session-length filter

pub use bgg::{BggClient, CollectionItem, Game};
pub use catalog::{GameFetcher, CollectionPoller, MergeEngine, MergedCatalog};
pub use config::BggConfig;
pub use error::{CatalogError, FetchError, FetchFailure, ParseError};
