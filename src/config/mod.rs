//! Configuration Management
//!
//! Loads BGG client settings and the optional API token from the environment.

pub mod bgg;
pub mod credentials;

// Re-export
pub use bgg::BggConfig;
pub use credentials::SecretString;
