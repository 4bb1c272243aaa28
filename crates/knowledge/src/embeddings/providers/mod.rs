//! Embedding provider implementations.

pub mod google;
pub mod hashing;

pub use google::GoogleProvider;
pub use hashing::HashingProvider;
