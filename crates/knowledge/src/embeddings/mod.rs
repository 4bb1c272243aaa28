//! Embedding generation.
//!
//! Providers sit behind the [`EmbeddingProvider`] trait; [`create_provider`]
//! builds the one named in the configuration.

pub mod provider;
pub mod providers;
pub mod retry;

pub use provider::{create_provider, EmbeddingProvider};
pub use retry::RetryPolicy;
