//! Crate-level scenario tests.

mod retrieval_scenario;
