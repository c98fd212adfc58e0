//! atoll — foundation types for the atoll symbolic-regression engine.
//!
//! The search itself lives in the member crates: `atoll-expr` holds the
//! expression algebra and tree generator, `atoll-search` the island engine.
//! This crate carries only what both need and what the outside world feeds
//! in: a seeded PRNG, tabular datasets, the key/value config scanner, and
//! the shared error type.

pub mod config;
pub mod dataset;
pub mod error;
pub mod rng;

pub use dataset::{DataSet, Point};
pub use error::AtollError;
pub use rng::Rng;
