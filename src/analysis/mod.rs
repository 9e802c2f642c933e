//! Analysis modules.
//!
//! Tallying of trade records by canonical identity.

pub mod aggregator;

pub use aggregator::*;
