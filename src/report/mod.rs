//! Report generation.

pub mod generator;
pub mod listing;

pub use generator::*;
pub use listing::{build_listing, generate_json_listing, generate_markdown_listing};
