//! Alias, membership and card-name indices, and the cache that publishes
//! the first two.

pub mod alias;
pub mod cache;
pub mod cards;
pub mod membership;

pub use alias::{AliasEntry, AliasIndex};
pub use cache::{CacheManager, RefreshOutcome, Snapshot, SourceData, DEFAULT_VALIDITY_WINDOW};
pub use cards::CardNames;
pub use membership::MembershipSet;
