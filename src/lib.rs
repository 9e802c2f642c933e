//! unsmurf - identity resolution and trade aggregation for card markets.
//!
//! Maps puppet nations to their masters through community alias tables,
//! collapses numbered puppet names, and tallies trade partners by the
//! identity that actually owns them.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod index;
pub mod models;
pub mod report;
pub mod settings;
pub mod source;

// Re-export commonly used types
pub use analysis::{aggregate, tally};
pub use config::Config;
pub use error::SourceError;
pub use identity::{canonicalize, normalize_name};
pub use index::{AliasEntry, AliasIndex, CacheManager, MembershipSet, RefreshOutcome, Snapshot};
pub use models::{AliasRow, Role, TallyGroup, TallyMode, TradeRecord, TransferKind};
pub use settings::{Settings, SettingsStore};
pub use source::SourceLoader;
