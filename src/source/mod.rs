//! External data: alias tables, membership lists and trade records.

pub mod loader;
pub mod trades;

pub use loader::{
    alias_rows, alias_rows_to_tsv, membership_lines, membership_to_text, parse_delimited,
    SourceLoader,
};
pub use trades::{fetch_trades, parse_trades, read_trades, trades_url};
