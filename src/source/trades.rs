//! Trade record retrieval.

use crate::error::SourceError;
use crate::models::{Role, TradeRecord};
use crate::source::SourceLoader;
use serde::Deserialize;
use tracing::{debug, info};

/// Response envelope of the trades API.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TradesPayload {
    Envelope {
        #[serde(default)]
        trades: Vec<TradeRecord>,
    },
    Bare(Vec<TradeRecord>),
}

impl TradesPayload {
    fn into_records(self) -> Vec<TradeRecord> {
        match self {
            TradesPayload::Envelope { trades } => trades,
            TradesPayload::Bare(trades) => trades,
        }
    }
}

/// Decode a trades payload: `{"trades": [...]}` or a bare array.
pub fn parse_trades(text: &str, location: &str) -> Result<Vec<TradeRecord>, SourceError> {
    serde_json::from_str::<TradesPayload>(text)
        .map(TradesPayload::into_records)
        .map_err(|e| SourceError::Decode {
            location: location.to_string(),
            message: e.to_string(),
        })
}

/// URL listing every trade where `nation` appears as `role`.
pub fn trades_url(api_base: &str, role: Role, nation: &str) -> String {
    format!(
        "{}/trades?limit=-1&{}={}&category=All&sortval=Timestamp&sortorder=Desc",
        api_base.trim_end_matches('/'),
        role.as_str(),
        nation
    )
}

/// Fetch all trades where `nation` is on the `role` side.
pub async fn fetch_trades(
    loader: &SourceLoader,
    api_base: &str,
    role: Role,
    nation: &str,
) -> Result<Vec<TradeRecord>, SourceError> {
    let url = trades_url(api_base, role, nation);
    let text = loader.fetch_text(&url).await?;
    let records = parse_trades(&text, &url)?;
    info!("Fetched {} trades where {} is {}", records.len(), nation, role);
    Ok(records)
}

/// Read trades from a local JSON file.
pub async fn read_trades(loader: &SourceLoader, path: &str) -> Result<Vec<TradeRecord>, SourceError> {
    let text = loader.fetch_text(path).await?;
    let records = parse_trades(&text, path)?;
    debug!("Read {} trades from {}", records.len(), path);
    Ok(records)
}
