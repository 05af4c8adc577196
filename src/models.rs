//! Token records as returned by the REST API
//!
//! Only the fields the explorer displays are modelled; unknown fields are
//! ignored on decode.

use crate::query::Referencing;
use serde::{Deserialize, Serialize};

/// Token pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPool {
    /// Pool id
    pub id: String,
    /// Display name
    pub name: String,
    /// Ticker symbol
    #[serde(default)]
    pub symbol: Option<String>,
    /// `fungible` or `nonfungible`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Token standard, e.g. `ERC20`
    #[serde(default)]
    pub standard: Option<String>,
    /// Connector plugin name
    #[serde(default)]
    pub connector: Option<String>,
    /// Decimal places for amounts
    #[serde(default)]
    pub decimals: u32,
    /// Creation time (RFC 3339)
    #[serde(default)]
    pub created: Option<String>,
}

/// Token transfer, mint or burn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    /// Transfer id
    pub local_id: String,
    /// `mint`, `burn` or `transfer`
    #[serde(rename = "type")]
    pub kind: String,
    /// Pool the transfer belongs to
    pub pool: String,
    /// Amount as a decimal string
    pub amount: String,
    /// Source key, absent for mints
    #[serde(default)]
    pub from: Option<String>,
    /// Destination key, absent for burns
    #[serde(default)]
    pub to: Option<String>,
    /// Signing key
    #[serde(default)]
    pub key: Option<String>,
    /// Creation time (RFC 3339)
    #[serde(default)]
    pub created: Option<String>,
}

impl Referencing for TokenTransfer {
    fn reference_id(&self) -> Option<&str> {
        Some(&self.pool)
    }
}
