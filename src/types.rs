//! Core types shared across modules
//!
//! This module defines the explorer collections a view can page through and
//! the named date ranges a view can restrict them to.

use crate::filter::{compile, FilterDraft, FilterToken, Operator};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field every collection is timestamped by
pub const CREATED_FIELD: &str = "created";

/// Explorer collection a view lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Namespace events
    Events,
    /// Transactions
    Transactions,
    /// Operations submitted to plugins
    Operations,
    /// Broadcast and private messages
    Messages,
    /// Data items
    Data,
    /// Blockchain events
    BlockchainEvents,
    /// Token pools
    TokenPools,
    /// Token transfers
    TokenTransfers,
    /// Token balances
    TokenBalances,
}

impl EntityKind {
    /// Every collection
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Events,
        EntityKind::Transactions,
        EntityKind::Operations,
        EntityKind::Messages,
        EntityKind::Data,
        EntityKind::BlockchainEvents,
        EntityKind::TokenPools,
        EntityKind::TokenTransfers,
        EntityKind::TokenBalances,
    ];

    /// Path below `/namespaces/{ns}/`
    pub const fn path(self) -> &'static str {
        match self {
            EntityKind::Events => "events",
            EntityKind::Transactions => "transactions",
            EntityKind::Operations => "operations",
            EntityKind::Messages => "messages",
            EntityKind::Data => "data",
            EntityKind::BlockchainEvents => "blockchainevents",
            EntityKind::TokenPools => "tokens/pools",
            EntityKind::TokenTransfers => "tokens/transfers",
            EntityKind::TokenBalances => "tokens/balances",
        }
    }

    /// Look up a collection by its API path
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_matches('/');
        Self::ALL.into_iter().find(|k| k.path() == path)
    }

    /// Fields the filter dialog offers, in display order
    pub const fn filter_fields(self) -> &'static [&'static str] {
        match self {
            EntityKind::Events => &[
                "correlator", "created", "id", "reference", "sequence", "topic", "tx", "type",
            ],
            EntityKind::Transactions => &["blockchainIds", "created", "id", "idempotencyKey", "type"],
            EntityKind::Operations => &[
                "created", "error", "id", "plugin", "status", "tx", "type", "updated",
            ],
            EntityKind::Messages => &[
                "author", "batch", "cid", "confirmed", "created", "datahash", "group", "hash",
                "id", "key", "pins", "sequence", "state", "tag", "topics", "txtype", "type",
            ],
            EntityKind::Data => &[
                "blob.hash", "blob.name", "blob.public", "blob.size", "created", "datatype.name",
                "datatype.version", "hash", "id", "validator", "value",
            ],
            EntityKind::BlockchainEvents => &[
                "created", "id", "listener", "name", "protocolId", "source", "timestamp",
                "tx.blockchainId", "tx.id", "tx.type",
            ],
            EntityKind::TokenPools => &[
                "connector", "created", "decimals", "id", "locator", "message", "name",
                "standard", "symbol", "tx.id", "tx.type", "type",
            ],
            EntityKind::TokenTransfers => &[
                "amount", "blockchainEvent", "connector", "created", "from", "key", "localId",
                "message", "messageHash", "pool", "protocolId", "to", "tokenIndex", "tx.id",
                "tx.type", "type", "uri",
            ],
            EntityKind::TokenBalances => &[
                "balance", "connector", "key", "pool", "tokenIndex", "updated", "uri",
            ],
        }
    }

    /// Collection name on the charts endpoint, if the collection is charted
    pub const fn histogram_collection(self) -> Option<&'static str> {
        match self {
            EntityKind::Events => Some("events"),
            EntityKind::Transactions => Some("transactions"),
            EntityKind::Operations => Some("operations"),
            EntityKind::Messages => Some("messages"),
            EntityKind::BlockchainEvents => Some("blockchainevents"),
            EntityKind::TokenTransfers => Some("tokentransfers"),
            EntityKind::Data | EntityKind::TokenPools | EntityKind::TokenBalances => None,
        }
    }

    /// Whether `field` is on this collection's allow-list
    pub fn allows_field(self, field: &str) -> bool {
        self.filter_fields().contains(&field)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Named look-back window applied to the `created` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateRange {
    /// Last hour
    #[serde(rename = "1hour")]
    LastHour,
    /// Last 24 hours
    #[serde(rename = "24hours")]
    Last24Hours,
    /// Last 7 days
    #[serde(rename = "7days")]
    Last7Days,
    /// Last 30 days
    #[serde(rename = "30days")]
    Last30Days,
}

impl DateRange {
    /// Every named range, shortest first
    pub const ALL: [DateRange; 4] = [
        DateRange::LastHour,
        DateRange::Last24Hours,
        DateRange::Last7Days,
        DateRange::Last30Days,
    ];

    /// Name used in URLs and configs
    pub const fn name(self) -> &'static str {
        match self {
            DateRange::LastHour => "1hour",
            DateRange::Last24Hours => "24hours",
            DateRange::Last7Days => "7days",
            DateRange::Last30Days => "30days",
        }
    }

    /// Look up a range by name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    /// Length of the window
    pub fn duration(self) -> Duration {
        match self {
            DateRange::LastHour => Duration::hours(1),
            DateRange::Last24Hours => Duration::hours(24),
            DateRange::Last7Days => Duration::days(7),
            DateRange::Last30Days => Duration::days(30),
        }
    }

    /// Window start as Unix seconds, relative to `now`
    pub fn start_epoch(self, now: DateTime<Utc>) -> i64 {
        (now - self.duration()).timestamp()
    }

    /// `created>=start` filter token relative to `now`
    pub fn token(self, now: DateTime<Utc>) -> FilterToken {
        compile(&FilterDraft::new(
            CREATED_FIELD,
            Operator::Gte,
            self.start_epoch(now).to_string(),
        ))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
