//! Traffic statistics records

use serde::{Deserialize, Serialize};

/// Traffic counter sample
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsRecord {
    /// Unix seconds
    pub date_time: i64,
    /// inbound / outbound / user
    pub resource: String,
    pub tag: String,
    /// true = uplink
    pub direction: bool,
    pub traffic: i64,
}

/// Filter for listing stats
#[derive(Debug, Clone, Default)]
pub struct StatsQuery {
    pub resource: String,
    pub tag: String,
    /// Only samples newer than this many hours
    pub hours: i64,
}
