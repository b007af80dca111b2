use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Document;

/// Point-in-time resource telemetry for one simulation container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Percent of one host; multi-core bursts may exceed 100.
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub network_io: NetworkStats,
    pub disk_io: DiskStats,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, Document>,
    /// Capture time on this host, not the runtime's sample time.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub bytes_received: u64,
    pub bytes_transmitted: u64,
    pub packets_received: u64,
    pub packets_transmitted: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
}
