//! Resource counters to [`Metrics`].
//!
//! A stats sample carries the current cumulative counters and the previous
//! read (`precpu_stats`). CPU is a rate over that window; memory is a ratio of
//! the current sample; network and disk are cumulative counts.

use autobox_common::chrono::{DateTime, Utc};
use autobox_common::{DiskStats, Metrics, NetworkStats};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::gateway::{decode_value, GatewayResult};

/// One raw stats document from the runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSample {
    pub cpu_stats: CpuStats,
    pub precpu_stats: CpuStats,
    pub memory_stats: MemoryStats,
    pub networks: HashMap<String, InterfaceStats>,
    pub blkio_stats: BlkioStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuStats {
    pub cpu_usage: CpuUsage,
    pub system_cpu_usage: u64,
    pub online_cpus: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuUsage {
    pub total_usage: u64,
    /// Empty on cgroup v2 hosts.
    pub percpu_usage: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStats {
    pub usage: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceStats {
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlkioStats {
    pub io_service_bytes_recursive: Vec<BlkioEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlkioEntry {
    pub major: u64,
    pub minor: u64,
    pub op: String,
    pub value: u64,
}

impl StatsSample {
    /// Decode a stats document as the runtime sends it.
    pub fn from_json(value: Value) -> GatewayResult<Self> {
        decode_value(value)
    }
}

/// CPU percent over the sample window; zero without a usable baseline.
pub fn cpu_percent(sample: &StatsSample) -> f64 {
    let current = &sample.cpu_stats;
    let previous = &sample.precpu_stats;
    if previous.cpu_usage.total_usage == 0 {
        return 0.0;
    }

    let cpu_delta = current
        .cpu_usage
        .total_usage
        .checked_sub(previous.cpu_usage.total_usage)
        .filter(|delta| *delta > 0);
    let system_delta = current
        .system_cpu_usage
        .checked_sub(previous.system_cpu_usage)
        .filter(|delta| *delta > 0);

    let cores = match current.cpu_usage.percpu_usage.len() {
        0 => current.online_cpus,
        n => n as u64,
    };

    match (cpu_delta, system_delta) {
        (Some(cpu), Some(system)) => cpu as f64 / system as f64 * cores as f64 * 100.0,
        _ => 0.0,
    }
}

/// Memory percent of the limit; zero when no limit is reported.
pub fn memory_percent(sample: &StatsSample) -> f64 {
    let memory = &sample.memory_stats;
    if memory.limit == 0 {
        return 0.0;
    }
    memory.usage as f64 / memory.limit as f64 * 100.0
}

/// Counters of one interface; zeros when the interface is absent.
pub fn network_io(sample: &StatsSample, interface: &str) -> NetworkStats {
    sample
        .networks
        .get(interface)
        .map(|stats| NetworkStats {
            bytes_received: stats.rx_bytes,
            bytes_transmitted: stats.tx_bytes,
            packets_received: stats.rx_packets,
            packets_transmitted: stats.tx_packets,
        })
        .unwrap_or_default()
}

/// Read and write bytes summed over every device, matched by operation name.
pub fn disk_io(sample: &StatsSample) -> DiskStats {
    sample
        .blkio_stats
        .io_service_bytes_recursive
        .iter()
        .fold(DiskStats::default(), |mut totals, entry| {
            if entry.op.eq_ignore_ascii_case("read") {
                totals.bytes_read = totals.bytes_read.saturating_add(entry.value);
            } else if entry.op.eq_ignore_ascii_case("write") {
                totals.bytes_written = totals.bytes_written.saturating_add(entry.value);
            }
            totals
        })
}

pub fn derive_metrics(sample: &StatsSample, interface: &str, timestamp: DateTime<Utc>) -> Metrics {
    Metrics {
        cpu_usage: cpu_percent(sample),
        memory_usage: memory_percent(sample),
        network_io: network_io(sample, interface),
        disk_io: disk_io(sample),
        custom: BTreeMap::new(),
        timestamp,
    }
}
