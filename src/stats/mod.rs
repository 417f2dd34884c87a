//! Core types for representing container resource usage samples.
//!
//! A [`RawStatsSample`] is the owned mirror of one stats sample as delivered
//! by the container runtime: CPU tick counters, memory usage with its cgroup
//! sub-counters, and per-interface network I/O. The sample is treated as
//! opaque input downstream; nothing in this crate mutates it after receipt.
//!
//! A [`StatsRecord`] pairs a sample with the [`ContainerIdentity`] resolved
//! for the monitored container and is the unit placed on the collector's
//! output channel. [`normalize`] projects a record into the flat,
//! serialization-ready [`NormalizedMetrics`] shape.

mod metrics;

pub use metrics::{CpuMetrics, MemoryMetrics, NormalizedMetrics, normalize};

use std::collections::HashMap;

use serde::Serialize;

use crate::container::ContainerIdentity;

/// CPU usage counters from one runtime stats sample, in ticks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CpuStats {
    /// Total CPU time consumed (usermode + kernelmode).
    pub total_usage: u64,
    /// CPU time spent in usermode.
    pub usage_in_usermode: u64,
    /// CPU time spent in kernelmode.
    pub usage_in_kernelmode: u64,
}

/// Memory usage counters from one runtime stats sample, in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// Memory limit configured for the container.
    pub limit: u64,
    /// Current memory usage.
    pub usage: u64,
    /// High-water mark of memory usage.
    pub max_usage: u64,
    /// Detailed cgroup memory sub-counters.
    pub counters: MemoryCounters,
}

/// Cgroup memory sub-counters, in bytes (counts for the `pg*` fields).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryCounters {
    pub total_active_anon: u64,
    pub total_active_file: u64,
    pub total_cache: u64,
    pub total_inactive_anon: u64,
    pub total_inactive_file: u64,
    pub total_mapped_file: u64,
    pub total_pgfault: u64,
    pub total_pgpgin: u64,
    pub total_pgpgout: u64,
    pub total_rss: u64,
    pub total_rss_huge: u64,
    pub total_unevictable: u64,
    pub total_writeback: u64,
}

/// Network I/O counters for a single interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    /// Bytes received.
    pub rx_bytes: u64,
    /// Packets received.
    pub rx_packets: u64,
    /// Receive errors.
    pub rx_errors: u64,
    /// Dropped incoming packets.
    pub rx_dropped: u64,
    /// Bytes transmitted.
    pub tx_bytes: u64,
    /// Packets transmitted.
    pub tx_packets: u64,
    /// Transmit errors.
    pub tx_errors: u64,
    /// Dropped outgoing packets.
    pub tx_dropped: u64,
}

/// One raw stats sample as delivered by the container runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawStatsSample {
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    /// Per-interface network counters, keyed by interface name.
    pub networks: HashMap<String, NetworkStats>,
}

/// One stats sample paired with the identity it was collected for.
///
/// Exactly one record is produced per successfully completed monitor cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRecord {
    identity: ContainerIdentity,
    raw: RawStatsSample,
}

impl StatsRecord {
    pub fn new(identity: ContainerIdentity, raw: RawStatsSample) -> Self {
        Self { identity, raw }
    }

    pub fn identity(&self) -> &ContainerIdentity {
        &self.identity
    }

    pub fn raw(&self) -> &RawStatsSample {
        &self.raw
    }
}
