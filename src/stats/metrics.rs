//! Projection of a [`StatsRecord`] into a flat, serialization-ready shape.
//!
//! [`normalize`] is a pure function: deterministic, side-effect free, and
//! total over every [`RawStatsSample`] shape. Counters that the runtime did
//! not populate simply project to zero; an absent network map projects to an
//! empty map. Every populated counter is carried over unchanged.

use std::collections::HashMap;

use serde::Serialize;

use super::{NetworkStats, RawStatsSample, StatsRecord};

/// CPU usage breakdown of a normalized metrics record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CpuMetrics {
    pub usage_in_usermode: u64,
    pub usage_in_kernelmode: u64,
    pub total_usage: u64,
}

/// Memory breakdown of a normalized metrics record.
///
/// The cgroup sub-counters are flattened next to the top-level usage fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryMetrics {
    pub limit: u64,
    pub max_usage: u64,
    pub usage: u64,
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

/// Flat metrics record ready for serialization by a downstream sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedMetrics {
    pub cpu: CpuMetrics,
    pub mem: MemoryMetrics,
    /// Per-interface network counters, keyed by interface name.
    pub net: HashMap<String, NetworkStats>,
    pub app: String,
    pub task: String,
    pub id: String,
    pub ip: String,
}

/// Projects one [`StatsRecord`] into a [`NormalizedMetrics`].
pub fn normalize(record: &StatsRecord) -> NormalizedMetrics {
    let raw: &RawStatsSample = record.raw();
    let identity = record.identity();

    NormalizedMetrics {
        cpu: CpuMetrics {
            usage_in_usermode: raw.cpu.usage_in_usermode,
            usage_in_kernelmode: raw.cpu.usage_in_kernelmode,
            total_usage: raw.cpu.total_usage,
        },
        mem: MemoryMetrics {
            limit: raw.memory.limit,
            max_usage: raw.memory.max_usage,
            usage: raw.memory.usage,
            total_active_anon: raw.memory.counters.total_active_anon,
            total_active_file: raw.memory.counters.total_active_file,
            total_cache: raw.memory.counters.total_cache,
            total_inactive_anon: raw.memory.counters.total_inactive_anon,
            total_inactive_file: raw.memory.counters.total_inactive_file,
            total_mapped_file: raw.memory.counters.total_mapped_file,
            total_pgfault: raw.memory.counters.total_pgfault,
            total_pgpgin: raw.memory.counters.total_pgpgin,
            total_pgpgout: raw.memory.counters.total_pgpgout,
            total_rss: raw.memory.counters.total_rss,
            total_rss_huge: raw.memory.counters.total_rss_huge,
            total_unevictable: raw.memory.counters.total_unevictable,
            total_writeback: raw.memory.counters.total_writeback,
        },
        net: raw.networks.clone(),
        app: identity.app().to_owned(),
        task: identity.task().to_owned(),
        id: identity.id().to_string(),
        ip: identity.ip().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ContainerID, ContainerIdentity};
    use crate::stats::{CpuStats, MemoryCounters, MemoryStats};

    fn identity() -> ContainerIdentity {
        ContainerIdentity::new(
            ContainerID::new("c0ffee").unwrap(),
            "billing".to_owned(),
            "billing.instance-1".to_owned(),
            "172.17.0.3".to_owned(),
        )
    }

    fn populated_sample() -> RawStatsSample {
        let mut networks = HashMap::new();
        networks.insert(
            "eth0".to_owned(),
            NetworkStats {
                rx_bytes: 10_240,
                rx_packets: 100,
                rx_errors: 1,
                rx_dropped: 2,
                tx_bytes: 20_480,
                tx_packets: 200,
                tx_errors: 3,
                tx_dropped: 4,
            },
        );

        RawStatsSample {
            cpu: CpuStats {
                total_usage: 1_000,
                usage_in_usermode: 600,
                usage_in_kernelmode: 400,
            },
            memory: MemoryStats {
                limit: 1 << 30,
                usage: 1 << 20,
                max_usage: 1 << 21,
                counters: MemoryCounters {
                    total_active_anon: 1,
                    total_active_file: 2,
                    total_cache: 3,
                    total_inactive_anon: 4,
                    total_inactive_file: 5,
                    total_mapped_file: 6,
                    total_pgfault: 7,
                    total_pgpgin: 8,
                    total_pgpgout: 9,
                    total_rss: 10,
                    total_rss_huge: 11,
                    total_unevictable: 12,
                    total_writeback: 13,
                },
            },
            networks,
        }
    }

    #[test]
    fn test_normalize_preserves_every_counter() {
        let record = StatsRecord::new(identity(), populated_sample());
        let metrics = normalize(&record);

        assert_eq!(metrics.cpu.total_usage, 1_000);
        assert_eq!(metrics.cpu.usage_in_usermode, 600);
        assert_eq!(metrics.cpu.usage_in_kernelmode, 400);

        assert_eq!(metrics.mem.limit, 1 << 30);
        assert_eq!(metrics.mem.usage, 1 << 20);
        assert_eq!(metrics.mem.max_usage, 1 << 21);
        assert_eq!(metrics.mem.total_active_anon, 1);
        assert_eq!(metrics.mem.total_active_file, 2);
        assert_eq!(metrics.mem.total_cache, 3);
        assert_eq!(metrics.mem.total_inactive_anon, 4);
        assert_eq!(metrics.mem.total_inactive_file, 5);
        assert_eq!(metrics.mem.total_mapped_file, 6);
        assert_eq!(metrics.mem.total_pgfault, 7);
        assert_eq!(metrics.mem.total_pgpgin, 8);
        assert_eq!(metrics.mem.total_pgpgout, 9);
        assert_eq!(metrics.mem.total_rss, 10);
        assert_eq!(metrics.mem.total_rss_huge, 11);
        assert_eq!(metrics.mem.total_unevictable, 12);
        assert_eq!(metrics.mem.total_writeback, 13);

        let eth0 = metrics.net.get("eth0").unwrap();
        assert_eq!(eth0.rx_bytes, 10_240);
        assert_eq!(eth0.tx_bytes, 20_480);

        assert_eq!(metrics.app, "billing");
        assert_eq!(metrics.task, "billing.instance-1");
        assert_eq!(metrics.id, "c0ffee");
        assert_eq!(metrics.ip, "172.17.0.3");
    }

    #[test]
    fn test_normalize_empty_network_map() {
        let mut sample = populated_sample();
        sample.networks.clear();
        let record = StatsRecord::new(identity(), sample);

        let metrics = normalize(&record);
        assert!(metrics.net.is_empty());
    }

    #[test]
    fn test_normalize_default_sample_is_total() {
        let record = StatsRecord::new(identity(), RawStatsSample::default());
        let metrics = normalize(&record);

        assert_eq!(metrics.cpu, CpuMetrics::default());
        assert_eq!(metrics.mem, MemoryMetrics::default());
        assert!(metrics.net.is_empty());
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let record = StatsRecord::new(identity(), populated_sample());
        assert_eq!(normalize(&record), normalize(&record));
    }
}
