use std::collections::HashMap;
use std::path::Path;

use bollard::container::{
    InspectContainerOptions, ListContainersOptions, MemoryStatsStats, Stats, StatsOptions,
};
use bollard::models::{EventMessage, EventMessageTypeEnum};
use bollard::system::EventsOptions;
use bollard::{API_DEFAULT_VERSION, Docker};
use futures::StreamExt;
use tokio::sync::oneshot;

use crate::container::ContainerID;
use crate::stats::{CpuStats, MemoryCounters, MemoryStats, NetworkStats, RawStatsSample};

use super::{
    ContainerDetails, ContainerSummary, Error, EventAction, EventStream, LifecycleEvent,
    NetworkAttachment, RuntimeClient, StatsReceiver,
};

/// Client timeout for Docker Engine API requests, in seconds.
const API_TIMEOUT_SECS: u64 = 120;

/// [`RuntimeClient`] implementation over the Docker Engine API.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects to the Docker daemon on the given unix socket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] if the client cannot be constructed for the
    /// socket path.
    pub fn connect(socket_path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = socket_path.as_ref();
        log::debug!("Connecting to container runtime at `{}`...", path.display());
        let docker = Docker::connect_with_unix(
            &path.to_string_lossy(),
            API_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
        )
        .map_err(|source| Error::Connect {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

        Ok(Self { docker })
    }
}

#[async_trait::async_trait]
impl RuntimeClient for DockerRuntime {
    async fn inspect_container(&self, id: &ContainerID) -> Result<ContainerDetails, Error> {
        let response = self
            .docker
            .inspect_container(id.as_str(), None::<InspectContainerOptions>)
            .await
            .map_err(|err| match err {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => Error::UnknownContainer { id: id.to_string() },
                err => Error::Api(Box::new(err)),
            })?;

        let id = response
            .id
            .as_deref()
            .and_then(|raw| ContainerID::new(raw).ok())
            .unwrap_or_else(|| id.clone());
        let labels = response.config.and_then(|c| c.labels).unwrap_or_default();
        let networks = response
            .network_settings
            .and_then(|s| s.networks)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, endpoint)| {
                (
                    name,
                    NetworkAttachment {
                        ip_address: endpoint.ip_address.unwrap_or_default(),
                    },
                )
            })
            .collect();

        Ok(ContainerDetails {
            id,
            labels,
            networks,
        })
    }

    async fn stats_once(&self, id: &ContainerID) -> Result<StatsReceiver, Error> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
        };
        let mut stream = Box::pin(self.docker.stats(id.as_str(), Some(options)));
        let (tx, rx) = oneshot::channel();
        let id = id.clone();
        // The engine issues the HTTP request on first poll, so transport
        // errors surface on the delivery path (dropped sender), not here.
        tokio::spawn(async move {
            match stream.next().await {
                Some(Ok(stats)) => {
                    let _ = tx.send(sample_from_stats(&stats));
                }
                Some(Err(err)) => {
                    log::error!("stats request for container `{}` failed: {}", id, err);
                }
                None => {
                    log::warn!("stats stream for container `{}` ended without a sample", id);
                }
            }
        });

        Ok(rx)
    }

    async fn subscribe_events(&self) -> Result<EventStream, Error> {
        self.docker
            .ping()
            .await
            .map_err(|err| Error::EventFeed(Box::new(err)))?;

        let mut filters = HashMap::new();
        filters.insert("type".to_owned(), vec!["container".to_owned()]);
        let stream = self.docker.events(Some(EventsOptions::<String> {
            filters,
            ..Default::default()
        }));

        Ok(Box::pin(stream.filter_map(|msg| async move {
            match msg {
                Ok(message) => lifecycle_event(message).map(Ok),
                Err(err) => Some(Err(Error::EventFeed(Box::new(err)))),
            }
        })))
    }

    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, Error> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String>::default()))
            .await
            .map_err(|err| Error::Api(Box::new(err)))?;

        Ok(containers
            .into_iter()
            .filter_map(|container| {
                let raw = container.id?;
                match ContainerID::new(&raw) {
                    Ok(id) => Some(ContainerSummary { id }),
                    Err(err) => {
                        log::warn!("skipping container with unusable id: {}", err);
                        None
                    }
                }
            })
            .collect())
    }
}

/// Maps a lifecycle event message to the engine's event type.
///
/// Non-container messages and messages without a usable container id are
/// dropped.
fn lifecycle_event(message: EventMessage) -> Option<LifecycleEvent> {
    if message.typ != Some(EventMessageTypeEnum::CONTAINER) {
        return None;
    }

    let raw_id = message.actor.and_then(|actor| actor.id)?;
    let id = match ContainerID::new(&raw_id) {
        Ok(id) => id,
        Err(err) => {
            log::warn!("skipping event with unusable container id: {}", err);
            return None;
        }
    };

    let action = match message.action.as_deref() {
        Some("start") => EventAction::Start,
        Some("die") | Some("stop") | Some("kill") => EventAction::Stop,
        _ => EventAction::Other,
    };

    Some(LifecycleEvent { action, id })
}

/// Copies the runtime's wire-level stats into the crate's owned sample type.
fn sample_from_stats(stats: &Stats) -> RawStatsSample {
    let cpu = CpuStats {
        total_usage: stats.cpu_stats.cpu_usage.total_usage,
        usage_in_usermode: stats.cpu_stats.cpu_usage.usage_in_usermode,
        usage_in_kernelmode: stats.cpu_stats.cpu_usage.usage_in_kernelmode,
    };

    let memory = MemoryStats {
        limit: stats.memory_stats.limit.unwrap_or(0),
        usage: stats.memory_stats.usage.unwrap_or(0),
        max_usage: stats.memory_stats.max_usage.unwrap_or(0),
        counters: memory_counters(stats.memory_stats.stats.as_ref()),
    };

    let networks = stats
        .networks
        .as_ref()
        .map(|networks| {
            networks
                .iter()
                .map(|(iface, net)| {
                    (
                        iface.clone(),
                        NetworkStats {
                            rx_bytes: net.rx_bytes,
                            rx_packets: net.rx_packets,
                            rx_errors: net.rx_errors,
                            rx_dropped: net.rx_dropped,
                            tx_bytes: net.tx_bytes,
                            tx_packets: net.tx_packets,
                            tx_errors: net.tx_errors,
                            tx_dropped: net.tx_dropped,
                        },
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    RawStatsSample {
        cpu,
        memory,
        networks,
    }
}

/// Extracts the cgroup memory sub-counters from either cgroup layout.
///
/// The v2 layout has no equivalent for the paging and huge-page counters;
/// those stay zero.
fn memory_counters(stats: Option<&MemoryStatsStats>) -> MemoryCounters {
    match stats {
        Some(MemoryStatsStats::V1(v1)) => MemoryCounters {
            total_active_anon: v1.total_active_anon,
            total_active_file: v1.total_active_file,
            total_cache: v1.total_cache,
            total_inactive_anon: v1.total_inactive_anon,
            total_inactive_file: v1.total_inactive_file,
            total_mapped_file: v1.total_mapped_file,
            total_pgfault: v1.total_pgfault,
            total_pgpgin: v1.total_pgpgin,
            total_pgpgout: v1.total_pgpgout,
            total_rss: v1.total_rss,
            total_rss_huge: v1.total_rss_huge,
            total_unevictable: v1.total_unevictable,
            total_writeback: v1.total_writeback,
        },
        Some(MemoryStatsStats::V2(v2)) => MemoryCounters {
            total_active_anon: v2.active_anon,
            total_active_file: v2.active_file,
            total_cache: v2.file,
            total_inactive_anon: v2.inactive_anon,
            total_inactive_file: v2.inactive_file,
            total_mapped_file: v2.file_mapped,
            total_pgfault: v2.pgfault,
            total_rss: v2.anon,
            total_unevictable: v2.unevictable,
            total_writeback: v2.file_writeback,
            ..MemoryCounters::default()
        },
        None => MemoryCounters::default(),
    }
}
