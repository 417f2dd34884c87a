use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// dockstat: a container monitoring daemon that discovers running containers
/// on a host, attaches a per-container stats monitor to each, and streams
/// normalized resource usage records (CPU, memory, network) to a downstream
/// consumer.
///
/// This library provides the collection/registration engine (discovery,
/// deduplication of concurrent monitoring attempts, bounded worker-pool
/// concurrency, lifecycle-event reaction), the narrow runtime client
/// boundary it depends on, and the normalization of raw runtime stats into
/// flat metrics records.
pub mod collector;
pub mod container;
pub mod error;
pub mod fallback;
pub mod runtime;
pub mod stats;
pub mod writer;

/// Default Docker control socket.
const DEFAULT_SOCKET: &str = "/var/run/docker.sock";
/// Default delay between collection passes, in seconds.
const DEFAULT_INTERVAL_SECS: u64 = 15;

/// Runs the dockstat daemon.
///
/// Connects to the container runtime, spawns the metrics drain task over the
/// collector's output channel, and then runs one collection pass per
/// interval tick until a pass fails on its prerequisites.
///
/// # Returns
///
/// Only returns on failure: a broken runtime connection, an unavailable
/// lifecycle event feed, or a failed container enumeration.
///
/// # Errors
///
/// Possible errors include:
/// - Failure to construct the runtime client for the configured socket
///   (`DOCKER_SOCKET`, default `/var/run/docker.sock`).
/// - Failure to subscribe to the lifecycle event feed.
/// - Failure (or timeout) of the container enumeration.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let socket = std::env::var_os("DOCKER_SOCKET")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET));
    let interval_secs = std::env::var("COLLECT_INTERVAL_SECS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(DEFAULT_INTERVAL_SECS);

    let client = Arc::new(runtime::DockerRuntime::connect(&socket)?);
    let resolver = Arc::new(runtime::address::ExecAddressResolver);
    log::debug!("Connected to container runtime at `{}`", socket.display());

    let (records_tx, records_rx) = tokio::sync::mpsc::channel::<stats::StatsRecord>(1);
    tokio::spawn(async move {
        let mut writer = writer::MetricsWriter::new(std::io::stdout());
        writer.drain(records_rx).await;
    });

    let collector = collector::Collector::new(client, resolver, records_tx);

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        interval.tick().await;
        log::trace!("Starting collection pass");
        collector.run().await?;
    }
}
