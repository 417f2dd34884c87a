//! Container discovery and per-container stats monitoring.
//!
//! The [`Collector`] is the collection/registration engine: one [`run`] pass
//! subscribes to the runtime's lifecycle event feed, enumerates the running
//! containers, and drives one monitor cycle per discovered container through
//! a bounded [`WorkerPool`]. The [`Registry`] deduplicates concurrent
//! monitoring attempts so that a container observed by both the enumeration
//! and a lifecycle event gets exactly one monitor. Completed cycles publish
//! [`StatsRecord`]s on the collector's output channel; the sink on the other
//! end is not this module's concern.
//!
//! Failure scoping: a broken event feed or container listing aborts the run,
//! while per-container inspect and stats failures are logged and skipped.
//!
//! [`run`]: Collector::run
mod monitor;
mod pool;
mod registry;

pub use monitor::{Error as MonitorError, Monitor};
pub use pool::{JobSlot, WorkerPool};
pub use registry::Registry;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::container::ContainerID;
use crate::runtime::address::AddressResolver;
use crate::runtime::{EventAction, EventStream, RuntimeClient};
use crate::stats::StatsRecord;

/// Deadline for the startup container enumeration.
const LIST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to subscribe to lifecycle events: {0}")]
    Subscribe(#[source] crate::runtime::Error),
    #[error("failed to enumerate running containers: {0}")]
    Enumerate(#[source] crate::runtime::Error),
    #[error("container enumeration timed out")]
    EnumerateTimeout,
}

/// Discovers containers and drives their monitor cycles.
pub struct Collector {
    client: Arc<dyn RuntimeClient>,
    resolver: Arc<dyn AddressResolver>,
    registry: Arc<Registry>,
    records: mpsc::Sender<StatsRecord>,
}

impl Collector {
    /// Creates a collector publishing its records on the given channel.
    pub fn new(
        client: Arc<dyn RuntimeClient>,
        resolver: Arc<dyn AddressResolver>,
        records: mpsc::Sender<StatsRecord>,
    ) -> Self {
        Self {
            client,
            resolver,
            registry: Arc::new(Registry::default()),
            records,
        }
    }

    /// Runs one collection pass.
    ///
    /// Subscribes to lifecycle events first so no container started during
    /// enumeration is missed, then dispatches one monitor cycle per
    /// enumerated container through a worker pool sized to the enumerated
    /// count. Containers reported by the event feed are dispatched through
    /// the same registry and pool while the pass is in flight. Returns once
    /// every enumerated cycle has reached its subscription-open point and
    /// the event listener has been torn down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Subscribe`] or [`Error::Enumerate`] when the event
    /// feed or the container listing is unavailable; these are prerequisites
    /// for the whole pass. Per-container failures never surface here.
    pub async fn run(&self) -> Result<(), Error> {
        let events = self
            .client
            .subscribe_events()
            .await
            .map_err(Error::Subscribe)?;

        let containers = tokio::time::timeout(LIST_TIMEOUT, self.client.list_containers())
            .await
            .map_err(|_| Error::EnumerateTimeout)?
            .map_err(Error::Enumerate)?;
        let count = containers.len();
        log::debug!("Found {} running containers", count);

        let pool = Arc::new(WorkerPool::new(count, count));
        let event_loop = tokio::spawn(event_loop(
            events,
            Arc::clone(&self.client),
            Arc::clone(&self.resolver),
            Arc::clone(&self.registry),
            Arc::clone(&pool),
            self.records.clone(),
        ));

        for container in containers {
            let slot = pool.acquire().await;
            tokio::spawn(handle(
                Arc::clone(&self.client),
                Arc::clone(&self.resolver),
                Arc::clone(&self.registry),
                self.records.clone(),
                slot,
                container.id,
            ));
        }

        pool.wait_all().await;

        // Tearing the listener down drops the stream, which unsubscribes.
        event_loop.abort();
        let _ = event_loop.await;

        Ok(())
    }
}

/// Dispatches container-start events through the shared registry and pool.
async fn event_loop(
    mut events: EventStream,
    client: Arc<dyn RuntimeClient>,
    resolver: Arc<dyn AddressResolver>,
    registry: Arc<Registry>,
    pool: Arc<WorkerPool>,
    records: mpsc::Sender<StatsRecord>,
) {
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                if event.action != EventAction::Start {
                    continue;
                }
                log::debug!("Container `{}` started", event.id);
                let slot = pool.acquire_untracked().await;
                tokio::spawn(handle(
                    Arc::clone(&client),
                    Arc::clone(&resolver),
                    Arc::clone(&registry),
                    records.clone(),
                    slot,
                    event.id,
                ));
            }
            Err(err) => log::error!("lifecycle event feed error: {}", err),
        }
    }
}

/// Runs the monitor cycle for one container.
///
/// Inspect failures abandon the container for this pass. The registration
/// collision path is silent: losing the race to the other trigger is a
/// normal outcome, not a fault.
async fn handle(
    client: Arc<dyn RuntimeClient>,
    resolver: Arc<dyn AddressResolver>,
    registry: Arc<Registry>,
    records: mpsc::Sender<StatsRecord>,
    slot: JobSlot,
    id: ContainerID,
) {
    let monitor = match Monitor::resolve(Arc::clone(&client), resolver.as_ref(), &id).await {
        Ok(monitor) => monitor,
        Err(err) => {
            log::error!("error handling container `{}`: {}", id, err);
            return;
        }
    };

    tokio::spawn(async move {
        if !registry.register(monitor.id()) {
            return;
        }

        let id = monitor.id().clone();
        let app = monitor.app().to_owned();
        if let Err(err) = monitor.run(slot, records).await {
            log::error!("error handling container for app `{}`: {}", app, err);
        }

        registry.unregister(&id);
    });
}
