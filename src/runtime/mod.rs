//! Narrow boundary to the container runtime.
//!
//! The collection engine depends on four runtime capabilities only: inspect a
//! container by id, open a one-shot stats subscription for it, subscribe to
//! the container lifecycle event feed, and enumerate the currently running
//! containers. [`RuntimeClient`] captures exactly that surface; the rest of
//! the engine never sees the underlying client library, which keeps tests on
//! an in-memory fake.
//!
//! [`DockerRuntime`] is the production implementation over the Docker Engine
//! API. [`address::AddressResolver`] is the pluggable out-of-band IP
//! discovery capability used when a container's network settings report no
//! attached address.

pub mod address;
mod docker;

pub use docker::DockerRuntime;

use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;

use futures::Stream;
use tokio::sync::oneshot;

use crate::container::ContainerID;
use crate::stats::RawStatsSample;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to container runtime at `{path}`: {source}")]
    Connect {
        path: PathBuf,
        #[source]
        source: BoxedError,
    },
    #[error("container `{id}` is unknown to the runtime")]
    UnknownContainer { id: String },
    #[error("runtime api call failed: {0}")]
    Api(#[source] BoxedError),
    #[error("event feed unavailable: {0}")]
    EventFeed(#[source] BoxedError),
}

/// Summary entry from the runtime's container enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: ContainerID,
}

/// A single network a container is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkAttachment {
    /// Address assigned on this network; empty when the runtime has not
    /// assigned one (yet).
    pub ip_address: String,
}

/// Inspection metadata for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: ContainerID,
    /// Container labels as assigned at creation time.
    pub labels: HashMap<String, String>,
    /// Attached networks, keyed by network name.
    pub networks: HashMap<String, NetworkAttachment>,
}

/// Lifecycle state change reported on the runtime's event feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Start,
    Stop,
    Other,
}

/// One lifecycle event for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub action: EventAction,
    pub id: ContainerID,
}

/// Feed of lifecycle events; dropping the stream unsubscribes.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<LifecycleEvent, Error>> + Send>>;

/// Receiver for the single asynchronously delivered sample of a one-shot
/// stats subscription. A dropped sender signals delivery failure.
pub type StatsReceiver = oneshot::Receiver<RawStatsSample>;

/// Restricted runtime client surface consumed by the collection engine.
#[async_trait::async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Looks up labels and network settings for the given container.
    async fn inspect_container(&self, id: &ContainerID) -> Result<ContainerDetails, Error>;

    /// Opens a one-shot stats subscription for the given container.
    ///
    /// The runtime delivers exactly one sample asynchronously on the returned
    /// receiver. Opening the subscription can fail; delivery failure after a
    /// successful open surfaces as the sender being dropped.
    async fn stats_once(&self, id: &ContainerID) -> Result<StatsReceiver, Error>;

    /// Subscribes to the runtime's container lifecycle event feed.
    async fn subscribe_events(&self) -> Result<EventStream, Error>;

    /// Enumerates the currently running containers.
    async fn list_containers(&self) -> Result<Vec<ContainerSummary>, Error>;
}
