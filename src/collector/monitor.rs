use std::sync::Arc;

use tokio::sync::mpsc;

use crate::container::{ContainerID, ContainerIdentity};
use crate::runtime::address::{AddressResolver, FALLBACK_ADDRESS};
use crate::runtime::{ContainerDetails, RuntimeClient};
use crate::stats::StatsRecord;

use super::pool::JobSlot;

/// Container label carrying the application name.
const APP_LABEL: &str = "SRV_NAME";
/// Container label carrying the scheduler task id.
const TASK_LABEL: &str = "MESOS_TASK_ID";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to inspect container: {0}")]
    Inspect(#[source] crate::runtime::Error),
    #[error("failed to open stats subscription: {0}")]
    StatsSubscription(#[source] crate::runtime::Error),
    #[error("stats subscription closed before delivering a sample")]
    SampleDropped,
    #[error("stats output channel closed")]
    ChannelClosed,
}

/// Owns one container's stats subscription for a single monitor cycle.
///
/// A monitor is constructed via [`resolve`], runs at most one cycle via
/// [`run`], and is discarded afterwards.
///
/// [`resolve`]: Monitor::resolve
/// [`run`]: Monitor::run
pub struct Monitor {
    client: Arc<dyn RuntimeClient>,
    identity: ContainerIdentity,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Inspects the container and resolves its identity.
    ///
    /// The IP address is taken from the first attached network reporting a
    /// non-empty address. When no network does, the injected resolver is
    /// consulted; if that fails too, the identity carries
    /// [`FALLBACK_ADDRESS`]. Address discovery never fails the resolution.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Inspect`] if the container is unknown to the runtime
    /// or the inspection call fails.
    pub async fn resolve(
        client: Arc<dyn RuntimeClient>,
        resolver: &dyn AddressResolver,
        id: &ContainerID,
    ) -> Result<Self, Error> {
        let details = client
            .inspect_container(id)
            .await
            .map_err(Error::Inspect)?;

        let ip = container_ip(&details, resolver).await;
        let app = details.labels.get(APP_LABEL).cloned().unwrap_or_default();
        let task = details.labels.get(TASK_LABEL).cloned().unwrap_or_default();
        let identity = ContainerIdentity::new(details.id, app, task, ip);

        Ok(Self { client, identity })
    }

    pub fn id(&self) -> &ContainerID {
        self.identity.id()
    }

    pub fn app(&self) -> &str {
        self.identity.app()
    }

    /// Runs one stats cycle.
    ///
    /// Opens a one-shot stats subscription, releases the pool slot as soon as
    /// the subscription is open, then waits for the single sample and
    /// publishes it with the resolved identity on `records`. The publish
    /// blocks until a receiver accepts the record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StatsSubscription`] if the subscription cannot be
    /// opened, [`Error::SampleDropped`] if the runtime abandons delivery, or
    /// [`Error::ChannelClosed`] if no receiver is left for the record.
    pub async fn run(
        self,
        slot: JobSlot,
        records: mpsc::Sender<StatsRecord>,
    ) -> Result<(), Error> {
        let sample_rx = self
            .client
            .stats_once(self.identity.id())
            .await
            .map_err(Error::StatsSubscription)?;

        // The subscription is open; admission control stops covering this
        // cycle while it waits for delivery.
        slot.release();

        let raw = sample_rx.await.map_err(|_| Error::SampleDropped)?;
        records
            .send(StatsRecord::new(self.identity, raw))
            .await
            .map_err(|_| Error::ChannelClosed)
    }
}

/// Scans attached networks for a usable address, falling back to out-of-band
/// discovery and finally the sentinel.
async fn container_ip(details: &ContainerDetails, resolver: &dyn AddressResolver) -> String {
    for attachment in details.networks.values() {
        if !attachment.ip_address.is_empty() {
            return attachment.ip_address.clone();
        }
    }

    match resolver.resolve(&details.id).await {
        Some(address) => address,
        None => FALLBACK_ADDRESS.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::runtime::{
        ContainerSummary, Error as RuntimeError, EventStream, NetworkAttachment, StatsReceiver,
    };

    struct FakeInspect {
        details: Option<ContainerDetails>,
    }

    #[async_trait::async_trait]
    impl RuntimeClient for FakeInspect {
        async fn inspect_container(
            &self,
            id: &ContainerID,
        ) -> Result<ContainerDetails, RuntimeError> {
            self.details
                .clone()
                .ok_or_else(|| RuntimeError::UnknownContainer { id: id.to_string() })
        }

        async fn stats_once(&self, _id: &ContainerID) -> Result<StatsReceiver, RuntimeError> {
            unimplemented!("not exercised by identity resolution tests")
        }

        async fn subscribe_events(&self) -> Result<EventStream, RuntimeError> {
            unimplemented!("not exercised by identity resolution tests")
        }

        async fn list_containers(&self) -> Result<Vec<ContainerSummary>, RuntimeError> {
            unimplemented!("not exercised by identity resolution tests")
        }
    }

    struct StubResolver {
        address: Option<&'static str>,
    }

    #[async_trait::async_trait]
    impl AddressResolver for StubResolver {
        async fn resolve(&self, _id: &ContainerID) -> Option<String> {
            self.address.map(str::to_owned)
        }
    }

    fn details(networks: HashMap<String, NetworkAttachment>) -> ContainerDetails {
        let mut labels = HashMap::new();
        labels.insert("SRV_NAME".to_owned(), "billing".to_owned());
        labels.insert("MESOS_TASK_ID".to_owned(), "billing.instance-1".to_owned());

        ContainerDetails {
            id: ContainerID::new("c0ffee").unwrap(),
            labels,
            networks,
        }
    }

    #[tokio::test]
    async fn test_resolve_takes_identity_from_labels() {
        let mut networks = HashMap::new();
        networks.insert(
            "bridge".to_owned(),
            NetworkAttachment {
                ip_address: "172.17.0.3".to_owned(),
            },
        );
        let client = Arc::new(FakeInspect {
            details: Some(details(networks)),
        });
        let resolver = StubResolver { address: None };

        let monitor = Monitor::resolve(client, &resolver, &ContainerID::new("c0ffee").unwrap())
            .await
            .unwrap();

        assert_eq!(monitor.id().as_str(), "c0ffee");
        assert_eq!(monitor.app(), "billing");
        assert_eq!(monitor.identity.task(), "billing.instance-1");
        assert_eq!(monitor.identity.ip(), "172.17.0.3");
    }

    #[tokio::test]
    async fn test_resolve_skips_empty_network_addresses() {
        let mut networks = HashMap::new();
        networks.insert("ingress".to_owned(), NetworkAttachment::default());
        networks.insert(
            "overlay".to_owned(),
            NetworkAttachment {
                ip_address: "10.0.0.7".to_owned(),
            },
        );
        let client = Arc::new(FakeInspect {
            details: Some(details(networks)),
        });
        let resolver = StubResolver { address: None };

        let monitor = Monitor::resolve(client, &resolver, &ContainerID::new("c0ffee").unwrap())
            .await
            .unwrap();

        assert_eq!(monitor.identity.ip(), "10.0.0.7");
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_resolver() {
        let mut networks = HashMap::new();
        networks.insert("bridge".to_owned(), NetworkAttachment::default());
        let client = Arc::new(FakeInspect {
            details: Some(details(networks)),
        });
        let resolver = StubResolver {
            address: Some("192.168.7.9"),
        };

        let monitor = Monitor::resolve(client, &resolver, &ContainerID::new("c0ffee").unwrap())
            .await
            .unwrap();

        assert_eq!(monitor.identity.ip(), "192.168.7.9");
    }

    #[tokio::test]
    async fn test_resolve_uses_sentinel_when_discovery_fails() {
        let client = Arc::new(FakeInspect {
            details: Some(details(HashMap::new())),
        });
        let resolver = StubResolver { address: None };

        let monitor = Monitor::resolve(client, &resolver, &ContainerID::new("c0ffee").unwrap())
            .await
            .unwrap();

        assert_eq!(monitor.identity.ip(), FALLBACK_ADDRESS);
    }

    #[tokio::test]
    async fn test_resolve_fails_for_unknown_container() {
        let client = Arc::new(FakeInspect { details: None });
        let resolver = StubResolver { address: None };

        let err = Monitor::resolve(client, &resolver, &ContainerID::new("gone").unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Inspect(_)));
    }

    #[tokio::test]
    async fn test_resolve_defaults_missing_labels_to_empty() {
        let mut details = details(HashMap::new());
        details.labels.clear();
        let client = Arc::new(FakeInspect {
            details: Some(details),
        });
        let resolver = StubResolver { address: None };

        let monitor = Monitor::resolve(client, &resolver, &ContainerID::new("c0ffee").unwrap())
            .await
            .unwrap();

        assert_eq!(monitor.app(), "");
        assert_eq!(monitor.identity.task(), "");
    }
}
