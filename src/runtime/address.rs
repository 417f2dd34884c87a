//! Out-of-band container IP discovery.
//!
//! When a container's inspected network settings carry no address, the
//! monitor falls back to an [`AddressResolver`]. The production resolver
//! shells out into the container's network namespace; tests substitute an
//! in-memory stub. Resolution is best-effort metadata, so the entire path is
//! infallible from the caller's perspective.

use tokio::process::Command;

use crate::container::ContainerID;

/// Address reported when no attached network has an address and out-of-band
/// discovery fails too.
pub const FALLBACK_ADDRESS: &str = "255.255.255.0";

/// Strategy for discovering a container's IP address when the runtime's
/// network settings report none.
///
/// Implementations return `None` on failure and never surface an error.
#[async_trait::async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, id: &ContainerID) -> Option<String>;
}

/// Reads the `eth0` address inside the container's network namespace through
/// `docker exec`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecAddressResolver;

#[async_trait::async_trait]
impl AddressResolver for ExecAddressResolver {
    async fn resolve(&self, id: &ContainerID) -> Option<String> {
        let script = format!(
            "docker exec {} ip addr show eth0|awk '/inet /{{print $2}}'|cut -d/ -f1",
            id
        );

        let output = match Command::new("sh").arg("-c").arg(&script).output().await {
            Ok(output) => output,
            Err(err) => {
                log::debug!(
                    "address discovery for container `{}` failed to spawn: {}",
                    id,
                    err
                );
                return None;
            }
        };

        if !output.status.success() {
            log::debug!(
                "address discovery for container `{}` exited with {}",
                id,
                output.status
            );
            return None;
        }

        let address = String::from_utf8(output.stdout).ok()?;
        let address = address.trim_end_matches('\n');
        if address.is_empty() {
            return None;
        }

        Some(address.to_owned())
    }
}
