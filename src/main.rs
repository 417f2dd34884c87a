/// Entry point for the dockstat container monitoring daemon.
///
/// This binary connects to the local Docker daemon, discovers running
/// containers, monitors their resource usage through per-container stats
/// subscriptions, and writes normalized metrics records as JSON lines to
/// stdout.
///
/// # Errors
///
/// Returns an error if the runtime socket is unreachable or a collection
/// pass loses its prerequisites (event feed or container listing).
///
/// # Examples
///
/// ```bash
/// DOCKER_SOCKET=/var/run/docker.sock COLLECT_INTERVAL_SECS=15 cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    dockstat::run().await
}
