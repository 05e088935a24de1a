//! The showcase web server the scenarios run against.

use anyhow::{bail, Context as _, Result};
use std::{
    path::Path,
    process::{Child, Command, Stdio},
    time::{Duration, Instant},
};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// `cargo run -p web`, killed on drop.
pub struct WebServer {
    child: Child,
}

impl WebServer {
    pub fn spawn() -> Result<Self> {
        let workspace = Path::new(env!("CARGO_MANIFEST_DIR")).join("..");
        let child = Command::new("cargo")
            .args(["run", "-p", "web"])
            .current_dir(&workspace)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| {
                format!("failed to spawn `cargo run -p web` in {}", workspace.display())
            })?;

        info!(pid = child.id(), "spawned web server");
        Ok(WebServer { child })
    }
}

impl Drop for WebServer {
    fn drop(&mut self) {
        if let Err(err) = self.child.kill() {
            warn!("failed to stop web server: {}", err);
        }
        let _ = self.child.wait();
    }
}

/// Polls until `addr` accepts TCP connections.
pub async fn wait_until_ready(addr: &str, timeout: Duration) -> Result<()> {
    let started = Instant::now();
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        match TcpStream::connect(addr).await {
            Ok(_) => {
                info!(addr, attempts, "web server is accepting connections");
                return Ok(());
            }
            Err(err) => debug!(addr, attempts, "web server not ready: {}", err),
        }

        if started.elapsed() >= timeout {
            bail!(
                "web server at {} not ready after {:?} ({} attempts)",
                addr,
                timeout,
                attempts
            );
        }
        tokio::time::sleep(PROBE_INTERVAL).await;
    }
}
