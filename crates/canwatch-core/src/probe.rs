//! Bounded reachability probing.
//!
//! The probe loop owns the retry policy: up to `count` attempts, a fixed
//! delay between attempts (none before the first), and an early return on
//! the first success. What one attempt means is behind the [`Pinger`] trait;
//! [`SystemPinger`] implements it by spawning the OS `ping` executable for a
//! single echo.

use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, trace, warn};

/// One reachability attempt against a host.
// Probing is strictly sequential on one task; no Send bound is needed.
#[allow(async_fn_in_trait)]
pub trait Pinger {
    /// Send a single echo to `host`, optionally bound to `interface`, and
    /// report whether it was answered.
    async fn ping_once(&self, host: &str, interface: Option<&str>) -> bool;
}

/// Run up to `count` probes against `host`, sleeping `interval` before every
/// attempt after the first.
///
/// Returns `true` as soon as any attempt succeeds, without running the
/// remaining attempts; returns `false` only when all `count` attempts fail.
pub async fn probe<P: Pinger>(
    pinger: &P,
    host: &str,
    count: u32,
    interval: Duration,
    interface: Option<&str>,
) -> bool {
    for attempt in 0..count {
        if attempt > 0 {
            tokio::time::sleep(interval).await;
        }
        if pinger.ping_once(host, interface).await {
            debug!(host, attempt, "probe succeeded");
            return true;
        }
        debug!(host, attempt, "probe failed");
    }
    false
}

/// [`Pinger`] backed by the platform `ping` executable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPinger;

impl Pinger for SystemPinger {
    async fn ping_once(&self, host: &str, interface: Option<&str>) -> bool {
        let mut command = Command::new("ping");
        if let Some(iface) = interface {
            // Windows ping binds to a source address, not an interface name
            command.arg(if cfg!(windows) { "-S" } else { "-I" }).arg(iface);
        }
        command
            .arg(if cfg!(windows) { "-n" } else { "-c" })
            .arg("1")
            .arg(host);

        let output = match command.output().await {
            Ok(output) => output,
            Err(err) => {
                warn!(%err, "could not run ping");
                return false;
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!("{stdout}");

        // Windows ping exits 0 on "Destination host unreachable"
        if cfg!(windows) && stdout.contains("Destination host unreachable") {
            return false;
        }
        output.status.success()
    }
}
