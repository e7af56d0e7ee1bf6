//! # canwatch
//!
//! Check a cellular home-internet gateway's health over its local HTTP
//! management API and reboot it when the configured checks fail.
//!
//! One invocation runs one evaluation pass and exits; nothing is persisted
//! between runs.
//!
//! ## Running
//!
//! ```bash
//! # Ping check only, never reboot
//! canwatch --password "$GW_PASSWORD" --check-ping --skip-reboot
//!
//! # Full policy from a config file, flags overriding
//! canwatch --config canwatch.toml --check-5g-band -5 n41
//! ```
//!
//! Exit codes: `0` on a completed pass (whether or not a reboot happened),
//! `2` when the gateway cannot be reached, `1` for any other failure.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::process::ExitCode;

use anyhow::Context as _;
use canwatch_core::{evaluate, DeviceClient, GatewayError, SystemPinger};
use clap::Parser;
use tracing::{debug, error};

mod config;

/// Exit code for "cannot reach device", distinguishable by wrappers.
const EXIT_UNREACHABLE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let cli = config::Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            if err
                .downcast_ref::<GatewayError>()
                .is_some_and(GatewayError::is_unreachable)
            {
                ExitCode::from(EXIT_UNREACHABLE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: config::Cli) -> anyhow::Result<()> {
    let file = match &cli.config {
        Some(path) => config::FileConfig::load(path)?,
        None => config::FileConfig::default(),
    };
    let resolved = config::resolve(cli, file)?;
    debug!(policy = ?resolved.policy, gateway = %resolved.gateway_url, "resolved configuration");

    let mut gateway = DeviceClient::new(resolved.gateway_url, resolved.credentials);
    let decision = evaluate(&mut gateway, &SystemPinger, &resolved.policy)
        .await
        .context("health evaluation failed")?;

    // The per-check lines are the program's output, not logs.
    for reason in &decision.reasons {
        println!("{reason}");
    }
    debug!(
        reboot_requested = decision.reboot_requested,
        rebooted = decision.rebooted,
        "evaluation pass complete"
    );

    Ok(())
}

/// Initialize logging to stderr, keeping stdout for the check output.
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
