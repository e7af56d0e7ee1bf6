//! Layered configuration resolution.
//!
//! Precedence, highest first: command-line flags, environment variables
//! (handled by clap's `env` attribute), the optional TOML config file,
//! built-in defaults. The output is a fully-resolved [`HealthPolicy`] plus
//! credentials and gateway URL; nothing downstream re-reads the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use canwatch_core::{Credentials, HealthPolicy, DEFAULT_GATEWAY_URL};
use clap::Parser;
use serde::Deserialize;
use tracing::warn;
use url::Url;

/// Check cellular gateway band, tower, and connectivity health and reboot it
/// if necessary.
#[derive(Debug, Parser)]
#[command(name = "canwatch", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, env = "CANWATCH_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Gateway admin username
    #[arg(short = 'u', long, env = "CANWATCH_USERNAME")]
    pub username: Option<String>,

    /// Gateway admin password
    #[arg(short = 'p', long, env = "CANWATCH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Base URL of the gateway management interface
    #[arg(long, env = "CANWATCH_GATEWAY_URL")]
    pub gateway_url: Option<Url>,

    /// Network interface to ping from (source IP on Windows)
    #[arg(short = 'I', long, env = "CANWATCH_INTERFACE")]
    pub interface: Option<String>,

    /// Host to ping
    #[arg(short = 'H', long, env = "CANWATCH_PING_HOST")]
    pub ping_host: Option<String>,

    /// How many ping probes to run before the check counts as failed
    #[arg(long, env = "CANWATCH_PING_COUNT")]
    pub ping_count: Option<u32>,

    /// Seconds to wait between ping probes
    #[arg(long, env = "CANWATCH_PING_INTERVAL")]
    pub ping_interval: Option<u64>,

    /// 4G band(s) the gateway is expected to camp on (repeatable)
    #[arg(short = '4', long = "band-4g", env = "CANWATCH_4G_BANDS", value_delimiter = ',')]
    pub band_4g: Vec<String>,

    /// 5G band(s) the gateway is expected to camp on (repeatable)
    #[arg(short = '5', long = "band-5g", env = "CANWATCH_5G_BANDS", value_delimiter = ',')]
    pub band_5g: Vec<String>,

    /// eNB ID the gateway is expected to be attached to
    #[arg(long, env = "CANWATCH_ENBID")]
    pub enbid: Option<u64>,

    /// Reboot when not attached to the expected eNB ID
    #[arg(long, env = "CANWATCH_CHECK_ENBID")]
    pub check_enbid: bool,

    /// Reboot when the 4G band is not an expected one
    #[arg(long, env = "CANWATCH_CHECK_4G_BAND")]
    pub check_4g_band: bool,

    /// Reboot when the 5G band is not an expected one
    #[arg(long, env = "CANWATCH_CHECK_5G_BAND")]
    pub check_5g_band: bool,

    /// Reboot when the ping probe fails
    #[arg(long, env = "CANWATCH_CHECK_PING")]
    pub check_ping: bool,

    /// Seconds the gateway must be up before a reboot is considered
    #[arg(long = "uptime", env = "CANWATCH_MIN_UPTIME", value_name = "SECONDS")]
    pub min_uptime: Option<u64>,

    /// Skip health checks and reboot the gateway immediately
    #[arg(short = 'R', long, conflicts_with = "skip_reboot")]
    pub reboot: bool,

    /// Run health checks but never reboot
    #[arg(short = 'r', long, env = "CANWATCH_SKIP_REBOOT")]
    pub skip_reboot: bool,
}

/// Optional config-file counterpart of [`Cli`]. Every field may be absent.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub gateway_url: Option<String>,
    pub interface: Option<String>,
    pub ping_host: Option<String>,
    pub ping_count: Option<u32>,
    pub ping_interval: Option<u64>,
    pub band_4g: Option<Vec<String>>,
    pub band_5g: Option<Vec<String>>,
    pub enbid: Option<u64>,
    pub check_enbid: Option<bool>,
    pub check_4g_band: Option<bool>,
    pub check_5g_band: Option<bool>,
    pub check_ping: Option<bool>,
    pub min_uptime: Option<u64>,
    pub skip_reboot: Option<bool>,
}

impl FileConfig {
    /// Load and parse the TOML config file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// Everything one evaluation pass needs, fully resolved.
#[derive(Debug)]
pub struct Resolved {
    pub credentials: Credentials,
    pub gateway_url: Url,
    pub policy: HealthPolicy,
}

/// Merge flags/env over the config file over defaults.
pub fn resolve(cli: Cli, file: FileConfig) -> anyhow::Result<Resolved> {
    let credentials = Credentials {
        username: cli
            .username
            .or(file.username)
            .unwrap_or_else(|| "admin".to_owned()),
        password: cli.password.or(file.password).context(
            "no password configured; pass --password, set CANWATCH_PASSWORD, \
             or add `password` to the config file",
        )?,
    };

    let gateway_url = match cli.gateway_url {
        Some(url) => url,
        None => {
            let raw = file.gateway_url.as_deref().unwrap_or(DEFAULT_GATEWAY_URL);
            Url::parse(raw).with_context(|| format!("invalid gateway_url '{raw}'"))?
        }
    };

    let defaults = HealthPolicy::default();
    let mut policy = HealthPolicy {
        min_uptime_secs: cli
            .min_uptime
            .or(file.min_uptime)
            .unwrap_or(defaults.min_uptime_secs),
        check_enbid: cli.check_enbid || file.check_enbid.unwrap_or(false),
        check_4g_band: cli.check_4g_band || file.check_4g_band.unwrap_or(false),
        check_5g_band: cli.check_5g_band || file.check_5g_band.unwrap_or(false),
        check_ping: cli.check_ping || file.check_ping.unwrap_or(false),
        expected_enbid: cli.enbid.or(file.enbid),
        expected_4g_bands: if cli.band_4g.is_empty() {
            file.band_4g.unwrap_or_default()
        } else {
            cli.band_4g
        },
        expected_5g_bands: if cli.band_5g.is_empty() {
            file.band_5g.unwrap_or(defaults.expected_5g_bands)
        } else {
            cli.band_5g
        },
        ping_host: cli.ping_host.or(file.ping_host).unwrap_or(defaults.ping_host),
        ping_count: cli
            .ping_count
            .or(file.ping_count)
            .unwrap_or(defaults.ping_count),
        ping_interval: cli
            .ping_interval
            .or(file.ping_interval)
            .map_or(defaults.ping_interval, Duration::from_secs),
        ping_interface: cli.interface.or(file.interface),
        reboot_now: cli.reboot,
        // An explicit --reboot outranks a skip_reboot left in the file.
        skip_reboot: cli.skip_reboot || (!cli.reboot && file.skip_reboot.unwrap_or(false)),
    };

    // A check without the value it compares against degrades to disabled,
    // loudly.
    if policy.check_enbid && policy.expected_enbid.is_none() {
        warn!("eNB ID check enabled but no eNB ID configured; disabling the check");
        policy.check_enbid = false;
    }
    if policy.check_4g_band && policy.expected_4g_bands.is_empty() {
        warn!("4G band check enabled but no 4G bands configured; disabling the check");
        policy.check_4g_band = false;
    }
    if policy.check_5g_band && policy.expected_5g_bands.is_empty() {
        warn!("5G band check enabled but no 5G bands configured; disabling the check");
        policy.check_5g_band = false;
    }

    Ok(Resolved {
        credentials,
        gateway_url,
        policy,
    })
}
