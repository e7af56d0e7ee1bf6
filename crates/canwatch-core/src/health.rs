//! Policy-driven health evaluation and the reboot decision.
//!
//! One evaluation pass runs each enabled check, accumulates a single
//! "reboot requested" bit plus one human-readable line per check, and then
//! gates the actual reboot behind the minimum-uptime threshold. Checks are
//! independent: a later check still runs and records its line even when an
//! earlier one already requested a reboot.

use tracing::debug;

use crate::device::{SignalSnapshot, SiteIdentity};
use crate::error::Result;
use crate::probe::{probe, Pinger};

/// Default host probed by the ping check.
pub const DEFAULT_PING_HOST: &str = "google.com";
/// Default 5G band the gateway is expected to camp on.
pub const DEFAULT_5G_BAND: &str = "n41";

/// Everything the evaluator needs from the gateway, as a seam for tests.
///
/// Implemented by [`crate::device::DeviceClient`]; fakes stand in for it in
/// the test suite.
// One evaluation pass runs on one task; no Send bound is needed.
#[allow(async_fn_in_trait)]
pub trait Gateway {
    /// Attached cell site (app session).
    async fn site_info(&mut self) -> Result<SiteIdentity>;
    /// Current band per RAT (unauthenticated).
    async fn signal_info(&mut self) -> Result<SignalSnapshot>;
    /// Seconds since the gateway booted (unauthenticated).
    async fn uptime(&mut self) -> Result<u64>;
    /// Reboot the gateway (web session + CSRF token).
    async fn reboot(&mut self) -> Result<()>;
}

/// Fully-resolved policy for one evaluation pass.
///
/// Resolution precedence (flags over environment over config file over
/// defaults) is the CLI layer's concern; the evaluator only ever sees the
/// final values.
#[derive(Debug, Clone)]
pub struct HealthPolicy {
    /// Seconds the gateway must have been up before a reboot is performed.
    pub min_uptime_secs: u64,

    /// Reboot when not attached to [`Self::expected_enbid`].
    pub check_enbid: bool,
    /// Reboot when the 4G band is not in [`Self::expected_4g_bands`].
    pub check_4g_band: bool,
    /// Reboot when the 5G band is not in [`Self::expected_5g_bands`].
    pub check_5g_band: bool,
    /// Reboot when the ping probe fails.
    pub check_ping: bool,

    /// Base station the gateway is expected to be attached to.
    pub expected_enbid: Option<u64>,
    /// Acceptable 4G bands; when empty the 4G comparison never runs.
    pub expected_4g_bands: Vec<String>,
    /// Acceptable 5G bands; defaults to [`DEFAULT_5G_BAND`].
    pub expected_5g_bands: Vec<String>,

    /// Host probed by the ping check.
    pub ping_host: String,
    /// Number of ping probes before the check counts as failed.
    pub ping_count: u32,
    /// Delay between ping probes.
    pub ping_interval: std::time::Duration,
    /// Interface (source address on Windows) to ping from.
    pub ping_interface: Option<String>,

    /// Skip all checks and request a reboot immediately.
    pub reboot_now: bool,
    /// Run the checks but never reboot.
    pub skip_reboot: bool,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            min_uptime_secs: 90,
            check_enbid: false,
            check_4g_band: false,
            check_5g_band: false,
            check_ping: false,
            expected_enbid: None,
            expected_4g_bands: Vec::new(),
            expected_5g_bands: vec![DEFAULT_5G_BAND.to_owned()],
            ping_host: DEFAULT_PING_HOST.to_owned(),
            ping_count: 1,
            ping_interval: std::time::Duration::from_secs(10),
            ping_interface: None,
            reboot_now: false,
            skip_reboot: false,
        }
    }
}

/// Terminal output of one evaluation pass.
#[derive(Debug, Default)]
pub struct Decision {
    /// Whether any check (or the force flag) asked for a reboot.
    pub reboot_requested: bool,
    /// One line per evaluated check plus the final-gate line(s), in order.
    pub reasons: Vec<String>,
    /// Whether the reboot was actually performed.
    pub rebooted: bool,
}

/// Run one evaluation pass against the gateway.
///
/// # Errors
///
/// Returns an error when a gateway call fails; a failed ping probe is a
/// normal negative result, not an error.
pub async fn evaluate<G: Gateway, P: Pinger>(
    gateway: &mut G,
    pinger: &P,
    policy: &HealthPolicy,
) -> Result<Decision> {
    let mut decision = Decision {
        reboot_requested: policy.reboot_now,
        ..Decision::default()
    };

    // A forced reboot bypasses every check.
    if !policy.reboot_now {
        run_checks(gateway, pinger, policy, &mut decision).await?;
    }

    if decision.reboot_requested {
        if policy.skip_reboot {
            decision.reasons.push("Not rebooting.".to_owned());
        } else {
            decision.reasons.push("Reboot requested.".to_owned());
            let uptime = gateway.uptime().await?;
            if uptime >= policy.min_uptime_secs {
                decision.reasons.push("Rebooting.".to_owned());
                gateway.reboot().await?;
                decision.rebooted = true;
            } else {
                debug!(uptime, min = policy.min_uptime_secs, "uptime below threshold");
                decision
                    .reasons
                    .push("Uptime threshold not met for reboot.".to_owned());
            }
        }
    } else {
        decision.reasons.push("No reboot necessary.".to_owned());
    }

    Ok(decision)
}

async fn run_checks<G: Gateway, P: Pinger>(
    gateway: &mut G,
    pinger: &P,
    policy: &HealthPolicy,
    decision: &mut Decision,
) -> Result<()> {
    if policy.check_enbid {
        if let Some(expected) = policy.expected_enbid {
            let site = gateway.site_info().await?;
            if site.enb_id == expected {
                decision
                    .reasons
                    .push(format!("eNB ID check passed, on {}.", site.enb_id));
            } else {
                decision
                    .reasons
                    .push(format!("Not on eNB ID {expected}, on {}.", site.enb_id));
                decision.reboot_requested = true;
            }
        }
    }

    // One snapshot serves both band comparisons. The band lines are
    // recorded whenever the comparison runs; only the check flag decides
    // whether a mismatch also requests a reboot.
    if policy.check_4g_band || policy.check_5g_band {
        let signal = gateway.signal_info().await?;
        if !policy.expected_4g_bands.is_empty() {
            check_band(
                signal.band_4g.as_deref(),
                &policy.expected_4g_bands,
                policy.check_4g_band,
                decision,
            );
        }
        if !policy.expected_5g_bands.is_empty() {
            check_band(
                signal.band_5g.as_deref(),
                &policy.expected_5g_bands,
                policy.check_5g_band,
                decision,
            );
        }
    }

    if policy.check_ping {
        let reachable = probe(
            pinger,
            &policy.ping_host,
            policy.ping_count,
            policy.ping_interval,
            policy.ping_interface.as_deref(),
        )
        .await;
        if reachable {
            decision
                .reasons
                .push(format!("Ping to {} succeeded.", policy.ping_host));
        } else {
            decision
                .reasons
                .push(format!("Could not ping {}.", policy.ping_host));
            decision.reboot_requested = true;
        }
    }

    Ok(())
}

/// Compare the current band against the expected set. An absent band (no
/// connection on that RAT) counts as a mismatch.
fn check_band(
    current: Option<&str>,
    expected: &[String],
    reboot_on_mismatch: bool,
    decision: &mut Decision,
) {
    match current {
        Some(band) if expected.iter().any(|b| b == band) => {
            decision.reasons.push(format!("Camping on {band}."));
        }
        _ => {
            let qualifier = if expected.len() > 1 { "one of " } else { "" };
            decision
                .reasons
                .push(format!("Not on {qualifier}{}.", expected.join(", ")));
            if reboot_on_mismatch {
                decision.reboot_requested = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;

    /// Gateway fake with canned answers and call counters.
    #[derive(Default)]
    struct FakeGateway {
        site: Option<SiteIdentity>,
        signal: SignalSnapshot,
        uptime: u64,
        site_calls: usize,
        signal_calls: usize,
        uptime_calls: usize,
        reboots: usize,
    }

    impl FakeGateway {
        fn on_site(enb_id: u64) -> Self {
            Self {
                site: Some(SiteIdentity {
                    enb_id,
                    plmn: "310-260".into(),
                }),
                uptime: 3600,
                ..Self::default()
            }
        }
    }

    impl Gateway for FakeGateway {
        async fn site_info(&mut self) -> Result<SiteIdentity> {
            self.site_calls += 1;
            self.site.clone().ok_or_else(|| GatewayError::UnexpectedBody {
                endpoint: "cell_status_app.cgi".into(),
                detail: "cell_stat_lte array is empty".into(),
            })
        }

        async fn signal_info(&mut self) -> Result<SignalSnapshot> {
            self.signal_calls += 1;
            Ok(self.signal.clone())
        }

        async fn uptime(&mut self) -> Result<u64> {
            self.uptime_calls += 1;
            Ok(self.uptime)
        }

        async fn reboot(&mut self) -> Result<()> {
            self.reboots += 1;
            Ok(())
        }
    }

    /// Pinger that always answers the same way.
    struct StaticPinger(bool);

    impl Pinger for StaticPinger {
        async fn ping_once(&self, _host: &str, _interface: Option<&str>) -> bool {
            self.0
        }
    }

    const UP: StaticPinger = StaticPinger(true);
    const DOWN: StaticPinger = StaticPinger(false);

    fn enbid_policy(expected: u64) -> HealthPolicy {
        HealthPolicy {
            check_enbid: true,
            expected_enbid: Some(expected),
            ..HealthPolicy::default()
        }
    }

    #[tokio::test]
    async fn all_checks_disabled_yields_single_no_reboot_reason() {
        let mut gateway = FakeGateway::default();
        let decision = evaluate(&mut gateway, &UP, &HealthPolicy::default())
            .await
            .unwrap();

        assert!(!decision.reboot_requested);
        assert!(!decision.rebooted);
        assert_eq!(decision.reasons, vec!["No reboot necessary.".to_owned()]);
        assert_eq!(gateway.site_calls, 0);
        assert_eq!(gateway.signal_calls, 0);
        assert_eq!(gateway.uptime_calls, 0);
    }

    #[tokio::test]
    async fn enbid_mismatch_requests_reboot() {
        let mut gateway = FakeGateway::on_site(200);
        let decision = evaluate(&mut gateway, &UP, &enbid_policy(100)).await.unwrap();

        assert!(decision.reboot_requested);
        assert!(decision.rebooted);
        assert!(decision.reasons.contains(&"Not on eNB ID 100, on 200.".to_owned()));
        assert_eq!(gateway.reboots, 1);
    }

    #[tokio::test]
    async fn enbid_match_passes() {
        let mut gateway = FakeGateway::on_site(100);
        let decision = evaluate(&mut gateway, &UP, &enbid_policy(100)).await.unwrap();

        assert!(!decision.reboot_requested);
        assert_eq!(
            decision.reasons,
            vec![
                "eNB ID check passed, on 100.".to_owned(),
                "No reboot necessary.".to_owned()
            ]
        );
        assert_eq!(gateway.reboots, 0);
    }

    #[tokio::test]
    async fn uptime_below_threshold_blocks_the_reboot() {
        let mut gateway = FakeGateway::on_site(200);
        gateway.uptime = 45;
        let decision = evaluate(&mut gateway, &UP, &enbid_policy(100)).await.unwrap();

        assert!(decision.reboot_requested);
        assert!(!decision.rebooted);
        assert!(decision
            .reasons
            .contains(&"Uptime threshold not met for reboot.".to_owned()));
        assert_eq!(gateway.reboots, 0);
    }

    #[tokio::test]
    async fn uptime_at_or_above_threshold_reboots() {
        let mut gateway = FakeGateway::on_site(200);
        gateway.uptime = 120;
        let decision = evaluate(&mut gateway, &UP, &enbid_policy(100)).await.unwrap();

        assert!(decision.rebooted);
        assert!(decision.reasons.contains(&"Rebooting.".to_owned()));
        assert_eq!(gateway.reboots, 1);
    }

    #[tokio::test]
    async fn skip_reboot_suppresses_even_a_requested_reboot() {
        let mut gateway = FakeGateway::on_site(200);
        let policy = HealthPolicy {
            skip_reboot: true,
            ..enbid_policy(100)
        };
        let decision = evaluate(&mut gateway, &UP, &policy).await.unwrap();

        assert!(decision.reboot_requested);
        assert!(!decision.rebooted);
        assert!(decision.reasons.contains(&"Not rebooting.".to_owned()));
        assert_eq!(gateway.uptime_calls, 0);
        assert_eq!(gateway.reboots, 0);
    }

    #[tokio::test]
    async fn forced_reboot_bypasses_all_checks() {
        let mut gateway = FakeGateway::on_site(200);
        let policy = HealthPolicy {
            reboot_now: true,
            check_ping: true,
            ..enbid_policy(100)
        };
        let decision = evaluate(&mut gateway, &DOWN, &policy).await.unwrap();

        assert!(decision.rebooted);
        assert_eq!(gateway.site_calls, 0);
        assert_eq!(gateway.signal_calls, 0);
        assert_eq!(gateway.reboots, 1);
    }

    #[tokio::test]
    async fn band_mismatch_is_recorded_even_when_only_observed() {
        // 4G bands configured but only the 5G check may reboot; the 4G
        // mismatch line is still recorded.
        let mut gateway = FakeGateway {
            signal: SignalSnapshot {
                band_4g: Some("B2".into()),
                band_5g: Some("n41".into()),
            },
            uptime: 3600,
            ..FakeGateway::default()
        };
        let policy = HealthPolicy {
            check_5g_band: true,
            expected_4g_bands: vec!["B66".into(), "B71".into()],
            ..HealthPolicy::default()
        };
        let decision = evaluate(&mut gateway, &UP, &policy).await.unwrap();

        assert!(!decision.reboot_requested);
        assert_eq!(
            decision.reasons,
            vec![
                "Not on one of B66, B71.".to_owned(),
                "Camping on n41.".to_owned(),
                "No reboot necessary.".to_owned()
            ]
        );
        assert_eq!(gateway.signal_calls, 1);
    }

    #[tokio::test]
    async fn band_mismatch_reboots_when_check_enabled() {
        let mut gateway = FakeGateway {
            signal: SignalSnapshot {
                band_4g: None,
                band_5g: Some("n71".into()),
            },
            uptime: 3600,
            ..FakeGateway::default()
        };
        let policy = HealthPolicy {
            check_5g_band: true,
            ..HealthPolicy::default()
        };
        let decision = evaluate(&mut gateway, &UP, &policy).await.unwrap();

        assert!(decision.reboot_requested);
        assert!(decision.reasons.contains(&"Not on n41.".to_owned()));
        assert!(decision.rebooted);
    }

    #[tokio::test]
    async fn missing_band_counts_as_mismatch() {
        let mut gateway = FakeGateway {
            signal: SignalSnapshot::default(),
            uptime: 3600,
            ..FakeGateway::default()
        };
        let policy = HealthPolicy {
            check_5g_band: true,
            ..HealthPolicy::default()
        };
        let decision = evaluate(&mut gateway, &UP, &policy).await.unwrap();

        assert!(decision.reboot_requested);
        assert!(decision.reasons.contains(&"Not on n41.".to_owned()));
    }

    #[tokio::test]
    async fn failed_ping_requests_reboot() {
        let mut gateway = FakeGateway {
            uptime: 3600,
            ..FakeGateway::default()
        };
        let policy = HealthPolicy {
            check_ping: true,
            ..HealthPolicy::default()
        };
        let decision = evaluate(&mut gateway, &DOWN, &policy).await.unwrap();

        assert!(decision.reboot_requested);
        assert!(decision.reasons.contains(&"Could not ping google.com.".to_owned()));
        assert!(decision.rebooted);
    }

    #[tokio::test]
    async fn successful_ping_records_a_pass_line() {
        let mut gateway = FakeGateway::default();
        let policy = HealthPolicy {
            check_ping: true,
            ..HealthPolicy::default()
        };
        let decision = evaluate(&mut gateway, &UP, &policy).await.unwrap();

        assert!(!decision.reboot_requested);
        assert_eq!(
            decision.reasons,
            vec![
                "Ping to google.com succeeded.".to_owned(),
                "No reboot necessary.".to_owned()
            ]
        );
    }

    #[tokio::test]
    async fn later_checks_still_run_after_an_earlier_trigger() {
        let mut gateway = FakeGateway {
            site: Some(SiteIdentity {
                enb_id: 200,
                plmn: "310-260".into(),
            }),
            signal: SignalSnapshot {
                band_4g: None,
                band_5g: Some("n41".into()),
            },
            uptime: 3600,
            ..FakeGateway::default()
        };
        let policy = HealthPolicy {
            check_5g_band: true,
            ..enbid_policy(100)
        };
        let decision = evaluate(&mut gateway, &UP, &policy).await.unwrap();

        // eNB ID already triggered, yet the 5G pass line is still there.
        assert!(decision.reasons.contains(&"Camping on n41.".to_owned()));
        assert!(decision.reboot_requested);
    }

    #[tokio::test]
    async fn enbid_check_without_expected_value_is_skipped() {
        let mut gateway = FakeGateway::on_site(200);
        let policy = HealthPolicy {
            check_enbid: true,
            expected_enbid: None,
            ..HealthPolicy::default()
        };
        let decision = evaluate(&mut gateway, &UP, &policy).await.unwrap();

        assert_eq!(gateway.site_calls, 0);
        assert_eq!(decision.reasons, vec!["No reboot necessary.".to_owned()]);
    }

    #[tokio::test]
    async fn gateway_errors_propagate() {
        let mut gateway = FakeGateway {
            site: None,
            ..FakeGateway::default()
        };
        let result = evaluate(&mut gateway, &UP, &enbid_policy(100)).await;
        assert!(matches!(result, Err(GatewayError::UnexpectedBody { .. })));
    }
}
