//! Typed wrappers over the gateway's status and reboot endpoints.
//!
//! Two endpoints are unauthenticated (uptime, radio status), one needs the
//! app session (cell status), and the reboot needs the web session plus its
//! CSRF token. [`DeviceClient`] owns the [`AuthClient`] and sends session
//! cookies explicitly per request, so the two protocols can never bleed into
//! each other through a shared cookie jar.

use serde::{Deserialize, Deserializer};
use tracing::debug;
use url::Url;

use crate::auth::{AuthClient, Credentials};
use crate::error::{GatewayError, Result};
use crate::transport;

/// The gateway's fixed LAN address.
pub const DEFAULT_GATEWAY_URL: &str = "http://192.168.12.1/";

const DEVICE_INFO_STATUS: &str = "dashboard_device_info_status_web_app.cgi";
const RADIO_STATUS: &str = "fastmile_radio_status_web_app.cgi";
const CELL_STATUS: &str = "cell_status_app.cgi";
const REBOOT: &str = "reboot_web_app.cgi";

/// Which cell tower the gateway is attached to, as one read-only snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteIdentity {
    /// Base station identifier.
    pub enb_id: u64,
    /// Carrier code, `MCC-MNC`.
    pub plmn: String,
}

/// Current band per radio access technology, as one read-only snapshot.
///
/// Either side may be absent when the gateway has no connection on that RAT.
#[derive(Debug, Clone, Default)]
pub struct SignalSnapshot {
    /// Current 4G/LTE band label (e.g. `B66`).
    pub band_4g: Option<String>,
    /// Current 5G/NR band label (e.g. `n41`).
    pub band_5g: Option<String>,
}

#[derive(Deserialize)]
struct DeviceInfoStatus {
    device_app_status: Vec<DeviceAppStatus>,
}

#[derive(Deserialize)]
struct DeviceAppStatus {
    #[serde(rename = "UpTime")]
    up_time: u64,
}

#[derive(Deserialize)]
struct RadioStatus {
    #[serde(rename = "cell_LTE_stats_cfg", default)]
    lte: Vec<RadioEntry>,
    #[serde(rename = "cell_5G_stats_cfg", default)]
    nr: Vec<RadioEntry>,
}

#[derive(Deserialize)]
struct RadioEntry {
    stat: RadioStat,
}

#[derive(Deserialize)]
struct RadioStat {
    #[serde(rename = "Band")]
    band: String,
}

#[derive(Deserialize)]
struct CellStatus {
    cell_stat_lte: Vec<LteCellStat>,
}

#[derive(Deserialize)]
struct LteCellStat {
    #[serde(rename = "eNBID", deserialize_with = "u64_from_string_or_number")]
    enb_id: u64,
    #[serde(rename = "MCC")]
    mcc: String,
    #[serde(rename = "MNC")]
    mnc: String,
}

/// The gateway reports `eNBID` as a JSON string on some firmware and a
/// number on others.
fn u64_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Client for the gateway's management endpoints.
pub struct DeviceClient {
    http: reqwest::Client,
    base: Url,
    auth: AuthClient,
}

impl DeviceClient {
    /// Create a client for the gateway at `base`.
    #[must_use]
    pub fn new(base: Url, credentials: Credentials) -> Self {
        let http = reqwest::Client::new();
        let auth = AuthClient::new(http.clone(), base.clone(), credentials);
        Self { http, base, auth }
    }

    /// Seconds the gateway has been up. Unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or a body
    /// without a `device_app_status` entry.
    pub async fn uptime(&self) -> Result<u64> {
        let url = self.base.join(DEVICE_INFO_STATUS)?;
        let response = transport::check(DEVICE_INFO_STATUS, self.http.get(url).send().await)?;
        let status: DeviceInfoStatus = transport::json(DEVICE_INFO_STATUS, response).await?;
        let first = status.device_app_status.first().ok_or_else(|| {
            GatewayError::UnexpectedBody {
                endpoint: DEVICE_INFO_STATUS.to_owned(),
                detail: "device_app_status array is empty".to_owned(),
            }
        })?;
        debug!(uptime_secs = first.up_time, "fetched gateway uptime");
        Ok(first.up_time)
    }

    /// Current band per RAT. Unauthenticated.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or an
    /// undecodable body. A missing RAT entry is not an error; the
    /// corresponding band is `None`.
    pub async fn signal_info(&self) -> Result<SignalSnapshot> {
        let url = self.base.join(RADIO_STATUS)?;
        let response = transport::check(RADIO_STATUS, self.http.get(url).send().await)?;
        let status: RadioStatus = transport::json(RADIO_STATUS, response).await?;
        let snapshot = SignalSnapshot {
            band_4g: status.lte.into_iter().next().map(|e| e.stat.band),
            band_5g: status.nr.into_iter().next().map(|e| e.stat.band),
        };
        debug!(?snapshot, "fetched radio status");
        Ok(snapshot)
    }

    /// Attached cell site. Requires the app session, acquired lazily.
    ///
    /// # Errors
    ///
    /// Returns an error on login failure, transport failure, non-2xx
    /// status, or a body without a `cell_stat_lte` entry.
    pub async fn site_info(&mut self) -> Result<SiteIdentity> {
        let cookie = self.auth.ensure_app_session().await?.cookie_header();
        let url = self.base.join(CELL_STATUS)?;
        let response = transport::check(
            CELL_STATUS,
            self.http
                .get(url)
                .header(reqwest::header::COOKIE, cookie)
                .send()
                .await,
        )?;
        let status: CellStatus = transport::json(CELL_STATUS, response).await?;
        let first = status
            .cell_stat_lte
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::UnexpectedBody {
                endpoint: CELL_STATUS.to_owned(),
                detail: "cell_stat_lte array is empty".to_owned(),
            })?;
        let site = SiteIdentity {
            enb_id: first.enb_id,
            plmn: format!("{}-{}", first.mcc, first.mnc),
        };
        debug!(enb_id = site.enb_id, plmn = %site.plmn, "fetched site identity");
        Ok(site)
    }

    /// Reboot the gateway. Requires the web session and its CSRF token,
    /// acquired lazily.
    ///
    /// # Errors
    ///
    /// Returns an error on login failure, transport failure, or non-2xx
    /// status.
    pub async fn reboot(&mut self) -> Result<()> {
        let context = self.auth.web_context().await?;
        let cookie = context.session.cookie_header();
        let form = [("csrf_token", context.csrf_token.clone())];
        let url = self.base.join(REBOOT)?;
        transport::check(
            REBOOT,
            self.http
                .post(url)
                .header(reqwest::header::COOKIE, cookie)
                .form(&form)
                .send()
                .await,
        )?;
        debug!("reboot accepted by gateway");
        Ok(())
    }
}

impl crate::health::Gateway for DeviceClient {
    async fn site_info(&mut self) -> Result<SiteIdentity> {
        Self::site_info(self).await
    }

    async fn signal_info(&mut self) -> Result<SignalSnapshot> {
        Self::signal_info(self).await
    }

    async fn uptime(&mut self) -> Result<u64> {
        Self::uptime(self).await
    }

    async fn reboot(&mut self) -> Result<()> {
        Self::reboot(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_body_parses_first_entry() {
        let body: DeviceInfoStatus = serde_json::from_str(
            r#"{"device_app_status":[{"UpTime":12345},{"UpTime":1}]}"#,
        )
        .unwrap();
        assert_eq!(body.device_app_status[0].up_time, 12345);
    }

    #[test]
    fn radio_status_parses_bands_per_rat() {
        let body: RadioStatus = serde_json::from_str(
            r#"{
                "cell_LTE_stats_cfg":[{"stat":{"Band":"B66","RSRP":-90}}],
                "cell_5G_stats_cfg":[{"stat":{"Band":"n41"}}]
            }"#,
        )
        .unwrap();
        assert_eq!(body.lte[0].stat.band, "B66");
        assert_eq!(body.nr[0].stat.band, "n41");
    }

    #[test]
    fn radio_status_tolerates_missing_rat() {
        let body: RadioStatus =
            serde_json::from_str(r#"{"cell_LTE_stats_cfg":[{"stat":{"Band":"B2"}}]}"#).unwrap();
        assert_eq!(body.lte.len(), 1);
        assert!(body.nr.is_empty());
    }

    #[test]
    fn cell_status_accepts_enbid_as_string_or_number() {
        let body: CellStatus = serde_json::from_str(
            r#"{"cell_stat_lte":[{"eNBID":"310055","MCC":"310","MNC":"260"}]}"#,
        )
        .unwrap();
        assert_eq!(body.cell_stat_lte[0].enb_id, 310_055);

        let body: CellStatus = serde_json::from_str(
            r#"{"cell_stat_lte":[{"eNBID":310055,"MCC":"310","MNC":"260"}]}"#,
        )
        .unwrap();
        assert_eq!(body.cell_stat_lte[0].enb_id, 310_055);
    }

    #[test]
    fn cell_status_rejects_non_numeric_enbid() {
        let result: std::result::Result<CellStatus, _> = serde_json::from_str(
            r#"{"cell_stat_lte":[{"eNBID":"not-a-number","MCC":"310","MNC":"260"}]}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn plmn_joins_mcc_and_mnc() {
        let stat = LteCellStat {
            enb_id: 42,
            mcc: "310".into(),
            mnc: "260".into(),
        };
        let plmn = format!("{}-{}", stat.mcc, stat.mnc);
        assert_eq!(plmn, "310-260");
    }
}
