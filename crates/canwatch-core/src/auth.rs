//! Session management for the gateway's two login protocols.
//!
//! The gateway exposes two independent authentication schemes against the
//! same admin credentials:
//!
//! - **App login**: a plain credential POST that answers with `sid`/`lsid`
//!   session cookies. Used by the cell-status endpoint.
//! - **Web login**: a nonce challenge. The client fetches `{nonce, randomKey}`,
//!   derives a set of SHA-256 pair hashes from the credentials and the
//!   challenge, and POSTs them back. A successful login yields `sid`/`lsid`
//!   cookies plus a CSRF token carried in the JSON body, which the reboot
//!   endpoint requires.
//!
//! The two cookie pairs are not interchangeable; [`AuthClient`] keeps one
//! cached [`Session`] per protocol and never mixes them. Sessions are
//! acquired lazily on first use and live until the process exits — there is
//! no logout and no re-authentication of a stale session.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::debug;
use url::Url;

use crate::codec;
use crate::error::{GatewayError, Result};
use crate::transport;

/// App login endpoint (plain credential POST).
pub(crate) const APP_LOGIN: &str = "login_app.cgi";
/// Web login endpoint (nonce challenge GET, then response POST).
pub(crate) const WEB_LOGIN: &str = "login_web_app.cgi";

/// Admin credentials for the gateway, supplied once at process start.
#[derive(Clone)]
pub struct Credentials {
    /// Admin username, usually `admin`.
    pub username: String,
    /// Admin password.
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The `sid`/`lsid` cookie pair issued by one login protocol.
///
/// Opaque to everything except the `Cookie` header it produces. One value
/// per protocol; app and web sessions are never interchanged.
#[derive(Debug, Clone)]
pub struct Session {
    sid: String,
    lsid: String,
}

impl Session {
    /// Build a session from the two cookie values.
    #[must_use]
    pub const fn new(sid: String, lsid: String) -> Self {
        Self { sid, lsid }
    }

    /// The `Cookie` header value carrying both session cookies.
    #[must_use]
    pub fn cookie_header(&self) -> String {
        format!("sid={}; lsid={}", self.sid, self.lsid)
    }
}

/// A web session together with the CSRF token issued alongside it.
///
/// Both fields come out of the same login response and share its lifetime.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The web-protocol session cookies.
    pub session: Session,
    /// Token the reboot endpoint requires in its form body.
    pub csrf_token: String,
}

/// One web-login challenge, consumed exactly once.
#[derive(Debug, serde::Deserialize)]
struct LoginChallenge {
    nonce: String,
    #[serde(rename = "randomKey")]
    random_key: String,
}

#[derive(Debug, serde::Deserialize)]
struct WebLoginResponse {
    token: String,
}

/// Lazily-authenticating owner of the app and web sessions.
pub struct AuthClient {
    http: reqwest::Client,
    base: Url,
    credentials: Credentials,
    app: Option<Session>,
    web: Option<AuthContext>,
}

impl AuthClient {
    /// Create an auth client against the given gateway base URL.
    #[must_use]
    pub const fn new(http: reqwest::Client, base: Url, credentials: Credentials) -> Self {
        Self {
            http,
            base,
            credentials,
            app: None,
            web: None,
        }
    }

    /// Return the app session, logging in first if none is cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway is unreachable, rejects the login,
    /// or answers without both session cookies.
    pub async fn ensure_app_session(&mut self) -> Result<&Session> {
        if self.app.is_none() {
            let session = self.login_app().await?;
            debug!("app login succeeded");
            self.app = Some(session);
        }
        Ok(self.app.as_ref().expect("app session cached above"))
    }

    /// Return the web session and CSRF token, logging in first if none is
    /// cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the gateway is unreachable, the challenge or
    /// login exchange fails, or the response lacks cookies or token.
    pub async fn ensure_web_session(&mut self) -> Result<&AuthContext> {
        if self.web.is_none() {
            let context = self.login_web().await?;
            debug!("web login succeeded");
            self.web = Some(context);
        }
        Ok(self.web.as_ref().expect("web session cached above"))
    }

    /// Alias for [`Self::ensure_web_session`], named for call sites that
    /// want the CSRF token.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::ensure_web_session`].
    pub async fn web_context(&mut self) -> Result<&AuthContext> {
        self.ensure_web_session().await
    }

    async fn login_app(&self) -> Result<Session> {
        let url = self.base.join(APP_LOGIN)?;
        let form = [
            ("name", self.credentials.username.as_str()),
            ("pswd", self.credentials.password.as_str()),
        ];
        let response = transport::check(APP_LOGIN, self.http.post(url).form(&form).send().await)?;
        session_from_cookies(APP_LOGIN, &response)
    }

    async fn login_web(&self) -> Result<AuthContext> {
        let challenge_url = self.base.join(&format!("{WEB_LOGIN}?nonce"))?;
        let response = transport::check(WEB_LOGIN, self.http.get(challenge_url).send().await)?;
        let challenge: LoginChallenge = transport::json(WEB_LOGIN, response).await?;

        let form = web_login_form(&self.credentials, &challenge, rand::random(), rand::random());
        let url = self.base.join(WEB_LOGIN)?;
        let response = transport::check(WEB_LOGIN, self.http.post(url).form(&form).send().await)?;
        let session = session_from_cookies(WEB_LOGIN, &response)?;
        let body: WebLoginResponse = transport::json(WEB_LOGIN, response).await?;

        Ok(AuthContext {
            session,
            csrf_token: body.token,
        })
    }
}

/// Derive the web login form from credentials and a challenge.
///
/// The password never travels directly: the gateway checks
/// `pair_hash(pair_hash(user, pass), nonce)`. `enckey`/`enciv` are fresh
/// random values the device expects populated but that this client does not
/// use for any encryption of its own.
fn web_login_form(
    credentials: &Credentials,
    challenge: &LoginChallenge,
    enckey: [u8; 16],
    enciv: [u8; 16],
) -> Vec<(&'static str, String)> {
    let pass_hash = codec::pair_hash(&credentials.username, &credentials.password);
    vec![
        (
            "userhash",
            codec::url_safe_pair_hash(&credentials.username, &challenge.nonce),
        ),
        (
            "RandomKeyhash",
            codec::url_safe_pair_hash(&challenge.random_key, &challenge.nonce),
        ),
        (
            "response",
            codec::url_safe_pair_hash(&pass_hash, &challenge.nonce),
        ),
        ("nonce", codec::url_safe_escape(&challenge.nonce)),
        ("enckey", codec::url_safe_escape(&STANDARD.encode(enckey))),
        ("enciv", codec::url_safe_escape(&STANDARD.encode(enciv))),
    ]
}

/// Extract the `sid`/`lsid` cookie pair from a login response.
fn session_from_cookies(endpoint: &str, response: &reqwest::Response) -> Result<Session> {
    let cookie = |name: &'static str| -> Result<String> {
        response
            .cookies()
            .find(|c| c.name() == name)
            .map(|c| c.value().to_owned())
            .ok_or_else(|| GatewayError::MissingCookie {
                endpoint: endpoint.to_owned(),
                name,
            })
    };
    Ok(Session::new(cookie("sid")?, cookie("lsid")?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            username: "admin".into(),
            password: "secret".into(),
        }
    }

    fn challenge() -> LoginChallenge {
        LoginChallenge {
            nonce: "c2FtcGxlbm9uY2U=".into(),
            random_key: "cmFuZG9ta2V5".into(),
        }
    }

    fn field<'a>(form: &'a [(&'static str, String)], name: &str) -> &'a str {
        &form
            .iter()
            .find(|(n, _)| *n == name)
            .unwrap_or_else(|| panic!("form has no field '{name}'"))
            .1
    }

    #[test]
    fn web_login_form_derives_hashes_from_the_challenge() {
        let creds = credentials();
        let ch = challenge();
        let form = web_login_form(&creds, &ch, [0x11; 16], [0x22; 16]);

        assert_eq!(
            field(&form, "userhash"),
            codec::url_safe_pair_hash("admin", &ch.nonce)
        );
        assert_eq!(
            field(&form, "RandomKeyhash"),
            codec::url_safe_pair_hash("cmFuZG9ta2V5", &ch.nonce)
        );
        let pass_hash = codec::pair_hash("admin", "secret");
        assert_eq!(
            field(&form, "response"),
            codec::url_safe_pair_hash(&pass_hash, &ch.nonce)
        );
        assert_eq!(field(&form, "nonce"), "c2FtcGxlbm9uY2U.");
    }

    #[test]
    fn web_login_form_escapes_the_random_padding() {
        let form = web_login_form(&credentials(), &challenge(), [0xff; 16], [0xfb; 16]);
        for name in ["enckey", "enciv"] {
            let value = field(&form, name);
            assert!(!value.contains('+'));
            assert!(!value.contains('/'));
            assert!(!value.contains('='));
            assert!(!value.is_empty());
        }
        // 16 random bytes base64-encode to 24 characters
        assert_eq!(field(&form, "enckey").len(), 24);
    }

    #[test]
    fn session_cookie_header_carries_both_cookies() {
        let session = Session::new("abc123".into(), "def456".into());
        assert_eq!(session.cookie_header(), "sid=abc123; lsid=def456");
    }

    #[test]
    fn challenge_deserializes_gateway_field_names() {
        let ch: LoginChallenge =
            serde_json::from_str(r#"{"nonce":"n-value","randomKey":"rk-value"}"#).unwrap();
        assert_eq!(ch.nonce, "n-value");
        assert_eq!(ch.random_key, "rk-value");
    }

    #[test]
    fn credentials_debug_redacts_the_password() {
        let rendered = format!("{:?}", credentials());
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("secret"));
    }
}
