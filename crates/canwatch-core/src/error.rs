//! Unified error type for gateway operations.
//!
//! Every login, status, and reboot call returns [`GatewayError`] on failure.
//! Transport failures (host unreachable, DNS, connection refused) and HTTP
//! status failures both flow through this type; the library never terminates
//! the process. The caller — in practice the `canwatch` binary — decides what
//! each failure class means for exit behavior.

use thiserror::Error;

/// The unified error type for all gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway could not be reached at all (DNS, connect, or transport
    /// failure before any HTTP status was received).
    #[error("cannot reach gateway at {endpoint}: {source}")]
    Unreachable {
        /// Endpoint path of the failed request.
        endpoint: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The gateway answered with a non-success HTTP status.
    #[error("gateway returned HTTP {status} from {endpoint}")]
    Status {
        /// Endpoint path of the failed request.
        endpoint: String,
        /// The status code the gateway returned.
        status: reqwest::StatusCode,
    },

    /// A login response did not carry an expected session cookie.
    #[error("login response from {endpoint} is missing the '{name}' cookie")]
    MissingCookie {
        /// Endpoint path of the login request.
        endpoint: String,
        /// Name of the missing cookie.
        name: &'static str,
    },

    /// A response body could not be decoded into the expected shape.
    #[error("unexpected response body from {endpoint}: {detail}")]
    UnexpectedBody {
        /// Endpoint path of the request.
        endpoint: String,
        /// What was wrong with the body.
        detail: String,
    },

    /// An endpoint path could not be joined onto the gateway base URL.
    #[error("invalid gateway URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A specialized [`Result`] type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Returns `true` if the gateway could not be reached at all.
    ///
    /// The CLI maps this class to its reserved "cannot reach device" exit
    /// code; every other failure is an ordinary error.
    #[inline]
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// Returns `true` if the gateway was reached but the exchange failed
    /// (bad status, missing cookie, or undecodable body).
    #[inline]
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Status { .. } | Self::MissingCookie { .. } | Self::UnexpectedBody { .. }
        )
    }
}
