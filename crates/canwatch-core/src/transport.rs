//! Shared request plumbing: one place that turns reqwest failures into the
//! crate's typed errors, so transport and HTTP-status failures follow a
//! single policy everywhere.

use serde::de::DeserializeOwned;

use crate::error::{GatewayError, Result};

/// Unwrap a send result, mapping transport failures to
/// [`GatewayError::Unreachable`] and non-2xx answers to
/// [`GatewayError::Status`].
pub(crate) fn check(endpoint: &str, sent: reqwest::Result<reqwest::Response>) -> Result<reqwest::Response> {
    let response = sent.map_err(|source| GatewayError::Unreachable {
        endpoint: endpoint.to_owned(),
        source,
    })?;
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(GatewayError::Status {
            endpoint: endpoint.to_owned(),
            status,
        })
    }
}

/// Decode a response body, mapping decode failures to
/// [`GatewayError::UnexpectedBody`].
pub(crate) async fn json<T: DeserializeOwned>(endpoint: &str, response: reqwest::Response) -> Result<T> {
    response.json().await.map_err(|err| GatewayError::UnexpectedBody {
        endpoint: endpoint.to_owned(),
        detail: err.to_string(),
    })
}
