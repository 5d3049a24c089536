use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::configuration::ServiceConfig;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to initialize HTTP client: {0}")]
    ClientInit(#[from] reqwest::Error),

    #[error("Request to {0} failed: {1}")]
    RequestFailed(String, reqwest::Error),

    #[error("Request to {0} failed: HTTP status {1}: {2}")]
    InvalidStatusCode(String, reqwest::StatusCode, String),

    #[error("Unexpected response from {0}: {1}")]
    InvalidBody(String, serde_json::Error),
}

pub(crate) fn build_client(config: &ServiceConfig) -> Result<Client, ServiceError> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .build()?)
}

/// Join a base url and a path without doubling the separator
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Check the status and decode a JSON body
pub(crate) async fn read_json<T: DeserializeOwned>(
    url: &str,
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ServiceError::RequestFailed(url.to_string(), e))?;
    if !status.is_success() {
        return Err(ServiceError::InvalidStatusCode(url.to_string(), status, body));
    }
    serde_json::from_str(&body).map_err(|e| ServiceError::InvalidBody(url.to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("https://api.example", "getFeeParams/2" ; "plain")]
    #[test_case("https://api.example/", "/getFeeParams/2" ; "both slashes")]
    fn endpoint_joins_once(base: &str, path: &str) {
        assert_eq!(endpoint(base, path), "https://api.example/getFeeParams/2");
    }
}
