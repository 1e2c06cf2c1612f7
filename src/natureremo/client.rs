/// Nature Remo Cloud API client
use log::debug;
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

use crate::models::DeviceSnapshot;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors returned when fetching the device list
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network, TLS or timeout failure
    #[error("request to Nature Remo API failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The access token was rejected
    #[error("Nature Remo API rejected the access token ({0})")]
    Unauthorized(StatusCode),

    #[error("Nature Remo API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The response body is not a valid device list
    #[error("malformed device list from Nature Remo API: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid Nature Remo API URL: {0}")]
    Url(#[from] url::ParseError),
}

/// HTTP client for the Nature Remo Cloud API
#[derive(Debug, Clone)]
pub struct NatureRemoClient {
    http: reqwest::Client,
    devices_url: Url,
    token: String,
}

impl NatureRemoClient {
    /// Create a client for the API rooted at `api_url`
    ///
    /// # Arguments
    /// * `api_url` - Base URL, e.g. `https://api.nature.global/`
    /// * `token` - Personal access token sent as a bearer credential
    pub fn new(api_url: &Url, token: &str) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            devices_url: devices_url(api_url)?,
            token: token.to_string(),
        })
    }

    /// Fetch the current device list, including each device's newest events
    pub async fn fetch_devices(&self) -> Result<Vec<DeviceSnapshot>, FetchError> {
        let response = self
            .http
            .get(self.devices_url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        log_rate_limit(response.headers());

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(FetchError::Unauthorized(status));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
            return Err(FetchError::Status { status, body });
        }

        let body = response.bytes().await?;
        let devices: Vec<DeviceSnapshot> = serde_json::from_slice(&body)?;
        debug!("Fetched {} devices from {}", devices.len(), self.devices_url);
        Ok(devices)
    }
}

// A base URL without a trailing slash would have its last path segment
// replaced by `join`.
fn devices_url(api_url: &Url) -> Result<Url, url::ParseError> {
    let mut base = api_url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("1/devices")
}

fn log_rate_limit(headers: &HeaderMap) {
    let remaining = headers
        .get("x-rate-limit-remaining")
        .and_then(|v| v.to_str().ok());
    let reset = headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok());

    if let Some(remaining) = remaining {
        debug!(
            "Nature Remo API rate limit: {} requests remaining, resets at {}",
            remaining,
            reset.unwrap_or("unknown")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(server: &mockito::Server) -> NatureRemoClient {
        let url = Url::parse(&server.url()).unwrap();
        NatureRemoClient::new(&url, "test-token").unwrap()
    }

    #[test]
    fn builds_devices_url_with_or_without_trailing_slash() {
        let with = Url::parse("https://api.nature.global/").unwrap();
        let without = Url::parse("http://localhost:8080/proxy").unwrap();
        assert_eq!(
            devices_url(&with).unwrap().as_str(),
            "https://api.nature.global/1/devices"
        );
        assert_eq!(
            devices_url(&without).unwrap().as_str(),
            "http://localhost:8080/proxy/1/devices"
        );
    }

    #[tokio::test]
    async fn fetches_devices_with_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/1/devices")
            .match_header("authorization", "Bearer test-token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("x-rate-limit-remaining", "29")
            .with_body(
                r#"[{"id":"dev-1","name":"Hallway","firmware_version":"Remo/1.0",
                    "mac_address":"aa","bt_mac_address":"bb","serial_number":"sn",
                    "newest_events":{"te":{"val":22.1,"created_at":"2024-05-01T10:00:00Z"}}}]"#,
            )
            .create_async()
            .await;

        let devices = client_for(&server).fetch_devices().await.unwrap();
        mock.assert_async().await;

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Hallway");
    }

    #[tokio::test]
    async fn classifies_rejected_token() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/1/devices")
            .with_status(401)
            .with_body(r#"{"code":401001,"message":"Unauthorized"}"#)
            .create_async()
            .await;

        let err = client_for(&server).fetch_devices().await.unwrap_err();
        assert!(matches!(err, FetchError::Unauthorized(s) if s == StatusCode::UNAUTHORIZED));
    }

    #[tokio::test]
    async fn classifies_server_errors_and_malformed_bodies() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/1/devices")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let err = client_for(&server).fetch_devices().await.unwrap_err();
        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other}"),
        }

        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/1/devices")
            .with_status(200)
            .with_body(r#"{"not":"a list"}"#)
            .create_async()
            .await;

        let err = client_for(&server).fetch_devices().await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }
}
