// Telemetry service HTTP client
//
// Wraps `reqwest::Client` with owner-scoped URL construction and strict
// status handling. Endpoint methods live in `samples.rs` to keep this
// module focused on transport mechanics.

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Read-only HTTP client for the telemetry service.
///
/// Every path is scoped to a fixed owner identity. There is no per-user
/// authentication; the owner is plain configuration.
#[derive(Clone)]
pub struct TelemetryClient {
    http: reqwest::Client,
    base_url: Url,
    owner: String,
    timeout_secs: u64,
}

impl TelemetryClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the service root (e.g. `http://vm.drcvault.dev/`).
    pub fn new(base_url: Url, owner: String, transport: &TransportConfig) -> Result<Self, Error> {
        check_base(&base_url)?;
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            owner,
            timeout_secs: transport.timeout.as_secs(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, owner: String) -> Result<Self, Error> {
        check_base(&base_url)?;
        Ok(Self {
            http,
            base_url,
            owner,
            timeout_secs: TransportConfig::default().timeout.as_secs(),
        })
    }

    /// Parse `base_url` and wrap an existing `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, owner: &str, http: reqwest::Client) -> Result<Self, Error> {
        Self::with_client(http, Url::parse(base_url)?, owner.to_owned())
    }

    /// The owner identity every request is scoped to.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/{segments...}` with every segment percent-encoded.
    pub(crate) fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| Error::UnusableBaseUrl(self.base_url.to_string()))?;
            path.pop_if_empty();
            path.extend(segments);
        }
        Ok(url)
    }

    /// `{base}/logs/{owner}/{device}`
    pub(crate) fn logs_url(&self, device_id: &str) -> Result<Url, Error> {
        self.url(&["logs", &self.owner, device_id])
    }

    /// `{base}/iot/{owner}`
    pub(crate) fn devices_url(&self) -> Result<Url, Error> {
        self.url(&["iot", &self.owner])
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                Error::Transport(e)
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

fn check_base(url: &Url) -> Result<(), Error> {
    if url.cannot_be_a_base() {
        return Err(Error::UnusableBaseUrl(url.to_string()));
    }
    Ok(())
}

impl std::fmt::Debug for TelemetryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryClient")
            .field("base_url", &self.base_url.as_str())
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
