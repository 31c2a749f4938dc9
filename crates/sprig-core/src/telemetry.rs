// ── Telemetry boundary ──
//
// Best-effort access to device readings. `TelemetrySource` is the raw
// seam (the HTTP client, or a fake in tests). `Telemetry` wraps it so
// every failure degrades to "no reading": it is logged, broadcast on a
// diagnostic channel, and never returned to the sync cycle.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use sprig_api::TelemetryClient;

use crate::error::CoreError;
use crate::model::Sample;

const DIAGNOSTIC_CHANNEL_SIZE: usize = 64;

/// Raw device telemetry. Errors are returned as-is for classification.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<String>, sprig_api::Error>;

    async fn latest_sample(&self, device_id: &str) -> Result<Option<Sample>, sprig_api::Error>;

    /// Up to `limit` samples, newest first.
    async fn recent_samples(
        &self,
        device_id: &str,
        limit: usize,
    ) -> Result<Vec<Sample>, sprig_api::Error>;
}

#[async_trait]
impl TelemetrySource for TelemetryClient {
    async fn list_devices(&self) -> Result<Vec<String>, sprig_api::Error> {
        TelemetryClient::list_devices(self).await
    }

    async fn latest_sample(&self, device_id: &str) -> Result<Option<Sample>, sprig_api::Error> {
        Ok(TelemetryClient::latest_sample(self, device_id)
            .await?
            .map(Sample::from))
    }

    async fn recent_samples(
        &self,
        device_id: &str,
        limit: usize,
    ) -> Result<Vec<Sample>, sprig_api::Error> {
        Ok(TelemetryClient::recent_samples(self, device_id, limit)
            .await?
            .into_iter()
            .map(Sample::from)
            .collect())
    }
}

// ── Diagnostics ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TelemetryOp {
    ListDevices,
    LatestSample,
    RecentSamples,
}

/// A telemetry failure that was degraded to "no data".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryDiagnostic {
    pub operation: TelemetryOp,
    pub device_id: Option<String>,
    pub message: String,
    /// Worth trying again later (timeouts, connection failures, 5xx).
    pub transient: bool,
    pub at: DateTime<Utc>,
}

// ── Telemetry ───────────────────────────────────────────────────────

/// Degrading wrapper around a [`TelemetrySource`].
#[derive(Clone)]
pub struct Telemetry {
    source: Arc<dyn TelemetrySource>,
    diagnostics: broadcast::Sender<TelemetryDiagnostic>,
}

impl Telemetry {
    pub fn new(source: Arc<dyn TelemetrySource>) -> Self {
        let (diagnostics, _) = broadcast::channel(DIAGNOSTIC_CHANNEL_SIZE);
        Self {
            source,
            diagnostics,
        }
    }

    pub fn from_client(client: TelemetryClient) -> Self {
        Self::new(Arc::new(client))
    }

    /// Receive every degraded failure from now on.
    pub fn diagnostics(&self) -> broadcast::Receiver<TelemetryDiagnostic> {
        self.diagnostics.subscribe()
    }

    /// Registered devices, or empty when the service cannot be read.
    pub async fn list_devices(&self) -> Vec<String> {
        match self.source.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                self.report(TelemetryOp::ListDevices, None, &e);
                Vec::new()
            }
        }
    }

    /// Latest reading, or `None` when absent or unreadable.
    pub async fn latest_sample(&self, device_id: &str) -> Option<Sample> {
        match self.source.latest_sample(device_id).await {
            Ok(sample) => {
                if sample.is_none() {
                    debug!(device_id, "device has not reported yet");
                }
                sample
            }
            Err(e) => {
                self.report(TelemetryOp::LatestSample, Some(device_id), &e);
                None
            }
        }
    }

    /// Recent readings newest first, or empty when unreadable.
    pub async fn recent_samples(&self, device_id: &str, limit: usize) -> Vec<Sample> {
        match self.source.recent_samples(device_id, limit).await {
            Ok(samples) => samples,
            Err(e) => {
                self.report(TelemetryOp::RecentSamples, Some(device_id), &e);
                Vec::new()
            }
        }
    }

    /// Device list with the failure surfaced instead of degraded.
    pub async fn try_list_devices(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.source.list_devices().await?)
    }

    fn report(&self, operation: TelemetryOp, device_id: Option<&str>, err: &sprig_api::Error) {
        warn!(%operation, device_id, error = %err, "telemetry unavailable, treating as no data");
        // No receivers is fine.
        let _ = self.diagnostics.send(TelemetryDiagnostic {
            operation,
            device_id: device_id.map(str::to_owned),
            message: err.to_string(),
            transient: err.is_transient(),
            at: Utc::now(),
        });
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry").finish_non_exhaustive()
    }
}
