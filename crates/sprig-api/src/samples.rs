// Telemetry endpoints
//
// Device discovery (`iot/`) and sensor logs (`logs/`). All calls are
// read-only GETs scoped to the client's owner identity.

use tracing::debug;

use crate::client::TelemetryClient;
use crate::error::Error;
use crate::models::SampleRecord;

impl TelemetryClient {
    /// List the device ids registered to the owner.
    ///
    /// `GET /iot/{owner}`
    pub async fn list_devices(&self) -> Result<Vec<String>, Error> {
        let url = self.devices_url()?;
        debug!(owner = self.owner(), "listing devices");
        self.get(url).await
    }

    /// Fetch the most recent sample for a device, if it has ever reported.
    ///
    /// `GET /logs/{owner}/{device}?latest=true` returns an array; the first
    /// element is the latest reading.
    pub async fn latest_sample(&self, device_id: &str) -> Result<Option<SampleRecord>, Error> {
        let mut url = self.logs_url(device_id)?;
        url.query_pairs_mut().append_pair("latest", "true");
        let records: Vec<SampleRecord> = self.get(url).await?;
        Ok(records.into_iter().next())
    }

    /// Fetch up to `limit` recent samples, newest first.
    ///
    /// `GET /logs/{owner}/{device}?page_size={limit}`. The service does not
    /// promise an order, so results are sorted locally.
    pub async fn recent_samples(
        &self,
        device_id: &str,
        limit: usize,
    ) -> Result<Vec<SampleRecord>, Error> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut url = self.logs_url(device_id)?;
        url.query_pairs_mut()
            .append_pair("page_size", &limit.to_string());
        debug!(device_id, limit, "fetching recent samples");

        let mut records: Vec<SampleRecord> = self.get(url).await?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }
}
