//! Dashboard counters and the seven-day reservation series.

use std::sync::Arc;

use parqueo_core::{StatsSeries, StatsSummary};

use crate::error::Result;
use crate::transport::{ApiRequest, Transport};

pub struct StatsClient {
    transport: Arc<dyn Transport>,
}

impl StatsClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Record counts per resource.
    pub async fn summary(&self) -> Result<StatsSummary> {
        let body = self.transport.send(ApiRequest::get("/api/stats/")).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Reservations per day over the last seven days, oldest first.
    pub async fn reservations_last_week(&self) -> Result<StatsSeries> {
        let body = self
            .transport
            .send(ApiRequest::get("/api/stats/reservas7d/"))
            .await?;
        let mut series: StatsSeries = serde_json::from_value(body)?;
        series.series.sort_by_key(|p| p.date);
        Ok(series)
    }
}
