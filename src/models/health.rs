use serde::Serialize;
use chrono::{DateTime, Utc};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String, // "ok" | "degraded" (base injoignable)
    pub timestamp: DateTime<Utc>,
}
