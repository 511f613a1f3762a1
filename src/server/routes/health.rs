use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Liveness report shared by the index and health routes.
#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    status: &'static str,
    service: &'static str,
    timestamp: String,
}

impl ServiceStatus {
    pub fn healthy() -> Self {
        Self {
            status: "healthy",
            service: env!("CARGO_PKG_NAME"),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

pub async fn health_handler() -> Json<ServiceStatus> {
    Json(ServiceStatus::healthy())
}
