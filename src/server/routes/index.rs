use super::ServiceStatus;
use axum::Json;

pub async fn index_handler() -> Json<ServiceStatus> {
    Json(ServiceStatus::healthy())
}
