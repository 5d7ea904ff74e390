//! Health endpoint.
//!
//! Fast and side-effect free: reports which vending variants are configured
//! without contacting any remote authority.
use crate::api::types::HealthStatus;
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

pub(crate) async fn system_health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        variants: state.variants(),
    })
}
