use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{config::StoreBackend, state::AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub time_zone: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = match state.config.store_backend {
        StoreBackend::Postgres => "postgres",
        StoreBackend::Memory => "memory",
    };
    Json(HealthResponse {
        status: "ok",
        store,
        time_zone: state.config.time_zone.to_string(),
    })
}
