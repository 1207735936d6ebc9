use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub db_ok: bool,
    pub db_error: Option<String>,
    pub active_sessions: usize,
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    responses((status = 200, description = "Liveness and database check", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_check = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&state.pool).await;
    let active_sessions = state.sessions.count().await;

    let (db_ok, db_error) = match db_check {
        Ok(_) => (true, None),
        Err(e) => {
            tracing::warn!("health check database query failed: {}", e);
            (false, Some(e.to_string()))
        }
    };

    Json(HealthResponse {
        status: "ok",
        db_ok,
        db_error,
        active_sessions,
    })
}
