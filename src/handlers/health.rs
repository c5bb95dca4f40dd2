//! Liveness and readiness probes.

use axum::{extract::State, http::StatusCode, Json};
use diesel::prelude::*;
use serde::Serialize;
use std::time::Instant;
use utoipa::ToSchema;

use crate::AppState;

pub const SERVICE_NAME: &str = "colabora";

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: &'static str,
    #[schema(example = "colabora")]
    pub service: &'static str,
    #[schema(example = "0.1.0")]
    pub version: &'static str,
    #[schema(example = "2024-06-01T10:30:00Z")]
    pub timestamp: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    #[schema(example = "ready")]
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessChecks {
    pub database: ComponentStatus,
    /// Informational only. A disabled mail relay never fails readiness.
    pub mail: ComponentStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ComponentStatus {
    #[schema(example = "up")]
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = 5)]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentStatus {
    pub fn up(latency_ms: Option<u64>) -> Self {
        Self {
            status: "up",
            latency_ms,
            error: None,
        }
    }

    pub fn down(error: impl Into<String>) -> Self {
        Self {
            status: "down",
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            status: "disabled",
            latency_ms: None,
            error: None,
        }
    }

    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

#[utoipa::path(
    get,
    path = "/health/status",
    tag = "Health",
    responses(
        (status = 200, description = "Service metadata", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Plain text health check", content_type = "text/plain")
    )
)]
pub async fn health_check_simple() -> &'static str {
    "OK"
}

#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Database reachable", body = ReadinessResponse),
        (status = 503, description = "Database unreachable", body = ReadinessResponse)
    )
)]
pub async fn ready_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let database = match check_database(&state) {
        Ok(latency_ms) => ComponentStatus::up(Some(latency_ms)),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            ComponentStatus::down(e)
        }
    };
    let mail = if state.mailer.is_enabled() {
        ComponentStatus::up(None)
    } else {
        ComponentStatus::disabled()
    };

    let ready = database.is_up();
    let response = ReadinessResponse {
        status: if ready { "ready" } else { "not_ready" },
        checks: ReadinessChecks { database, mail },
    };

    if ready {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

fn check_database(state: &AppState) -> Result<u64, String> {
    let start = Instant::now();

    let mut conn = state
        .db_pool
        .get()
        .map_err(|e| format!("Failed to get connection: {}", e))?;

    diesel::sql_query("SELECT 1")
        .execute(&mut conn)
        .map_err(|e| format!("Query failed: {}", e))?;

    Ok(start.elapsed().as_millis() as u64)
}

#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive")
    )
)]
pub async fn live_check() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_statuses() {
        let up = ComponentStatus::up(Some(10));
        assert!(up.is_up());
        assert_eq!(up.latency_ms, Some(10));

        let down = ComponentStatus::down("Connection refused");
        assert!(!down.is_up());
        assert_eq!(down.error.as_deref(), Some("Connection refused"));

        let value = serde_json::to_value(ComponentStatus::disabled()).unwrap();
        assert_eq!(value, serde_json::json!({"status": "disabled"}));
    }

    #[tokio::test]
    async fn test_health_check_reports_service() {
        let response = health_check().await;
        assert_eq!(response.status, "healthy");
        assert_eq!(response.service, SERVICE_NAME);
    }

    #[tokio::test]
    async fn test_health_check_simple() {
        assert_eq!(health_check_simple().await, "OK");
    }
}
