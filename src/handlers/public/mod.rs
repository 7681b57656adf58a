// handlers/public/mod.rs - Public handlers (no authentication)
//
// Service information and the database health check.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - service information
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "CrewPlan API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "endpoints": {
                "events": "/api/events[/:id[/positions|conflicts|calendar|folder|picklist.xlsx]]",
                "crew": "/api/positions/:id[/assignments], /api/assignments/mine, /api/assignments/:id",
                "calendar": "/api/calendar/sync",
                "warehouse": "/api/warehouse/{items,kits,reservations,availability}",
                "offers": "/api/offers[/:id[/items|recalculate|pdf]]",
                "users": "/api/users[/me|/:id[/modules|/permissions]], /api/modules, /api/permissions",
            }
        }
    }))
}

/// GET /health - 200 when the database answers, 503 otherwise
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}
