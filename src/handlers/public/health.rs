use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::DatabaseManager;
use crate::is_production;

/// GET / - service name, version and route map
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Lifestyle API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Shared notes, calendar, lists, recipes, pets, routines and photos for partners and groups",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "profile": "/api/profile, /api/profile/tiles[/:tile] (protected)",
                "partners": "/api/partners[/:id], /api/partners/lookup (protected)",
                "groups": "/api/groups[/:id[/members[/:user_id]]] (protected)",
                "topics": "/api/topics[/:id] (protected)",
                "notes": "/api/notes[/:id] (protected)",
                "todos": "/api/todos[/:id] (protected)",
                "shopping": "/api/shopping[/:id], /api/shopping/checked (protected)",
                "events": "/api/events[/:id] (protected)",
                "recipes": "/api/recipes[/:id], /api/recipes/matches, /api/pantry[/:ingredient] (protected)",
                "dogs": "/api/dogs[/:id[/meals[/toggle]]] (protected)",
                "routines": "/api/routines[/:id[/progress|/toggle]], /api/routines/today (protected)",
                "photos": "/api/photos[/:id], /api/photo-slots[/:slot] (protected)",
                "push": "/api/push/devices[/:player_id], /api/config/push, /functions/send-push (protected)",
            }
        }
    }))
}

/// GET /health - liveness plus database reachability
pub async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(_) => (
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
            let detail = if is_production!() {
                "unavailable".to_string()
            } else {
                e.to_string()
            };
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database_error": detail
                    }
                })),
            )
        }
    }
}
