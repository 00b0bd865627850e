use axum::{http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Wedy API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Marketplace listings with subscription plans",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "auth": "/auth/login",
            "tariffs": "/api/tariffs",
            "categories": "/api/categories",
            "payments": "/api/payments"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
