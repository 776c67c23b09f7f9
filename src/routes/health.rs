//! Liveness and readiness endpoints.

use rocket::serde::json::Json;
use rocket_db_pools::Connection;
use rocket_db_pools::sqlx;
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

use crate::db::UsersDb;
use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Process is up. Does not touch the database.
#[openapi(tag = "Health")]
#[get("/health")]
pub fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Database is reachable.
#[openapi(tag = "Health")]
#[get("/health/ready")]
pub async fn readiness(mut db: Connection<UsersDb>) -> Result<Json<HealthResponse>, ApiError> {
    sqlx::query("SELECT 1").execute(&mut **db).await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
    }))
}
