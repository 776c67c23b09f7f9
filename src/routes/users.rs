//! CRUD endpoints for the `users` resource.
//!
//! A single path addressed by an `id` query parameter, mirroring how the
//! frontend calls it.

use rocket::serde::json::Json;
use rocket_db_pools::Connection;
use rocket_okapi::openapi;
use serde_json::Value;
use uuid::Uuid;

use crate::db::UsersDb;
use crate::error::ApiError;
use crate::models::{MessageResponse, UserResponse, UsersQueryResponse, UsersResponse};
use crate::store::users;
use crate::validation::{NewUser, UpdateUser};

const USER_NOT_FOUND: &str = "User not found";
const DUPLICATE_EMAIL: &str = "User with this email already exists";

fn parse_user_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id.trim()).map_err(|_| ApiError::BadRequest(format!("Invalid user ID '{}'", id)))
}

fn required_id(id: Option<&str>, missing: &str) -> Result<Uuid, ApiError> {
    match id {
        Some(id) if !id.trim().is_empty() => parse_user_id(id),
        _ => Err(ApiError::BadRequest(missing.to_string())),
    }
}

/// List users ordered by creation time, or fetch one when `id` is given.
#[openapi(tag = "Users")]
#[get("/users?<id>")]
pub async fn get_users(
    id: Option<&str>,
    mut db: Connection<UsersDb>,
) -> Result<Json<UsersQueryResponse>, ApiError> {
    let Some(id) = id.filter(|id| !id.trim().is_empty()) else {
        let users = users::list(&mut **db).await?;
        return Ok(Json(UsersQueryResponse::Many(UsersResponse { users })));
    };

    let id = parse_user_id(id)?;
    let user = users::find_by_id(&mut **db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))?;
    Ok(Json(UsersQueryResponse::One(UserResponse { user })))
}

/// Create a user. Emails are unique.
#[openapi(tag = "Users")]
#[post("/users", data = "<body>")]
pub async fn create_user(
    body: Json<Value>,
    mut db: Connection<UsersDb>,
) -> Result<Json<UserResponse>, ApiError> {
    let new_user = NewUser::parse(&body)?;

    if users::find_by_email(&mut **db, &new_user.email).await?.is_some() {
        return Err(ApiError::Conflict(DUPLICATE_EMAIL.to_string()));
    }

    // The unique index still guards against a concurrent insert.
    let user = users::insert(&mut **db, &new_user)
        .await
        .map_err(|err| match ApiError::from(err) {
            ApiError::Conflict(_) => ApiError::Conflict(DUPLICATE_EMAIL.to_string()),
            other => other,
        })?;

    log::info!("created user {}", user.id);
    Ok(Json(UserResponse { user }))
}

/// Update a user's profile fields.
#[openapi(tag = "Users")]
#[put("/users?<id>", data = "<body>")]
pub async fn update_user(
    id: Option<&str>,
    body: Json<Value>,
    mut db: Connection<UsersDb>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = required_id(id, "User ID is required for updates")?;
    let changes = UpdateUser::parse(&body)?;

    let user = users::update(&mut **db, id, &changes)
        .await?
        .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))?;
    Ok(Json(UserResponse { user }))
}

/// Delete a user.
#[openapi(tag = "Users")]
#[delete("/users?<id>")]
pub async fn delete_user(
    id: Option<&str>,
    mut db: Connection<UsersDb>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = required_id(id, "User ID is required for deletion")?;

    if !users::delete(&mut **db, id).await? {
        return Err(ApiError::NotFound(USER_NOT_FOUND.to_string()));
    }

    log::info!("deleted user {}", id);
    Ok(Json(MessageResponse {
        message: "User deleted successfully".to_string(),
    }))
}

#[openapi(skip)]
#[patch("/users")]
pub fn patch_users() -> ApiError {
    ApiError::MethodNotAllowed("PATCH".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_be_uuids() {
        assert!(parse_user_id("6f1c1f3e-8d4e-4a55-9d3c-0e6b8f1b2a7c").is_ok());
        assert!(matches!(parse_user_id("42"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn missing_ids_use_operation_message() {
        match required_id(None, "User ID is required for deletion") {
            Err(ApiError::BadRequest(msg)) => assert_eq!(msg, "User ID is required for deletion"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            required_id(Some("  "), "missing"),
            Err(ApiError::BadRequest(msg)) if msg == "missing"
        ));
    }
}
