use rocket_db_pools::sqlx::{self, PgConnection};
use uuid::Uuid;

use crate::models::User;
use crate::validation::{NewUser, UpdateUser};

const USER_COLUMNS: &str = "id, email, full_name, avatar_url, created_at, updated_at";

pub async fn list(conn: &mut PgConnection) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC, id ASC"
    ))
    .fetch_all(conn)
    .await
}

pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn find_by_email(
    conn: &mut PgConnection,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
        .bind(email)
        .fetch_optional(conn)
        .await
}

pub async fn insert(conn: &mut PgConnection, user: &NewUser) -> Result<User, sqlx::Error> {
    sqlx::query_as(&format!(
        r#"INSERT INTO users (email, full_name, avatar_url)
           VALUES ($1, $2, $3)
           RETURNING {USER_COLUMNS}"#
    ))
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.avatar_url)
    .fetch_one(conn)
    .await
}

/// Apply the provided fields and bump `updated_at`. Absent fields keep
/// their stored value. Returns `None` when no row matches.
pub async fn update(
    conn: &mut PgConnection,
    id: Uuid,
    changes: &UpdateUser,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!(
        r#"UPDATE users
           SET full_name = COALESCE($2, full_name),
               avatar_url = COALESCE($3, avatar_url),
               updated_at = NOW()
           WHERE id = $1
           RETURNING {USER_COLUMNS}"#
    ))
    .bind(id)
    .bind(&changes.full_name)
    .bind(&changes.avatar_url)
    .fetch_optional(conn)
    .await
}

/// Returns whether a row was deleted.
pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
