use rocket_db_pools::{sqlx, Database};

#[derive(Database)]
#[database("users_db")]
pub struct UsersDb(sqlx::PgPool);
