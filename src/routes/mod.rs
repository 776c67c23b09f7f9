//! HTTP route handlers grouped by resource.
//!
//! Handlers are annotated with `#[openapi]` so `rocket_okapi` can derive
//! the OpenAPI document automatically.

pub mod catchers;
pub mod health;
pub mod users;
