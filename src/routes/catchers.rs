//! JSON bodies for errors Rocket raises before a handler runs.

use rocket::Request;

use crate::error::ApiError;

#[catch(400)]
pub fn bad_request(_req: &Request) -> ApiError {
    ApiError::BadRequest("Malformed request".to_string())
}

#[catch(404)]
pub fn not_found(req: &Request) -> ApiError {
    ApiError::NotFound(format!("No route for {} {}", req.method(), req.uri().path()))
}

#[catch(422)]
pub fn unprocessable(_req: &Request) -> ApiError {
    ApiError::BadRequest("Request body is not valid JSON".to_string())
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> ApiError {
    ApiError::InternalError("Internal server error".to_string())
}

pub fn all() -> Vec<rocket::Catcher> {
    catchers![bad_request, not_found, unprocessable, internal_error]
}
