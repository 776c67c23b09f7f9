//! Database access for the resources served by the API.

pub mod users;
