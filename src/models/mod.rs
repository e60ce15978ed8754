//! Request and Response models for the admin API
//!
//! DTOs serialized to and from HTTP bodies and query strings.

pub mod requests;
pub mod responses;

pub use requests::PageQuery;
pub use responses::{ActionResponse, HealthResponse, StatsResponse};
