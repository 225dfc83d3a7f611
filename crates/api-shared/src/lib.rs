//! # API Shared
//!
//! Wire types and helpers shared by the care manager's outer surfaces.
//!
//! Contains:
//! - Request/response DTOs with OpenAPI schemas (`dtos` module)
//! - `HealthService`
//! - API-key validation
//!
//! Used by `api-rest` and the CLI.

pub mod auth;
pub mod dtos;
pub mod health;

pub use auth::{validate_api_key, AuthError, API_KEY_HEADER};
pub use dtos::*;
pub use health::HealthService;
