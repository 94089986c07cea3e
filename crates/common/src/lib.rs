//! Shared types for the user registration service.
//!
//! - [`UserId`]: the opaque identity of a user record
//! - [`ApiResponse`]: the `{data, success, message}` envelope returned by every layer

pub mod response;
pub mod types;

pub use response::ApiResponse;
pub use types::UserId;
