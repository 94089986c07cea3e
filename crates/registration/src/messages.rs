//! User-facing messages carried in result envelopes.

pub const USER_NOT_FOUND: &str = "User not found.";
pub const REGISTER_ERROR: &str = "Error registering user.";
pub const USER_RETRIEVED: &str = "User retrieved successfully.";
pub const USERS_RETRIEVED: &str = "Users retrieved successfully.";
pub const NO_USERS_FOUND: &str = "No users found.";
