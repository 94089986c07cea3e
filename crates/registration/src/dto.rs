//! Request and response shapes, with explicit mappings to [`User`].

use common::UserId;
use serde::{Deserialize, Serialize};
use user_store::User;

/// Registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertUserDto {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl InsertUserDto {
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Builds a new record with a freshly generated ID.
    pub fn into_user(self) -> User {
        User {
            id: UserId::new(),
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
        }
    }
}

/// Full replacement of an existing user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserDto {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<UpdateUserDto> for User {
    fn from(dto: UpdateUserDto) -> Self {
        User {
            id: dto.id,
            email: dto.email,
            first_name: dto.first_name,
            last_name: dto.last_name,
        }
    }
}

/// Outward view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: UserId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        UserDto {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        UserDto::from(user.clone())
    }
}
