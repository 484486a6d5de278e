use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidateEmail};

use crate::services::ServiceError;

pub const USER_NOT_FOUND: &str = "User not found";
pub const EMAIL_TAKEN: &str = "Email already exists";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(
        required(message = "Email and full_name are required"),
        length(min = 1, message = "Email and full_name are required"),
        email(message = "Invalid email format")
    )]
    pub email: Option<String>,
    #[validate(
        required(message = "Email and full_name are required"),
        length(min = 1, message = "Email and full_name are required")
    )]
    pub full_name: Option<String>,
}

/// Validated insert
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
}

impl CreateUser {
    pub fn into_new(self) -> NewUser {
        NewUser {
            email: self.email.unwrap_or_default(),
            full_name: self.full_name.unwrap_or_default(),
        }
    }
}

/// Partial update; empty strings leave the field unchanged
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

impl UpdateUser {
    pub fn normalized(self) -> Result<UserChanges, ServiceError> {
        let email = self.email.filter(|s| !s.is_empty());
        if email.as_ref().is_some_and(|e| !e.validate_email()) {
            return Err(ServiceError::Validation("Invalid email format".to_string()));
        }
        Ok(UserChanges {
            email,
            full_name: self.full_name.filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserDeleted {
    pub message: &'static str,
    #[serde(rename = "deletedUser")]
    pub deleted_user: User,
}
