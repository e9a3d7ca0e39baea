use serde::{Deserialize, Serialize};

use crate::{error::AppError, password::MAX_PASSWORD_BYTES};

// Request body for both /register and /login
#[derive(Debug, Deserialize)]
pub struct CredentialsSchema {
    pub username: String,
    pub password: String,
}

impl CredentialsSchema {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::Validation(
                "Username and password are required".to_string(),
            ));
        }
        if self.password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::Validation(format!(
                "Password must be at most {MAX_PASSWORD_BYTES} bytes"
            )));
        }
        Ok(())
    }
}

// Struct representing the request body for creating a new Todo
#[derive(Debug, Deserialize)]
pub struct CreateTodoSchema {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

// Struct representing the request body for updating a Todo
#[derive(Debug, Deserialize)]
pub struct UpdateTodoSchema {
    pub title: String,
    pub completed: bool,
}

pub fn validate_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title must not be empty".to_string()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetailResponse {
    pub detail: &'static str,
}
