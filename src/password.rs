//! Salted bcrypt hashing of user passwords.
//!
//! Hashes are self-describing (`$2b$<cost>$<salt><digest>`) so verification
//! needs nothing but the stored string.

use crate::error::AppError;

/// bcrypt only reads this many bytes; anything longer would be truncated.
pub const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, AppError> {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::Validation(format!(
                "Password must be at most {MAX_PASSWORD_BYTES} bytes"
            )));
        }
        bcrypt::hash(plaintext, self.cost).map_err(|e| AppError::Internal(e.to_string()))
    }

    /// Returns false for a wrong password and for a malformed hash alike.
    /// Passwords too long to have been hashed never match.
    pub fn verify(&self, plaintext: &str, hash: &str) -> bool {
        if plaintext.len() > MAX_PASSWORD_BYTES {
            return false;
        }
        bcrypt::verify(plaintext, hash).unwrap_or(false)
    }

    /// Runs `hash` on the blocking pool so request tasks keep making progress.
    pub async fn hash_async(self, plaintext: String) -> Result<String, AppError> {
        tokio::task::spawn_blocking(move || self.hash(&plaintext))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?
    }

    pub async fn verify_async(self, plaintext: String, hash: String) -> Result<bool, AppError> {
        tokio::task::spawn_blocking(move || self.verify(&plaintext, &hash))
            .await
            .map_err(|e| AppError::Internal(e.to_string()))
    }
}
