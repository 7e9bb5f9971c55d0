//! Identity error types.

use thiserror::Error;

/// Token verification errors
#[derive(Debug, Error)]
pub enum IdentityError {
    /// No bearer token supplied
    #[error("Missing bearer token")]
    MissingToken,

    /// Signature, expiry or audience check failed
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    /// Token decoded but lacks a required claim
    #[error("Missing claim: {0}")]
    MissingClaim(&'static str),

    /// Email claim is not an address
    #[error("Invalid email claim")]
    InvalidEmail,
}

impl IdentityError {
    /// Get a client-safe error message that doesn't describe the token
    pub fn client_message(&self) -> String {
        match self {
            IdentityError::MissingToken => "Unauthorized: No token provided".to_string(),
            _ => "Unauthorized: Invalid token".to_string(),
        }
    }
}

/// Result type for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;
