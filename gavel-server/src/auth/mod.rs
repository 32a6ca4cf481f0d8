//! Credential handling: password hashing and bearer tokens.

pub mod jwt;
pub mod password;

use std::fmt;

/// Errors from the credential layer.
#[derive(Debug)]
pub enum AuthError {
    /// Password hashing or hash parsing failed.
    Hashing(String),
    /// A token could not be issued.
    TokenIssue(String),
    /// A presented token failed verification.
    TokenInvalid(String),
    /// The signing secret is unusable.
    Config(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hashing(msg) => write!(f, "password hashing error: {msg}"),
            Self::TokenIssue(msg) => write!(f, "token issue error: {msg}"),
            Self::TokenInvalid(msg) => write!(f, "invalid token: {msg}"),
            Self::Config(msg) => write!(f, "auth configuration error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}
