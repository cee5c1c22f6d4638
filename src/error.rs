//! # Error Types
//!
//! Custom error types for Blackbox using `thiserror`.
//!
//! `QueueFull` and `QueueEmpty` are deliberately *not* variants here: they
//! are expected control signals of the bounded queue, not failures, and
//! live in [`crate::queue`].

use thiserror::Error;

/// Main error type for Blackbox
#[derive(Debug, Error)]
pub enum BlackboxError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Blackbox
pub type Result<T> = std::result::Result<T, BlackboxError>;
