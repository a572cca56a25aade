//! Core error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),

    #[error("Cache '{name}' already exists with a different value type")]
    TypeMismatch { name: String },

    #[error("Cache not found: {0}")]
    NotFound(String),

    #[error("Failed to spawn cleanup thread: {0}")]
    Spawn(String),
}
