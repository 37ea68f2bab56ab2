//! Error types for space-usage caching.
//!
//! This module defines [`SpaceCacheError`], the error type shared by the
//! cache, its persistence layer and the settings loader, and a [`Result`]
//! alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Background refresh and persistence failures are logged, never returned
//! - Only configuration problems and the synchronous first probe surface
//!   to callers
//! - Use `anyhow::Error` (via `SpaceCacheError::Other`) at the edges

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for space-usage caching.
#[derive(Debug, Error)]
pub enum SpaceCacheError {
    /// Persistence was requested but no cache file path is configured.
    #[error("No cache file configured for {dir}")]
    CacheFileNotConfigured { dir: String },

    /// The injected space probe failed.
    #[error("Space probe failed for {dir}: {source}")]
    Probe {
        dir: String,
        #[source]
        source: std::io::Error,
    },

    /// Writing or deleting the cache file failed.
    #[error("Failed to persist space usage to {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `init` was called on a cache that has already been initialized.
    #[error("Space usage cache for {dir} is already initialized")]
    AlreadyInitialized { dir: String },

    /// Failed to parse a settings file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid settings values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for space-usage operations.
pub type Result<T> = std::result::Result<T, SpaceCacheError>;
