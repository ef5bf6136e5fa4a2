//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacities > 0, gzip level 0-9)
//! - Validate addresses and the mount path
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServerConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("listener.mount_path must start and end with '/', got {0:?}")]
    InvalidMountPath(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("response.gzip_level must be between 0 and 9, got {0}")]
    GzipLevel(u32),

    #[error("observability.log_level {0:?} is not one of trace, debug, info, warn, error")]
    LogLevel(String),
}

/// Check every semantic constraint and report all failures.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    let mount = &config.listener.mount_path;
    if !mount.starts_with('/') || !mount.ends_with('/') {
        errors.push(ValidationError::InvalidMountPath(mount.clone()));
    }

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }
    if config.pool.request_capacity == 0 {
        errors.push(ValidationError::Zero("pool.request_capacity"));
    }
    if config.pool.buffer_capacity == 0 {
        errors.push(ValidationError::Zero("pool.buffer_capacity"));
    }
    if config.timeouts.write_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.write_secs"));
    }
    if config.timeouts.read_header_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.read_header_secs"));
    }

    if config.response.gzip_level > 9 {
        errors.push(ValidationError::GzipLevel(config.response.gzip_level));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
