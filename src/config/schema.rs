//! Configuration schema definitions.
//!
//! All sections have defaults, so an empty file (or no file at all) yields a
//! runnable server.

use serde::{Deserialize, Serialize};

/// Root configuration for the API server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, mount point).
    pub listener: ListenerConfig,

    /// Transport timeouts.
    pub timeouts: TimeoutConfig,

    /// Object pool sizing.
    pub pool: PoolConfig,

    /// Response encoding.
    pub response: ResponseConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Path prefix the endpoint is mounted at. Must start and end with `/`.
    pub mount_path: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            mount_path: "/api/".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed to receive the request head, in seconds.
    pub read_header_secs: u64,

    /// Time allowed to produce the response, in seconds.
    pub write_secs: u64,

    /// How long in-flight requests may drain on shutdown. 0 waits indefinitely.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_header_secs: 5,
            write_secs: 30,
            shutdown_grace_secs: 30,
        }
    }
}

/// Object pool sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum idle request objects kept.
    pub request_capacity: usize,

    /// Maximum idle byte buffers kept.
    pub buffer_capacity: usize,

    /// Buffers that grew beyond this many bytes are not returned to the pool.
    pub max_retained_buffer_bytes: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            request_capacity: 1024,
            buffer_capacity: 1024,
            max_retained_buffer_bytes: 1024 * 1024, // 1MB
        }
    }
}

/// Response encoding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// gzip level, 0-9.
    pub gzip_level: u32,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self { gzip_level: 6 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
