//! HTTP Server Configuration
//!
//! Listener and CORS settings, plus the per-request stream limits the
//! stream endpoint enforces.

use serde::{Deserialize, Serialize};

use crate::stream::{SchemaPolicy, DEFAULT_BATCH_CAPACITY};

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Host to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins; empty allows any origin
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    Vec::new()
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl HttpServerConfig {
    /// Create a new config with specified port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Bounds applied to every stream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Batch size used when the request does not name one
    pub default_batch_size: usize,
    /// Largest batch size a request may ask for
    pub max_batch_size: usize,
    /// Largest row limit a request may ask for; `None` means unbounded
    pub max_limit: Option<u64>,
    pub schema_policy: SchemaPolicy,
}

/// Default maximum batch size
pub const DEFAULT_MAX_BATCH_SIZE: usize = 65_536;

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            default_batch_size: DEFAULT_BATCH_CAPACITY,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_limit: None,
            schema_policy: SchemaPolicy::default(),
        }
    }
}
