//! Gateway configuration

use serde::{Deserialize, Serialize};

/// Local gateway configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on; 0 picks a free port
    pub port: u16,
    /// Access key requests must be signed with
    pub access_key: String,
    /// Secret key requests must be signed with
    pub secret_key: String,
    /// Signing region
    pub region: String,
    /// Verify SigV4 signatures
    pub auth_enabled: bool,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Smallest accepted size for every multipart part but the last (bytes)
    pub min_part_size: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            region: s3lite_client::DEFAULT_REGION.to_string(),
            auth_enabled: true,
            max_body_size: 64 * 1024 * 1024,
            min_part_size: s3lite_client::MIN_PART_SIZE,
        }
    }
}

impl GatewayConfig {
    /// Config for tests: ephemeral port on the loopback interface
    pub fn ephemeral() -> Self {
        Self {
            port: 0,
            ..Default::default()
        }
    }

    /// Set the key pair
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = access_key.into();
        self.secret_key = secret_key.into();
        self
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
