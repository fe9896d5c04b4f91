use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::lease::LeaseConfig;
use crate::store::StorageConfig;
use crate::transcoder::TranscoderConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub lease: LeaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Host identity configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HostConfig {
    /// Overrides the identity written into lease tags.
    #[serde(default)]
    pub identity: Option<String>,
}

/// Operations listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Sanitized config for logging and API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub host: HostConfig,
    pub lease: LeaseConfig,
    pub storage: SanitizedStorageConfig,
    pub transcoder: TranscoderConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Sanitized storage config (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub region: String,
    pub source_bucket: String,
    pub output_bucket: String,
    pub force_path_style: bool,
    pub credentials_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let storage = &config.storage;
        Self {
            host: config.host.clone(),
            lease: config.lease.clone(),
            storage: SanitizedStorageConfig {
                endpoint: storage.endpoint.clone(),
                region: storage.region.clone(),
                source_bucket: storage.source_bucket.clone(),
                output_bucket: storage.output_bucket.clone(),
                force_path_style: storage.force_path_style,
                credentials_configured: !storage.access_key.is_empty()
                    && !storage.secret_key.is_empty(),
            },
            transcoder: config.transcoder.clone(),
            server: config.server.clone(),
            logging: config.logging.clone(),
        }
    }
}
