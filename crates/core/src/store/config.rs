//! Configuration for the S3-compatible store.

use serde::{Deserialize, Serialize};

/// Connection settings shared by the source store and the output sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Endpoint URL (e.g. "http://localhost:9000" for MinIO). Unset uses AWS.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Region name.
    #[serde(default = "default_region")]
    pub region: String,

    /// Access key id.
    #[serde(default)]
    pub access_key: String,

    /// Secret access key.
    #[serde(default)]
    pub secret_key: String,

    /// Bucket holding uploaded source media.
    #[serde(default = "default_source_bucket")]
    pub source_bucket: String,

    /// Bucket receiving encoded output.
    #[serde(default = "default_output_bucket")]
    pub output_bucket: String,

    /// Use path-style addressing (required by MinIO).
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_source_bucket() -> String {
    "mpeg-dash-encoder-source-upload".to_string()
}

fn default_output_bucket() -> String {
    "mpeg-dash-encoder-output".to_string()
}

fn default_force_path_style() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_region(),
            access_key: String::new(),
            secret_key: String::new(),
            source_bucket: default_source_bucket(),
            output_bucket: default_output_bucket(),
            force_path_style: default_force_path_style(),
        }
    }
}
