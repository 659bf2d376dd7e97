//! Gateway configuration.
//!
//! Values are loaded from environment variables under the `S3_GW_` prefix,
//! falling back to deployment defaults.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Environment variable prefix for all gateway settings.
pub const ENV_PREFIX: &str = "S3_GW";

/// Placement policy applied when neither the request nor the access box
/// supplies one.
pub const DEFAULT_PLACEMENT_POLICY: &str = "REP 3";

/// Gateway configuration.
///
/// # Examples
///
/// ```
/// use silo_s3_core::config::GatewayConfig;
///
/// let config = GatewayConfig::default();
/// assert_eq!(config.listen, "0.0.0.0:8080");
/// assert_eq!(config.default_placement_policy, "REP 3");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Bind address of the S3 listener.
    #[builder(default = String::from("0.0.0.0:8080"))]
    pub listen: String,

    /// Placement policy string used when a bucket is created without a
    /// matching location constraint.
    #[builder(default = String::from(DEFAULT_PLACEMENT_POLICY))]
    pub default_placement_policy: String,

    /// Default copies-number vector; empty means the placement policy
    /// alone decides redundancy.
    #[builder(default)]
    pub copies_number: Vec<u32>,

    /// Domain enabling virtual-hosted-style bucket addressing; empty
    /// means path-style only.
    #[builder(default)]
    pub domain: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: String::from("0.0.0.0:8080"),
            default_placement_policy: String::from(DEFAULT_PLACEMENT_POLICY),
            copies_number: Vec::new(),
            domain: String::new(),
            log_level: String::from("info"),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `S3_GW_LISTEN` | `0.0.0.0:8080` |
    /// | `S3_GW_DEFAULT_POLICY` | `REP 3` |
    /// | `S3_GW_COPIES_NUMBER` | *(empty)* |
    /// | `S3_GW_DOMAIN` | *(empty)* |
    /// | `S3_GW_LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("S3_GW_LISTEN") {
            config.listen = v;
        }
        if let Ok(v) = std::env::var("S3_GW_DEFAULT_POLICY") {
            config.default_placement_policy = v;
        }
        if let Ok(v) = std::env::var("S3_GW_COPIES_NUMBER") {
            if let Some(parsed) = parse_copies_list(&v) {
                config.copies_number = parsed;
            }
        }
        if let Ok(v) = std::env::var("S3_GW_DOMAIN") {
            config.domain = v;
        }
        if let Ok(v) = std::env::var("S3_GW_LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }
}

/// Parse a comma-separated list of copy counts; `None` if any entry is
/// not a positive integer.
fn parse_copies_list(value: &str) -> Option<Vec<u32>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().ok())
        .collect()
}
