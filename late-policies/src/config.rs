//! Service configuration from command line flags and environment

use clap::{Parser, ValueEnum};

/// Storage backend for late policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// Keep records in process memory (lost on restart)
    Memory,
    /// NATS JetStream key-value bucket
    Jetstream,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "late-policies")]
#[command(about = "Manages late submission penalty policies")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind_addr: String,

    /// Where late policies are stored
    #[arg(long, env = "LATE_POLICY_STORE", value_enum, default_value_t = StoreBackend::Memory)]
    pub store: StoreBackend,

    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// Path to NATS credentials file
    #[arg(long, env = "NATS_CREDS_PATH")]
    pub nats_creds_path: Option<String>,

    /// JetStream KV bucket holding late policies
    #[arg(long, env = "LATE_POLICY_KV_BUCKET", default_value = "late_policies")]
    pub kv_bucket: String,

    /// Shared secret for verifying session tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// HMAC algorithm for session tokens (HS256, HS384, HS512)
    #[arg(long, env = "JWT_ALGORITHM", default_value = "HS256")]
    pub jwt_algorithm: String,

    /// Directory containing the HTML templates
    #[arg(long, env = "TEMPLATES_DIR")]
    pub templates_dir: Option<String>,

    /// Output logs in JSON format
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    pub fn parse_config() -> Self {
        Self::parse()
    }

    /// Glob Tera loads templates from
    pub fn templates_glob(&self) -> String {
        let dir = self
            .templates_dir
            .clone()
            .unwrap_or_else(|| format!("{}/templates", env!("CARGO_MANIFEST_DIR")));
        format!("{}/**/*.html", dir.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_only_the_secret_is_given() {
        let config = Config::try_parse_from(["late-policies", "--jwt-secret", "s3cret"]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.kv_bucket, "late_policies");
        assert_eq!(config.jwt_algorithm, "HS256");
        assert!(!config.log_json);
    }

    #[test]
    fn jetstream_backend_is_selectable() {
        let config = Config::try_parse_from([
            "late-policies",
            "--jwt-secret",
            "s3cret",
            "--store",
            "jetstream",
            "--kv-bucket",
            "policies",
        ])
        .unwrap();
        assert_eq!(config.store, StoreBackend::Jetstream);
        assert_eq!(config.kv_bucket, "policies");
    }

    #[test]
    fn templates_glob_uses_configured_directory() {
        let config = Config::try_parse_from([
            "late-policies",
            "--jwt-secret",
            "s3cret",
            "--templates-dir",
            "/srv/templates/",
        ])
        .unwrap();
        assert_eq!(config.templates_glob(), "/srv/templates/**/*.html");
    }
}
