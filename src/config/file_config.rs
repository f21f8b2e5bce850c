use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,

    // Feature configs
    pub auth: Option<AuthConfig>,
    pub revocation: Option<RevocationConfig>,
    pub background_jobs: Option<BackgroundJobsConfig>,
    pub store: Option<StoreConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub session_secret: Option<String>,
    pub session_ttl_hours: Option<i64>,
    pub verification_secret: Option<String>,
    pub verification_ttl_minutes: Option<i64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RevocationConfig {
    /// "redis" or "memory"
    pub backend: Option<String>,
    pub redis_url: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub response_timeout_ms: Option<u64>,
    pub key_prefix: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BackgroundJobsConfig {
    pub session_reaper: Option<IntervalJobConfig>,
    pub purchase_expirer: Option<IntervalJobConfig>,
    pub quiz_auto_submit: Option<IntervalJobConfig>,
}

/// Signed so that a misconfigured negative value parses and can be replaced
/// by the default instead of failing the whole file.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct IntervalJobConfig {
    pub interval_minutes: Option<i64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub busy_timeout_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_full_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
port = 4000
logging_level = "headers"

[auth]
session_secret = "s3cret"
session_ttl_hours = 12

[revocation]
backend = "redis"
redis_url = "redis://cache:6379"
response_timeout_ms = 250

[background_jobs.purchase_expirer]
interval_minutes = -3

[store]
busy_timeout_ms = 1000
"#,
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.port, Some(4000));
        let auth = config.auth.unwrap();
        assert_eq!(auth.session_secret.as_deref(), Some("s3cret"));
        assert_eq!(auth.session_ttl_hours, Some(12));
        assert!(auth.verification_secret.is_none());
        let revocation = config.revocation.unwrap();
        assert_eq!(revocation.redis_url.as_deref(), Some("redis://cache:6379"));
        assert_eq!(revocation.response_timeout_ms, Some(250));
        let jobs = config.background_jobs.unwrap();
        assert_eq!(jobs.purchase_expirer.unwrap().interval_minutes, Some(-3));
        assert!(jobs.session_reaper.is_none());
        assert_eq!(config.store.unwrap().busy_timeout_ms, Some(1000));
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "port = \"not a number\"").unwrap();
        let err = FileConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
