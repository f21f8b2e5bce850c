mod file_config;

pub use file_config::{
    AuthConfig, BackgroundJobsConfig, FileConfig, IntervalJobConfig, RevocationConfig, StoreConfig,
};

use crate::auth::RedisRevocationSettings;
use crate::background_jobs::jobs::{purchase_expirer, quiz_auto_submit, session_reaper};
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
const DEFAULT_VERIFICATION_TTL_MINUTES: i64 = 15;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2000;
const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 500;
const DEFAULT_KEY_PREFIX: &str = "revoked:";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;
const MAX_INTERVAL_MINUTES: i64 = 366 * 24 * 60;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub redis_url: Option<String>,
    pub session_secret: Option<String>,
    pub verification_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,

    pub auth: AuthSettings,
    pub revocation: RevocationBackend,
    pub background_jobs: BackgroundJobsSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub session_secret: String,
    pub session_ttl: chrono::Duration,
    pub verification_secret: String,
    pub verification_ttl: chrono::Duration,
}

#[derive(Debug, Clone)]
pub enum RevocationBackend {
    Redis(RedisRevocationSettings),
    /// Process-local markers. Revocations do not survive a restart and are
    /// not shared between instances.
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackgroundJobsSettings {
    pub session_reaper_interval: Duration,
    pub purchase_expirer_interval: Duration,
    pub quiz_auto_submit_interval: Duration,
}

impl Default for BackgroundJobsSettings {
    fn default() -> Self {
        Self {
            session_reaper_interval: session_reaper::DEFAULT_INTERVAL,
            purchase_expirer_interval: purchase_expirer::DEFAULT_INTERVAL,
            quiz_auto_submit_interval: quiz_auto_submit::DEFAULT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub busy_timeout: Duration,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let auth = resolve_auth(cli, file.auth.unwrap_or_default())?;
        let revocation = resolve_revocation(cli, file.revocation.unwrap_or_default())?;

        let jobs_file = file.background_jobs.unwrap_or_default();
        let defaults = BackgroundJobsSettings::default();
        let background_jobs = BackgroundJobsSettings {
            session_reaper_interval: resolve_interval(
                "session_reaper",
                jobs_file.session_reaper.and_then(|j| j.interval_minutes),
                defaults.session_reaper_interval,
            ),
            purchase_expirer_interval: resolve_interval(
                "purchase_expirer",
                jobs_file.purchase_expirer.and_then(|j| j.interval_minutes),
                defaults.purchase_expirer_interval,
            ),
            quiz_auto_submit_interval: resolve_interval(
                "quiz_auto_submit",
                jobs_file.quiz_auto_submit.and_then(|j| j.interval_minutes),
                defaults.quiz_auto_submit_interval,
            ),
        };

        let store = StoreSettings {
            busy_timeout: Duration::from_millis(
                file.store
                    .and_then(|s| s.busy_timeout_ms)
                    .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
            ),
        };

        Ok(Self {
            db_dir,
            port,
            logging_level,
            auth,
            revocation,
            background_jobs,
            store,
        })
    }

    pub fn course_db_path(&self) -> PathBuf {
        self.db_dir.join("course.db")
    }
}

fn resolve_auth(cli: &CliConfig, file: AuthConfig) -> Result<AuthSettings> {
    let session_secret = file
        .session_secret
        .or_else(|| cli.session_secret.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("session_secret must be specified via --session-secret or [auth] in config file")
        })?;
    let verification_secret = file
        .verification_secret
        .or_else(|| cli.verification_secret.clone())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "verification_secret must be specified via --verification-secret or [auth] in config file"
            )
        })?;

    if session_secret.trim().is_empty() {
        bail!("session_secret must not be empty");
    }
    if verification_secret.trim().is_empty() {
        bail!("verification_secret must not be empty");
    }
    if session_secret == verification_secret {
        bail!("session_secret and verification_secret must differ");
    }

    let default_session_ttl = chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS);
    let session_ttl = match file.session_ttl_hours {
        Some(hours) if hours > 0 => match chrono::Duration::try_hours(hours) {
            Some(ttl) => ttl,
            None => {
                warn!(
                    "session_ttl_hours {} is out of range, falling back to {}",
                    hours, DEFAULT_SESSION_TTL_HOURS
                );
                default_session_ttl
            }
        },
        Some(hours) => {
            warn!(
                "Invalid session_ttl_hours {}, falling back to {}",
                hours, DEFAULT_SESSION_TTL_HOURS
            );
            default_session_ttl
        }
        None => default_session_ttl,
    };
    let default_verification_ttl = chrono::Duration::minutes(DEFAULT_VERIFICATION_TTL_MINUTES);
    let verification_ttl = match file.verification_ttl_minutes {
        Some(minutes) if minutes > 0 => match chrono::Duration::try_minutes(minutes) {
            Some(ttl) => ttl,
            None => {
                warn!(
                    "verification_ttl_minutes {} is out of range, falling back to {}",
                    minutes, DEFAULT_VERIFICATION_TTL_MINUTES
                );
                default_verification_ttl
            }
        },
        Some(minutes) => {
            warn!(
                "Invalid verification_ttl_minutes {}, falling back to {}",
                minutes, DEFAULT_VERIFICATION_TTL_MINUTES
            );
            default_verification_ttl
        }
        None => default_verification_ttl,
    };

    Ok(AuthSettings {
        session_secret,
        session_ttl,
        verification_secret,
        verification_ttl,
    })
}

fn resolve_revocation(cli: &CliConfig, file: RevocationConfig) -> Result<RevocationBackend> {
    let redis_url = file.redis_url.or_else(|| cli.redis_url.clone());
    let backend = file
        .backend
        .unwrap_or_else(|| if redis_url.is_some() { "redis" } else { "memory" }.to_string());

    match backend.to_lowercase().as_str() {
        "memory" => Ok(RevocationBackend::InMemory),
        "redis" => {
            let Some(url) = redis_url else {
                bail!("Revocation backend \"redis\" requires redis_url or --redis-url");
            };
            Ok(RevocationBackend::Redis(RedisRevocationSettings {
                url,
                key_prefix: file
                    .key_prefix
                    .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
                connect_timeout: Duration::from_millis(
                    file.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS),
                ),
                response_timeout: Duration::from_millis(
                    file.response_timeout_ms
                        .unwrap_or(DEFAULT_RESPONSE_TIMEOUT_MS),
                ),
            }))
        }
        other => bail!("Unknown revocation backend: {}", other),
    }
}

/// Turns a configured `interval_minutes` into a positive period. Missing
/// values use `default`; zero, negative or out-of-range values log a warning
/// and use it too.
fn resolve_interval(job_id: &str, interval_minutes: Option<i64>, default: Duration) -> Duration {
    match interval_minutes {
        None => default,
        Some(minutes) if (1..=MAX_INTERVAL_MINUTES).contains(&minutes) => {
            Duration::from_secs(minutes as u64 * 60)
        }
        Some(minutes) => {
            warn!(
                "Invalid interval_minutes {} for job {}, falling back to {:?}",
                minutes, job_id, default
            );
            default
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_temp_db_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn cli_with_secrets(db_dir: &TempDir) -> CliConfig {
        CliConfig {
            db_dir: Some(db_dir.path().to_path_buf()),
            session_secret: Some("session-secret".to_string()),
            verification_secret: Some("verification-secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_logging_level() {
        assert!(matches!(
            parse_logging_level("none"),
            Some(RequestsLoggingLevel::None)
        ));
        assert!(matches!(
            parse_logging_level("PATH"),
            Some(RequestsLoggingLevel::Path)
        ));
        assert!(matches!(
            parse_logging_level("headers"),
            Some(RequestsLoggingLevel::Headers)
        ));
        assert!(parse_logging_level("invalid").is_none());
    }

    #[test]
    fn test_resolve_cli_only() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            port: 3001,
            logging_level: RequestsLoggingLevel::Headers,
            ..cli_with_secrets(&temp_dir)
        };

        let config = AppConfig::resolve(&cli, None).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 3001);
        assert_eq!(config.logging_level, RequestsLoggingLevel::Headers);
        assert_eq!(config.auth.session_secret, "session-secret");
        assert_eq!(config.auth.session_ttl, chrono::Duration::hours(24));
        assert_eq!(config.auth.verification_ttl, chrono::Duration::minutes(15));
        assert!(matches!(config.revocation, RevocationBackend::InMemory));
        assert_eq!(config.background_jobs, BackgroundJobsSettings::default());
        assert_eq!(config.store.busy_timeout, Duration::from_millis(5000));
        assert_eq!(config.course_db_path(), temp_dir.path().join("course.db"));
    }

    #[test]
    fn test_resolve_toml_overrides_cli() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/should/be/overridden")),
            port: 3001,
            logging_level: RequestsLoggingLevel::Path,
            redis_url: Some("redis://cli:6379".to_string()),
            ..cli_with_secrets(&temp_dir)
        };

        let file_config = FileConfig {
            db_dir: Some(temp_dir.path().to_string_lossy().to_string()),
            port: Some(4000),
            logging_level: Some("none".to_string()),
            auth: Some(AuthConfig {
                session_secret: Some("from-toml".to_string()),
                session_ttl_hours: Some(2),
                ..Default::default()
            }),
            revocation: Some(RevocationConfig {
                redis_url: Some("redis://toml:6379".to_string()),
                key_prefix: Some("rv:".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();

        assert_eq!(config.db_dir, temp_dir.path());
        assert_eq!(config.port, 4000);
        assert_eq!(config.logging_level, RequestsLoggingLevel::None);
        assert_eq!(config.auth.session_secret, "from-toml");
        assert_eq!(config.auth.session_ttl, chrono::Duration::hours(2));
        // CLI value used when TOML doesn't specify
        assert_eq!(config.auth.verification_secret, "verification-secret");
        match config.revocation {
            RevocationBackend::Redis(settings) => {
                assert_eq!(settings.url, "redis://toml:6379");
                assert_eq!(settings.key_prefix, "rv:");
                assert_eq!(settings.connect_timeout, Duration::from_millis(2000));
                assert_eq!(settings.response_timeout, Duration::from_millis(500));
            }
            other => panic!("expected redis backend, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_missing_db_dir_error() {
        let cli = CliConfig::default();
        let result = AppConfig::resolve(&cli, None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("db_dir must be specified"));
    }

    #[test]
    fn test_resolve_nonexistent_db_dir_error() {
        let cli = CliConfig {
            db_dir: Some(PathBuf::from("/nonexistent/path/that/should/not/exist")),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_resolve_db_dir_not_directory_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        let cli = CliConfig {
            db_dir: Some(temp_file.path().to_path_buf()),
            ..Default::default()
        };
        let result = AppConfig::resolve(&cli, None);
        assert!(result.unwrap_err().to_string().contains("not a directory"));
    }

    #[test]
    fn test_resolve_missing_secret_is_fatal() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            session_secret: None,
            ..cli_with_secrets(&temp_dir)
        };
        let err = AppConfig::resolve(&cli, None).unwrap_err();
        assert!(err.to_string().contains("session_secret must be specified"));
    }

    #[test]
    fn test_resolve_rejects_empty_or_shared_secrets() {
        let temp_dir = make_temp_db_dir();
        let empty = CliConfig {
            verification_secret: Some("   ".to_string()),
            ..cli_with_secrets(&temp_dir)
        };
        assert!(AppConfig::resolve(&empty, None)
            .unwrap_err()
            .to_string()
            .contains("must not be empty"));

        let shared = CliConfig {
            verification_secret: Some("session-secret".to_string()),
            ..cli_with_secrets(&temp_dir)
        };
        assert!(AppConfig::resolve(&shared, None)
            .unwrap_err()
            .to_string()
            .contains("must differ"));
    }

    #[test]
    fn test_invalid_ttls_fall_back_to_defaults() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            auth: Some(AuthConfig {
                session_ttl_hours: Some(0),
                verification_ttl_minutes: Some(-10),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli_with_secrets(&temp_dir), Some(file_config)).unwrap();
        assert_eq!(config.auth.session_ttl, chrono::Duration::hours(24));
        assert_eq!(config.auth.verification_ttl, chrono::Duration::minutes(15));
    }

    #[test]
    fn test_out_of_range_ttls_fall_back_to_defaults() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            auth: Some(AuthConfig {
                session_ttl_hours: Some(i64::MAX),
                verification_ttl_minutes: Some(i64::MAX),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli_with_secrets(&temp_dir), Some(file_config)).unwrap();
        assert_eq!(config.auth.session_ttl, chrono::Duration::hours(24));
        assert_eq!(config.auth.verification_ttl, chrono::Duration::minutes(15));
    }

    #[test]
    fn test_job_intervals_fall_back_on_out_of_range_values() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            background_jobs: Some(BackgroundJobsConfig {
                session_reaper: Some(IntervalJobConfig {
                    interval_minutes: Some(i64::MAX),
                }),
                purchase_expirer: Some(IntervalJobConfig {
                    interval_minutes: Some(MAX_INTERVAL_MINUTES + 1),
                }),
                quiz_auto_submit: Some(IntervalJobConfig {
                    interval_minutes: Some(MAX_INTERVAL_MINUTES),
                }),
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli_with_secrets(&temp_dir), Some(file_config)).unwrap();

        assert_eq!(
            config.background_jobs.session_reaper_interval,
            Duration::from_secs(3600)
        );
        assert_eq!(
            config.background_jobs.purchase_expirer_interval,
            Duration::from_secs(600)
        );
        assert_eq!(
            config.background_jobs.quiz_auto_submit_interval,
            Duration::from_secs(MAX_INTERVAL_MINUTES as u64 * 60)
        );
    }

    #[test]
    fn test_job_intervals_fall_back_on_non_positive_values() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            background_jobs: Some(BackgroundJobsConfig {
                session_reaper: Some(IntervalJobConfig {
                    interval_minutes: Some(0),
                }),
                purchase_expirer: Some(IntervalJobConfig {
                    interval_minutes: Some(-5),
                }),
                quiz_auto_submit: Some(IntervalJobConfig {
                    interval_minutes: Some(2),
                }),
            }),
            ..Default::default()
        };

        let config = AppConfig::resolve(&cli_with_secrets(&temp_dir), Some(file_config)).unwrap();

        assert_eq!(
            config.background_jobs.session_reaper_interval,
            Duration::from_secs(3600)
        );
        assert_eq!(
            config.background_jobs.purchase_expirer_interval,
            Duration::from_secs(600)
        );
        assert_eq!(
            config.background_jobs.quiz_auto_submit_interval,
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_redis_backend_requires_url() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            revocation: Some(RevocationConfig {
                backend: Some("redis".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli_with_secrets(&temp_dir), Some(file_config)).unwrap_err();
        assert!(err.to_string().contains("requires redis_url"));
    }

    #[test]
    fn test_memory_backend_ignores_url() {
        let temp_dir = make_temp_db_dir();
        let cli = CliConfig {
            redis_url: Some("redis://localhost:6379".to_string()),
            ..cli_with_secrets(&temp_dir)
        };
        let file_config = FileConfig {
            revocation: Some(RevocationConfig {
                backend: Some("memory".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli, Some(file_config)).unwrap();
        assert!(matches!(config.revocation, RevocationBackend::InMemory));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let temp_dir = make_temp_db_dir();
        let file_config = FileConfig {
            revocation: Some(RevocationConfig {
                backend: Some("memcached".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(AppConfig::resolve(&cli_with_secrets(&temp_dir), Some(file_config)).is_err());
    }
}
