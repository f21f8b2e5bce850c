use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use course_server::auth::{
    CredentialCodec, CredentialCodecs, InMemoryRevocationStore, RedisRevocationStore,
    RevocationStore,
};
use course_server::background_jobs::{
    create_scheduler,
    jobs::{PurchaseExpirerJob, QuizAutoSubmitJob, SessionReaperJob},
    JobContext,
};
use course_server::config::{AppConfig, CliConfig, FileConfig, RevocationBackend};
use course_server::course_store::{CourseStore, SqliteCourseStore};
use course_server::server::{run_server, state::ServerState, RequestsLoggingLevel, ServerConfig};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the course database.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Redis URL for the shared revocation list. Without it revocations are
    /// kept in process memory.
    #[clap(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Secret for session credentials.
    #[clap(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,

    /// Secret for verification credentials. Must differ from the session secret.
    #[clap(long, env = "VERIFICATION_SECRET", hide_env_values = true)]
    pub verification_secret: Option<String>,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            db_dir: args.db_dir.clone(),
            port: args.port,
            logging_level: args.logging_level.clone(),
            redis_url: args.redis_url.clone(),
            session_secret: args.session_secret.clone(),
            verification_secret: args.verification_secret.clone(),
        }
    }
}

async fn build_revocation_store(backend: &RevocationBackend) -> Result<Arc<dyn RevocationStore>> {
    match backend {
        RevocationBackend::Redis(settings) => {
            info!("Connecting to revocation list at {}...", settings.url);
            let store = RedisRevocationStore::connect(settings)
                .await
                .context("Revocation list is unreachable")?;
            Ok(Arc::new(store))
        }
        RevocationBackend::InMemory => {
            warn!("Using in-memory revocation list, revocations will not survive a restart");
            Ok(Arc::new(InMemoryRevocationStore::new()))
        }
    }
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    let db_path = app_config.course_db_path();
    info!("Opening SQLite course database at {:?}...", db_path);
    let course_store: Arc<dyn CourseStore> = Arc::new(SqliteCourseStore::new(
        &db_path,
        app_config.store.busy_timeout,
    )?);

    let revocations = build_revocation_store(&app_config.revocation).await?;

    let codecs = CredentialCodecs {
        session: Arc::new(CredentialCodec::new(
            &app_config.auth.session_secret,
            app_config.auth.session_ttl,
        )?),
        verification: Arc::new(CredentialCodec::new(
            &app_config.auth.verification_secret,
            app_config.auth.verification_ttl,
        )?),
    };
    info!(
        "Session credentials live {}h, verification credentials {}m",
        codecs.session.ttl().num_hours(),
        codecs.verification.ttl().num_minutes()
    );

    let shutdown_token = CancellationToken::new();
    let job_context = JobContext::new(shutdown_token.child_token(), course_store.clone());
    let (mut scheduler, scheduler_handle) = create_scheduler(shutdown_token.clone(), job_context);

    let jobs_settings = &app_config.background_jobs;
    scheduler
        .register_job(Arc::new(SessionReaperJob::new(
            jobs_settings.session_reaper_interval,
        )))
        .await;
    scheduler
        .register_job(Arc::new(PurchaseExpirerJob::new(
            jobs_settings.purchase_expirer_interval,
        )))
        .await;
    scheduler
        .register_job(Arc::new(QuizAutoSubmitJob::new(
            jobs_settings.quiz_auto_submit_interval,
        )))
        .await;
    info!("Registered {} background jobs", scheduler.job_count().await);

    let server_state = ServerState::new(
        ServerConfig::from(&app_config),
        course_store,
        codecs.session,
        revocations,
        Some(scheduler_handle),
    );

    let scheduler_task = tokio::spawn(async move { scheduler.run().await });

    info!("Ready to serve at port {}!", app_config.port);
    let result = tokio::select! {
        result = run_server(server_state) => result,
        _ = wait_for_ctrl_c() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    shutdown_token.cancel();
    if let Err(e) = scheduler_task.await {
        error!("Background job scheduler panicked: {}", e);
    }
    result
}
