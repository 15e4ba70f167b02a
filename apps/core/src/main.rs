use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use initium_core::admin::AdminService;
use initium_core::config::Config;
use initium_core::evaluation::EvaluationService;
use initium_core::repos::{InterviewRepository, UserRepository};
use initium_core::session::InterviewService;
use initium_core::store::{select_backend, RecordStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("initium_core={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Initium core v{}", env!("CARGO_PKG_VERSION"));

    // Select the storage backend once; everything downstream holds the
    // same handle for the life of the process.
    let store = select_backend(&config).await;
    let users = UserRepository::new(store.clone());
    let interviews = InterviewRepository::new(store.clone());

    let evaluator = EvaluationService::new(config.anthropic_api_key.as_deref());

    let _sessions = InterviewService::new(users.clone(), interviews.clone(), evaluator);
    let admin = AdminService::new(users, interviews);

    let stats = admin.dashboard_stats().await?;
    info!(
        backend = store.name(),
        candidates = stats.total_candidates,
        interviews = stats.total_interviews,
        avg_score = stats.avg_score,
        "core ready"
    );

    Ok(())
}
