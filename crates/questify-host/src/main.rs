//! Questify demo entry point.
//!
//! Plays a scripted session log against a catalog and prints one JSON line
//! per step to stdout. Logs go to stderr.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use questify_core::clock::Clock;
use questify_host::catalog::load_catalog;
use questify_host::clock::ManualClock;
use questify_host::config::HostConfig;
use questify_host::host::QuestifyHost;
use questify_host::repository::InMemoryEventRepository;
use questify_host::script::{load_script, run_script, write_report};
use questify_host::sweeper::spawn_deadline_sweeper;
use questify_progression::domain::engine::{ProgressionEngine, ProgressionRules};
use questify_progression::domain::level::LevelCurve;
use questify_quiz::domain::session::SessionPolicy;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Questify host");

    // Read configuration from environment.
    let config = HostConfig::from_env()?;
    let catalog_path = config
        .catalog_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("demos/catalog.yaml"));
    let script_path = config
        .script_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("demos/script.yaml"));

    let catalog = load_catalog(&catalog_path)?;
    let script = load_script(&script_path)?;

    // Build the host on a clock the script drives.
    let clock = Arc::new(ManualClock::new(script.start));
    let host_clock: Arc<dyn Clock> = clock.clone();
    let engine = ProgressionEngine::new(ProgressionRules {
        curve: LevelCurve::default(),
        badges: catalog.badges,
        fast_answer_threshold: config.fast_answer_threshold,
    });
    let host = Arc::new(QuestifyHost::new(
        catalog.quizzes,
        engine,
        SessionPolicy {
            question_deadline: config.question_deadline,
        },
        config.day_boundary,
        host_clock,
        Arc::new(InMemoryEventRepository::new()),
    ));
    let sweeper = spawn_deadline_sweeper(Arc::clone(&host), config.sweep_interval);

    let mut out = std::io::stdout();
    let player_ids = run_script(&host, &clock, &script, config.question_deadline, &mut out).await?;
    write_report(&host, &player_ids, &mut out).await?;

    sweeper.abort();
    tracing::info!(players = player_ids.len(), "script finished");
    Ok(())
}
