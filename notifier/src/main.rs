use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use notifier::constants::defaults;
use notifier::services::{CleanupService, Dispatcher, ReminderGenerator, StatsService};
use notifier::web::{start_web_server, AppState};
use notifier::{
    Clock, Config, ConfigManager, Database, PipelineTicks, ReminderScheduler, SqliteTimetable,
    SystemClock, TimeRange, VapidKeys, WebPushTransport,
};

/// Class reminder push notifier
#[derive(Parser)]
#[command(name = "notifier", version, about)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = defaults::CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler (and the web API when enabled) until Ctrl+C
    Run,

    /// Create reminders for classes starting in the next window
    Generate {
        /// Window length in hours, defaults to pipeline.window_hours
        #[arg(long)]
        hours: Option<i64>,
    },

    /// Expire overdue reminders and deliver everything due now
    Send,

    /// Print reminder counts by state
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Delete terminal reminders older than the retention period
    Cleanup {
        /// Retention in days, defaults to pipeline.retention_days
        #[arg(long)]
        retention_days: Option<i64>,
    },

    /// Send a test notification to every subscription of a student
    Test {
        #[arg(long)]
        student: String,

        #[arg(long, default_value = "Push notifications are working")]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Missing .env is fine, the environment may already carry the keys
    dotenvy::dotenv().ok();

    let env_filter = EnvFilter::from_default_env()
        .add_directive("notifier=info".parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("tokio_cron_scheduler=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("sqlx=warn".parse()?);
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    let config_manager = ConfigManager::new(&cli.config).await?;
    let config = config_manager.get_current_config();

    let database = Arc::new(Database::new(&config.database.path).await?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match cli.command {
        Command::Run => run_daemon(config, database, clock).await,
        Command::Generate { hours } => {
            let window = config.pipeline.window_or(hours)?;
            generate(&config, database, clock, window).await
        }
        Command::Send => send(config, database, clock).await,
        Command::Stats { json } => stats(database, json).await,
        Command::Cleanup { retention_days } => {
            let retention = config.pipeline.retention_or(retention_days)?;
            cleanup(database, clock, retention).await
        }
        Command::Test { student, message } => {
            test_push(config, database, clock, &student, &message).await
        }
    }
}

fn load_keys(config: &Config) -> Result<Arc<VapidKeys>> {
    let keys = VapidKeys::load(&config.push.subject)
        .context("VAPID credentials missing or invalid, generate a pair with vapid-keygen")?;
    Ok(Arc::new(keys))
}

fn build_generator(
    config: &Config,
    database: Arc<Database>,
    clock: Arc<dyn Clock>,
) -> ReminderGenerator {
    let timetable = Arc::new(SqliteTimetable::new(database.clone()));
    ReminderGenerator::new(database, timetable, clock, &config.pipeline)
}

fn build_dispatcher(
    config: &Config,
    database: Arc<Database>,
    clock: Arc<dyn Clock>,
    keys: Arc<VapidKeys>,
    cancel: CancellationToken,
) -> Dispatcher {
    let transport = Arc::new(WebPushTransport::new(
        &config.push,
        config.pipeline.send_timeout(),
    ));
    Dispatcher::new(database, transport, keys, clock, config, cancel)
}

async fn run_daemon(config: Arc<Config>, database: Arc<Database>, clock: Arc<dyn Clock>) -> Result<()> {
    info!("Starting class reminder notifier");
    let keys = load_keys(&config)?;
    let cancel = CancellationToken::new();

    let generator = Arc::new(build_generator(&config, database.clone(), clock.clone()));
    let dispatcher = Arc::new(build_dispatcher(
        &config,
        database.clone(),
        clock.clone(),
        keys.clone(),
        cancel.clone(),
    ));
    let cleanup = Arc::new(CleanupService::new(database.clone(), clock.clone()));
    let ticks = PipelineTicks::new(generator, dispatcher, cleanup, clock.clone(), &config.pipeline);

    let mut scheduler = ReminderScheduler::new(ticks, config.schedule.clone()).await?;
    scheduler.start().await?;

    let web_task = if config.web.enabled {
        let state = AppState::new(database.clone(), keys.clone(), clock.clone());
        let web_config = config.web.clone();
        let shutdown = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = start_web_server(state, &web_config, shutdown).await {
                error!("Web server stopped: {}", e);
            }
        }))
    } else {
        info!("Web API disabled");
        None
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down");

    // In-flight dispatches stop at the next record boundary
    cancel.cancel();
    scheduler.shutdown().await?;
    if let Some(task) = web_task {
        if let Err(e) = task.await {
            warn!("Web server task ended abnormally: {}", e);
        }
    }

    info!("Notifier stopped");
    Ok(())
}

async fn generate(
    config: &Config,
    database: Arc<Database>,
    clock: Arc<dyn Clock>,
    window: chrono::Duration,
) -> Result<()> {
    let generator = build_generator(config, database, clock.clone());
    let batch = generator
        .generate(TimeRange::starting_at(clock.now(), window))
        .await?;

    println!(
        "occurrences: {}, created: {}, skipped: {}",
        batch.occurrences, batch.created, batch.skipped
    );
    if let Some(partial) = batch.partial_failure() {
        warn!("{}", partial);
        for failure in &partial.failures {
            println!("  skipped occurrence {}", failure);
        }
    }
    Ok(())
}

async fn send(config: Arc<Config>, database: Arc<Database>, clock: Arc<dyn Clock>) -> Result<()> {
    let keys = load_keys(&config)?;
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, finishing in-flight records");
            interrupt.cancel();
        }
    });

    let dispatcher = build_dispatcher(&config, database, clock, keys, cancel);
    let report = dispatcher.run_due().await?;

    println!(
        "due: {}, sent: {}, retrying: {}, failed: {}, no subscription: {}, expired: {}, cancelled: {}",
        report.total,
        report.sent,
        report.retrying,
        report.failed,
        report.no_subscription,
        report.expired,
        report.cancelled
    );
    for failure in &report.failures {
        println!("  {}", failure);
    }
    Ok(())
}

async fn stats(database: Arc<Database>, json: bool) -> Result<()> {
    let stats = StatsService::new(database).stats().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("pending: {}", stats.pending);
        println!("sent:    {}", stats.sent);
        println!("failed:  {}", stats.failed);
        println!("expired: {}", stats.expired);
        println!("total:   {}", stats.total);
    }
    Ok(())
}

async fn cleanup(
    database: Arc<Database>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
) -> Result<()> {
    if retention < chrono::Duration::zero() {
        bail!("retention cannot be negative");
    }
    let report = CleanupService::new(database, clock).cleanup(retention).await?;
    println!("deleted: {} (updated before {})", report.deleted, report.cutoff.to_rfc3339());
    Ok(())
}

async fn test_push(
    config: Arc<Config>,
    database: Arc<Database>,
    clock: Arc<dyn Clock>,
    student: &str,
    message: &str,
) -> Result<()> {
    let keys = load_keys(&config)?;
    let dispatcher = build_dispatcher(&config, database, clock, keys, CancellationToken::new());
    let delivery = dispatcher.send_test(student, message).await?;

    if delivery.attempted == 0 {
        bail!("student {} has no push subscription", student);
    }
    println!(
        "delivered to {}/{} endpoint(s), {} removed",
        delivery.delivered, delivery.attempted, delivery.removed
    );
    for e in &delivery.errors {
        println!("  {}", e);
    }
    if delivery.delivered == 0 {
        bail!("no endpoint accepted the test message");
    }
    Ok(())
}
