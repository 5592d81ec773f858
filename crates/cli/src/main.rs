mod config_commands;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::{debug, error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    voxrelay_backend::BackendClient,
    voxrelay_config::{Severity, VoxrelayConfig, validate::validate_config},
    voxrelay_conversation::{Engine, Supervisor},
    voxrelay_sessions::SessionStore,
    voxrelay_telegram::{TelegramMedia, TelegramOutbound},
};

/// How long in-flight submissions may keep running after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(
    name = "voxrelay",
    about = "Voxrelay: Telegram front-end for speech transcription and synthesis"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (overrides discovery in ./ and ~/.config/voxrelay/).
    #[arg(long, global = true, env = "VOXRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (default when no subcommand is provided).
    Run,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load the config file (explicit path or discovered) and apply env overrides.
pub(crate) fn load_effective_config(path: Option<&Path>) -> anyhow::Result<VoxrelayConfig> {
    let config = match path {
        Some(path) => voxrelay_config::load_config(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => voxrelay_config::discover_and_load(),
    };
    Ok(voxrelay_config::apply_env_overrides(config))
}

async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_effective_config(config_path)?;

    let diagnostics = validate_config(&config);
    for d in &diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => debug!(path = %d.path, "{}", d.message),
        }
    }
    if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        anyhow::bail!("invalid configuration (run `voxrelay config check` for details)");
    }

    let bot = voxrelay_telegram::build_bot(&config.telegram)?;
    let backend =
        BackendClient::from_config(&config.backend).context("failed to build backend client")?;
    let (supervisor, supervisor_handle) = Supervisor::start();
    let engine = Engine::new(
        SessionStore::new(),
        Arc::new(TelegramOutbound::new(bot.clone())),
        Arc::new(TelegramMedia::new(bot.clone())),
        backend,
        supervisor,
    );

    let cancel = voxrelay_telegram::start_polling(bot, &config.telegram, engine)
        .await
        .context("failed to connect to telegram")?;
    info!(
        backend = %config.backend.base_url,
        timeout_secs = config.backend.timeout_secs,
        "voxrelay running"
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for ctrl-c")?;
            info!("shutdown requested");
        },
        () = cancel.cancelled() => warn!("telegram polling stopped"),
    }

    cancel.cancel();
    if !supervisor_handle.shutdown(SHUTDOWN_GRACE).await {
        warn!("exiting with submissions still in flight");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    match cli.command {
        None | Some(Commands::Run) => {
            info!(version = env!("CARGO_PKG_VERSION"), "voxrelay starting");
            run(cli.config.as_deref()).await
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, cli.config.as_deref())
        },
    }
}
