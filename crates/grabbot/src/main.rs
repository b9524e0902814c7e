use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;

use grabcore::conversion::{check_ffmpeg, FfmpegTranscoder};
use grabcore::core::retry::{retry, RetryConfig};
use grabcore::core::{config, init_logger, log_startup_configuration};
use grabcore::download::source::{shared_provider, InstaloaderClient};
use grabcore::download::{InstagramStrategy, YouTubeStrategy, YtDlp};
use grabcore::{JobBook, JsonFileStore, Orchestrator, Settings};
use mediagrab::cli::{Cli, Commands};
use mediagrab::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the selected subcommand
/// (running the bot when none is given).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Panics inside handler tasks are caught by their JoinHandle; this only logs them
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // .env must be loaded before any Lazy config value is read
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        None | Some(Commands::Run) => run_bot().await,
        Some(Commands::CreateSession { interactive }) => run_create_session(interactive).await,
        Some(Commands::Sweep) => run_sweep(),
    }
}

async fn run_bot() -> Result<()> {
    log_startup_configuration();

    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN (or TELOXIDE_TOKEN) is not set");
    }

    let bot = create_bot(&config::BOT_TOKEN)?;

    let startup_retry = RetryConfig::telegram_send().max_retries(5);
    let me = retry(&startup_retry, || bot.get_me().send())
        .await
        .into_result()
        .map_err(|e| anyhow::anyhow!("Failed to reach the Bot API: {}", e))?;
    log::info!("Bot @{} started", me.username());

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register command menu: {}", e);
    }

    if !check_ffmpeg(&config::FFMPEG_BIN).await {
        log::warn!("ffmpeg not found at '{}', oversized videos cannot be compressed", *config::FFMPEG_BIN);
    }

    let settings = Settings::from_env();
    fs_err::create_dir_all(&settings.temp_root)?;

    let jobs = JobBook::new(Arc::new(JsonFileStore::open(config::STATE_FILE_PATH.clone())));
    let recovered = jobs.recover_crashed(&settings.temp_root)?;
    if !recovered.is_empty() {
        log::warn!("Recovered {} download(s) interrupted by the previous run", recovered.len());
    }
    let swept = jobs.sweep_all(&settings.temp_root)?;
    if !swept.is_empty() {
        log::info!("🧹 Removed {} leftover job folder(s)", swept.len());
    }

    let ytdlp = Arc::new(YtDlp::from_env());
    let instagram = InstagramStrategy::new(shared_provider(InstaloaderClient::from_env()), ytdlp.clone(), &settings);
    let youtube = YouTubeStrategy::new(ytdlp, &settings);
    let orchestrator = Arc::new(Orchestrator::new(
        instagram,
        youtube,
        Arc::new(FfmpegTranscoder::from_env()),
        jobs.clone(),
        settings.clone(),
    ));

    let handler = schema(HandlerDeps::new(orchestrator));
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(DependencyMap::new())
        .enable_ctrlc_handler()
        .build();

    #[cfg(unix)]
    {
        let shutdown = dispatcher.shutdown_token();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    term.recv().await;
                    log::info!("SIGTERM received, stopping dispatcher");
                    if let Ok(done) = shutdown.shutdown() {
                        done.await;
                    }
                }
                Err(e) => log::warn!("Failed to install SIGTERM handler: {}", e),
            }
        });
    }

    log::info!("Starting dispatcher");
    let handle = tokio::spawn(async move {
        dispatcher
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await
    });

    match handle.await {
        Ok(()) => log::info!("Dispatcher shutdown gracefully"),
        Err(e) if e.is_panic() => log::error!("Dispatcher panicked: {:?}", e),
        Err(e) => log::error!("Dispatcher task failed: {}", e),
    }

    match jobs.sweep_all(&settings.temp_root) {
        Ok(removed) if !removed.is_empty() => log::info!("🧹 Removed {} job folder(s) on shutdown", removed.len()),
        Ok(_) => {}
        Err(e) => log::warn!("Shutdown sweep failed: {}", e),
    }
    jobs.persist()?;
    log::info!("State saved to {}", config::STATE_FILE_PATH.display());

    // Give the file logger a moment to flush
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}

async fn run_create_session(interactive: bool) -> Result<()> {
    let client = InstaloaderClient::from_env();
    let session = client
        .login(interactive)
        .await
        .map_err(|e| anyhow::anyhow!("Instagram login failed: {}", e))?;
    log::info!("✅ Session saved to {}", session.display());
    Ok(())
}

fn run_sweep() -> Result<()> {
    let root = config::TEMP_FILES_DIR.clone();
    let jobs = JobBook::new(Arc::new(JsonFileStore::open(config::STATE_FILE_PATH.clone())));
    let removed = jobs.sweep_all(&root)?;
    log::info!("🧹 Removed {} job folder(s) under {}", removed.len(), root.display());
    Ok(())
}
