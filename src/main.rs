use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use pvz3_downloader::backend::downloader::{
    DownloadSession, Platform, RunOutcome, SessionEvent, StartOptions,
};
use pvz3_downloader::backend::utils::config::{DownloadConfig, UserConfig};
use pvz3_downloader::utils::logging;

#[derive(Debug, Parser)]
#[command(name = "pvz3-downloader", version)]
#[command(about = "Download Plants vs. Zombies 3 (CN) client assets from the CDN")]
struct Cli {
    /// Platform catalog to download (iOS or Android)
    #[arg(long)]
    platform: Option<String>,

    /// Directory to download into (defaults to the last one used)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of parallel downloads
    #[arg(long)]
    concurrency: Option<usize>,

    /// Put files directly under <output>/<platform> instead of <output>/pvz3_downloads/<platform>
    #[arg(long, default_value_t = false)]
    no_subfolder: bool,

    /// Override the CDN base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Print the download configuration as JSON and exit
    #[arg(long, default_value_t = false)]
    show_config: bool,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    let mut config = DownloadConfig::default();
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url);
    }

    if cli.show_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(ExitCode::SUCCESS);
    }

    let config_path = UserConfig::default_path();
    let mut user_config = UserConfig::load(&config_path);

    let platform = cli
        .platform
        .clone()
        .unwrap_or_else(|| user_config.last_platform.to_string());
    let output_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| user_config.last_download_path.clone());
    let concurrency = cli.concurrency.unwrap_or(user_config.last_concurrent);
    let create_subfolder = !cli.no_subfolder;

    let options = StartOptions::new(platform.clone())
        .with_output_dir(output_dir.clone())
        .with_concurrency(concurrency)
        .with_subfolder(create_subfolder);

    let session = Arc::new(DownloadSession::new(config).context("failed to set up HTTP client")?);
    let printer = tokio::spawn(print_events(session.subscribe()));

    let stopper = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping download");
                session.stop().await;
            }
        })
    };

    let result = session.start(options).await;
    stopper.abort();
    // The stopper holds a session handle; it must be gone before the channel can close.
    if let Err(e) = stopper.await {
        if !e.is_cancelled() {
            warn!("Interrupt handler failed: {e}");
        }
    }

    if let Ok(platform) = platform.parse::<Platform>() {
        user_config.last_platform = platform;
    }
    user_config.last_download_path = output_dir;
    user_config.last_concurrent = concurrency;
    user_config.create_sub_folder = create_subfolder;
    if let Err(e) = user_config.save(&config_path) {
        error!("Failed to save user config {config_path:?}: {e}");
    }

    drop(session);
    if let Err(e) = printer.await {
        warn!("Event printer failed: {e}");
    }

    match result {
        Ok(outcome) => {
            report(&outcome);
            Ok(if outcome.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(e) => {
            error!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn report(outcome: &RunOutcome) {
    let summary = outcome.summary();
    let status = if outcome.is_stopped() { "stopped" } else { "finished" };
    println!(
        "{} {}: {}/{} succeeded, {} failed, {} stopped in {:.1}s",
        summary.platform,
        status,
        summary.succeeded,
        summary.total,
        summary.failed,
        summary.stopped,
        summary.elapsed.as_secs_f64()
    );
}

/// Prints events until the session (and with it the channel) goes away.
async fn print_events(mut events: tokio::sync::broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::Started {
                platform,
                output_dir,
                concurrency,
            }) => {
                info!("Started {platform} download into {output_dir:?} ({concurrency} parallel)");
            }
            Ok(SessionEvent::Progress(progress)) => {
                println!(
                    "[{}/{}] failed: {} {}",
                    progress.completed,
                    progress.total,
                    progress.failed,
                    progress.current_file.unwrap_or_default()
                );
            }
            Ok(SessionEvent::Error { message }) => eprintln!("error: {message}"),
            // Log and retry lines already went through the logger.
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!("Skipped {skipped} progress events"),
            Err(RecvError::Closed) => break,
        }
    }
}
