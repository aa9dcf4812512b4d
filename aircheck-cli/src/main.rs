mod cli;
mod config;
mod error;

use std::process;
use std::sync::Arc;

use aircheck_engine::{
    FfmpegEncoder, HttpIndexSource, HttpSegmentDownloader, LivenessMonitor, WindowScheduler,
    build_http_client,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::Args;
use crate::config::AppConfig;
use crate::error::Result;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("fatal: {e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let app_config = AppConfig::load(&args.config)?;
    let recorder_config = Arc::new(app_config.build_recorder_config(&args)?);

    info!(
        playlist = %recorder_config.playlist_url,
        start = %recorder_config.start,
        end = %recorder_config.end,
        workers = recorder_config.fetch_workers,
        continuous = recorder_config.continuous,
        "aircheck starting"
    );

    let shutdown = CancellationToken::new();

    let liveness =
        LivenessMonitor::create(app_config.process.lock_file.clone(), shutdown.clone()).await?;
    let liveness_handle = liveness.spawn();

    // Ctrl-C requests the same orderly drain as a lock-file removal.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                shutdown.cancel();
            }
        });
    }

    let client = build_http_client(&recorder_config)?;
    let index_source = Arc::new(HttpIndexSource::new(
        client.clone(),
        recorder_config.playlist_url.clone(),
        recorder_config.request_timeout,
    ));
    let downloader = Arc::new(HttpSegmentDownloader::new(
        client,
        recorder_config.request_timeout,
    ));
    let encoder = Arc::new(FfmpegEncoder::new(
        app_config.encoder.ffmpeg_path.clone(),
        recorder_config.base_dir.clone(),
        app_config.storage.file_prefix.clone(),
        app_config.storage.file_name.clone(),
        app_config.storage.file_suffix.clone(),
        app_config.encoder.bitrate_kbps,
        app_config.encoder.sample_rate,
        app_config.encoder.channels,
    ));

    let scheduler = WindowScheduler::new(
        Arc::clone(&recorder_config),
        index_source,
        downloader,
        encoder,
        shutdown.clone(),
    );
    let result = scheduler.run().await;

    // Stop the liveness watch and let it remove the lock file.
    shutdown.cancel();
    let _ = liveness_handle.await;

    result.map_err(Into::into)
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
