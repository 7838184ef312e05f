//! Mediaflow - Automated Azure Media Services Encoding Workflow
//!
//! This is the main entry point for the mediaflow CLI, which uploads a video
//! to Azure Media Services, encodes it, exports the result and cleans up.

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mediaflow::cli::{Args, Commands};
use mediaflow::config::{Config, ExportMode};
use mediaflow::error::MediaFlowError;
use mediaflow::naming::RunId;
use mediaflow::workflow::Workflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    let _guard = setup_logging(args.verbose)?;
    info!("Starting mediaflow - Automated Azure Media Services Encoding Workflow");

    // Writing a template needs neither credentials nor a valid account
    if let Commands::Init { path, force } = &args.command {
        if path.exists() && !force {
            return Err(MediaFlowError::Config(format!(
                "{} already exists, pass --force to replace it",
                path.display()
            ))
            .into());
        }
        Config::default().save_to_file(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if std::path::Path::new("mediaflow.toml").exists() {
                info!("Found mediaflow.toml in current directory, loading...");
                Config::from_file("mediaflow.toml")?
            } else {
                Config::default()
            }
        }
    };
    config.apply_env(|key| std::env::var(key).ok());

    if let Commands::Run { input, output_dir, export_mode, timeout, keep_transform } = &args.command {
        if let Some(input) = input {
            config.paths.source_file = input.clone();
        }
        if let Some(output_dir) = output_dir {
            config.paths.output_dir = output_dir.clone();
        }
        if let Some(mode) = export_mode {
            config.export.mode = parse_export_mode(mode)?;
        }
        if let Some(timeout) = timeout {
            config.poll.max_duration_secs = Some(*timeout);
        }
        if *keep_transform {
            config.cleanup.keep_transform_on_success = true;
        }
    }

    // Ctrl-C during a run stops the current step; teardown still runs.
    // Other commands keep the default interrupt behaviour.
    let cancel = CancellationToken::new();
    if matches!(args.command, Commands::Run { .. }) {
        let signal_token = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Received interrupt, cancelling run");
                signal_token.cancel();
            }
        });
    }

    let workflow = Workflow::new(config, cancel)?;

    match args.command {
        Commands::Run { .. } => {
            let summary = workflow.run().await?;
            println!("\nRun {} finished: job {}", summary.names.run_id, summary.final_state);
            println!("Exported {} files ({} bytes) to {}",
                summary.export.files.len(), summary.export.bytes, summary.export.folder.display());
        }
        Commands::Transform { name } => {
            let transform = workflow.provision_transform(&name).await?;
            println!("Transform {} is ready", transform.name);
        }
        Commands::Cleanup { run_id } => {
            let run_id = RunId::parse(&run_id)?;
            let report = workflow.cleanup_run(run_id).await?;
            for deleted in &report.deleted {
                println!("Deleted {}", deleted);
            }
            report.into_result()?;
        }
        Commands::Init { .. } => {}
    }

    info!("mediaflow completed successfully");
    Ok(())
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<WorkerGuard> {
    // Create log directory
    let log_dir = std::env::current_dir()?.join(".mediaflow").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "mediaflow.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Create console layer
    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber.try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("mediaflow.log").display());

    Ok(guard)
}

/// Parse export mode from string
fn parse_export_mode(mode: &str) -> Result<ExportMode> {
    match mode.to_lowercase().as_str() {
        "direct" => Ok(ExportMode::Direct),
        "copy" => Ok(ExportMode::Copy),
        _ => Err(MediaFlowError::Config(format!(
            "Invalid export mode '{}'. Valid modes: direct, copy",
            mode
        )).into()),
    }
}
