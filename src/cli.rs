use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a video, encode it, export the result and clean up
    Run {
        /// Source video file (overrides paths.source_file)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Folder receiving exported output (overrides paths.output_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Export mode: direct or copy (overrides export.mode)
        #[arg(long)]
        export_mode: Option<String>,

        /// Give up polling after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Keep the job and transform when the run succeeds
        #[arg(long)]
        keep_transform: bool,
    },

    /// Create or update the encoding transform only
    Transform {
        /// Transform name
        #[arg(short, long)]
        name: String,
    },

    /// Delete resources left behind by an interrupted run
    Cleanup {
        /// Run identifier printed when the run started
        #[arg(short, long)]
        run_id: String,
    },

    /// Write the default configuration to a file
    Init {
        /// Destination of the configuration file
        #[arg(short, long, default_value = "mediaflow.toml")]
        path: PathBuf,

        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}
