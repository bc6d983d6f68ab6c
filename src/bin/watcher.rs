//! YP Bank Watcher - rewrites MT940 statement references as files arrive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use ypbank_watcher::{
    logging::init_logging, DirectoryWatcher, FileProcessor, ProcessingOutcome, Result,
    WatchConfig,
};

#[derive(Parser)]
#[command(name = "ypbank_watcher")]
#[command(about = "Watch a folder for MT940 statements and stamp :20: with the :61: date", long_about = None)]
struct Cli {
    /// Root directory holding inputFolder, outputFolder, archiveFolder and logFolder
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// TOML configuration file (takes precedence over --root)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the input folder until Ctrl+C
    Watch {
        /// Also process files already in the input folder
        #[arg(long)]
        process_existing: bool,
    },
    /// Process one file already in the input folder and exit
    Process {
        /// File name inside the input folder
        file_name: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match cli.config {
        Some(ref path) => WatchConfig::load(path)?,
        None => WatchConfig::from_root(&cli.root),
    };

    match cli.command {
        Command::Watch { process_existing } => {
            config.process_existing |= process_existing;
            config.ensure_dirs()?;

            let processor = Arc::new(FileProcessor::new(Arc::new(config)));
            let watcher = DirectoryWatcher::start(processor)?;
            watcher
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl+C: {}", e);
                        std::future::pending::<()>().await;
                    }
                })
                .await
        }
        Command::Process { file_name } => {
            config.ensure_dirs()?;

            let processor = FileProcessor::new(Arc::new(config));
            match processor.process(&file_name).await? {
                ProcessingOutcome::Transformed { file_name, .. } => {
                    println!("{}: transformed and archived", file_name);
                }
                ProcessingOutcome::Rejected { file_name, reason } => {
                    println!("{}: rejected ({})", file_name, reason);
                }
            }
            Ok(())
        }
    }
}
