mod cli_main;

use clap::Parser;
use rayon::ThreadPoolBuilder;
use std::process;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use cli_main::{Cli, Commands};
use ctgbridge::error::{BridgeError, Result};
use ctgbridge::overlap::OverlapFile;
use ctgbridge::pipeline::{select_thresholds, ContigBridge};
use ctgbridge::seq::NameTable;

fn build_thread_pool(threads: usize) {
    // a pool may already exist when embedded; the scan workers do not depend on it
    if let Err(e) = ThreadPoolBuilder::new().num_threads(threads.max(1)).build_global() {
        tracing::debug!("Keeping existing rayon pool: {}", e);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Stats { overlaps, kind, overlap_format, length_mismatch, threads } => {
            info!("Deriving {:?} thresholds from {}", kind, overlaps.display());
            build_thread_pool(threads);
            let mut names = NameTable::new();
            let mut source = OverlapFile::new(&overlaps, &mut names);
            if let Some(format) = overlap_format {
                source = source.with_format(format);
            }
            let selected = select_thresholds(&mut source, kind, threads, length_mismatch)?;
            let json = serde_json::to_string_pretty(&selected).map_err(|e| BridgeError::InvalidConfig(e.to_string()))?;
            println!("{}", json);
            Ok(())
        }
        command @ Commands::Bridge { .. } => {
            let Some(config) = command.into_bridge_config() else {
                return Ok(());
            };
            build_thread_pool(config.threads);
            let records = ContigBridge::new(config).run()?;
            info!("Wrote {} sequences", records.len());
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Setting tracing default failed: {}", e);
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
