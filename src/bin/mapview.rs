//! mapview CLI tool
//!
//! Command-line interface for inspecting segment maps stored in a JSON dump.
//!
//! ## Commands
//!
//! - `layout <dump>`: Load one map, resolve its references and print the layout tree
//! - `maps <dump>`: List the map ids found in the dump

use clap::{Parser, Subcommand};
use mapview_core::{
    config::ExplorerConfig,
    event::MapEvent,
    explorer::MapExplorer,
    query::{Pagination, SegmentStore},
    store::MemoryStore,
    MapError,
};
use std::path::PathBuf;
use tokio::sync::mpsc::unbounded_channel;

#[derive(Parser)]
#[command(name = "mapview")]
#[command(author, version, about = "A tool for laying out segment maps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lay out a map and print the tree as JSON
    Layout {
        /// JSON file holding an array of segments
        dump: PathBuf,

        /// Process the map belongs to
        #[arg(short, long)]
        process: String,

        /// Map id
        #[arg(short, long)]
        map: String,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// List the maps stored in a dump
    Maps {
        /// JSON file holding an array of segments
        dump: PathBuf,

        /// Only list maps of this process
        #[arg(short, long)]
        process: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Layout {
            dump,
            process,
            map,
            config,
            pretty,
        } => {
            let config = match config {
                Some(path) => ExplorerConfig::from_path(path)?,
                None => ExplorerConfig::default(),
            };
            let store = MemoryStore::from_dump(&dump)?;
            tracing::info!("Loaded {} segments from {:?}", store.len(), dump);

            let (tx, mut rx) = unbounded_channel();
            let explorer = MapExplorer::with_config(store, &config, Some(tx))?;
            let view = runtime.block_on(explorer.explore(&process, &map));
            while let Ok(event) = rx.try_recv() {
                if let MapEvent::StateChanged(ticket, _, _, state) = event {
                    tracing::info!("[{ticket}] {state}");
                }
            }
            let view = view?;

            let output = if pretty {
                serde_json::to_string_pretty(&view.root)?
            } else {
                serde_json::to_string(&view.root)?
            };
            println!("{output}");
            Ok(())
        }

        Commands::Maps { dump, process } => {
            let store = MemoryStore::from_dump(&dump)?;
            let process = process.unwrap_or_default();
            runtime.block_on(async {
                let mut page = Pagination::default();
                loop {
                    let ids = store.get_map_ids(&process, &page).await?;
                    for id in ids.iter() {
                        println!("{id}");
                    }
                    if ids.len() < page.limit {
                        break;
                    }
                    page = page.next();
                }
                Ok::<(), MapError>(())
            })?;
            Ok(())
        }
    }
}
