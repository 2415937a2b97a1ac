use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manifest_objects::db::{self, SqliteObjectStore};
use manifest_objects::tree_render::{collect_tree, render_tree};
use manifest_objects::{IdentifierProvider, Runtime, RuntimeConfig};

#[derive(Parser)]
#[command(name = "mfobj")]
#[command(about = "Inspect stored domain objects")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print an object's model as JSON
    Show {
        /// Object id, as `space:key` or a bare key
        id: String,
    },
    /// Print an object's composition tree
    Tree {
        /// Object id, as `space:key` or a bare key
        id: String,

        /// Maximum depth below the root
        #[arg(short, long)]
        depth: Option<usize>,
    },
}

/// Initialize tracing with output to stderr so stdout carries only results
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "manifest_objects=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = RuntimeConfig::load();
    let path = match &config.database_path {
        Some(path) => path.clone(),
        None => db::default_path()?,
    };
    let identifiers = IdentifierProvider::new(config.default_space.clone());
    let store = SqliteObjectStore::open(path.clone(), identifiers)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;
    store.migrate()?;

    let runtime = Runtime::builder(config).store(Arc::new(store)).build();

    match cli.command {
        Commands::Show { id } => {
            let object = runtime.require_object(&id).await?;
            println!("{}", serde_json::to_string_pretty(&object.model())?);
        }
        Commands::Tree { id, depth } => {
            let object = runtime.require_object(&id).await?;
            let tree = collect_tree(object, depth).await?;
            print!("{}", render_tree(&[tree]));
        }
    }

    runtime.shutdown().await;
    Ok(())
}
