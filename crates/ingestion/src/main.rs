//! Concierge index builder
//!
//! Builds the vector index from the PDF directory, or loads and reports on
//! the existing one:
//! 1. Loads configuration
//! 2. Extracts and chunks PDF pages
//! 3. Embeds the chunks
//! 4. Saves the index

use clap::Parser;
use concierge_common::{config::AppConfig, embeddings::create_embedder, telemetry, VERSION};
use concierge_ingestion::{IndexBuilder, IndexOrigin};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ingest", version, about = "Build the Concierge vector index from a PDF directory")]
struct Cli {
    /// Rebuild even when an index already exists
    #[arg(long)]
    force: bool,

    /// Directory containing the PDFs (overrides rag.pdf_dir)
    #[arg(long)]
    pdf_dir: Option<PathBuf>,

    /// Directory holding the index (overrides rag.index_path)
    #[arg(long)]
    index_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::load()?;
    if let Some(dir) = cli.pdf_dir {
        config.rag.pdf_dir = dir;
    }
    if let Some(path) = cli.index_path {
        config.rag.index_path = path;
    }

    telemetry::init_tracing(&config.observability);

    info!("Starting Concierge ingest v{}", VERSION);

    let embedder = create_embedder(&config.embedding)?;
    let builder = IndexBuilder::from_config(embedder, &config);

    let (index, origin) = if cli.force {
        let index = builder.rebuild(&config.rag.pdf_dir, &config.rag.index_path).await?;
        (index, IndexOrigin::Built)
    } else {
        builder
            .build_or_load(&config.rag.pdf_dir, &config.rag.index_path)
            .await?
    };

    let manifest = index.manifest();
    println!(
        "{} index at {}: {} chunks from {} PDFs (model {}, dimension {})",
        match origin {
            IndexOrigin::Built => "Built",
            IndexOrigin::Loaded => "Loaded",
        },
        config.rag.index_path.display(),
        index.len(),
        manifest.sources.len(),
        manifest.embedding_model,
        manifest.dimension,
    );

    Ok(())
}
