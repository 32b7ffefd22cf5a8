use std::env;
use std::path::PathBuf;

use shopqa_core::config::Config;
use shopqa_retrieval::Retriever;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // optional positional argument: directory holding config.toml
    let base = env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let settings = Config::load_from(&base).map_err(|e| { eprintln!("Error loading config: {}", e); e })?.settings()?;

    println!("shopqa indexer\n==============");
    println!("Corpus: {}", settings.data.products_path.display());
    println!("Index: {}", settings.data.index_path.display());
    println!("Documents: {}", settings.data.docs_path.display());

    let retriever = Retriever::from_settings(&settings)?;
    retriever.ensure_index().await?;
    let count = retriever.documents()?.len();
    if retriever.build_count() > 0 {
        println!("Built index of {} documents with {}", count, retriever.embedder().model_id());
    } else {
        println!("Index already present ({} documents), nothing to do", count);
    }
    Ok(())
}
