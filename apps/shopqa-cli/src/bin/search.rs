use std::env;

use shopqa_core::config::Config;
use shopqa_retrieval::Retriever;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} '<query>' [--top-k N]", args[0]);
        eprintln!("Example: {} 'shampoo for dry hair' --top-k 3", args[0]);
        std::process::exit(1);
    }
    let query = &args[1];
    let mut top_k = None;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--top-k" | "-k" => match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) {
                Some(k) => { top_k = Some(k); i += 1; }
                None => { eprintln!("Error: --top-k requires a number"); std::process::exit(1); }
            },
            other => { eprintln!("Unknown argument: {}", other); std::process::exit(1); }
        }
        i += 1;
    }

    let settings = Config::load()?.settings()?;
    let retriever = Retriever::from_settings(&settings)?;
    retriever.ensure_index().await?;
    let results = retriever.retrieve(query, top_k)?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
