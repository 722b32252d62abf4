//! shadowdesk: webhook relay that announces IT requests aloud.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shadowdesk::relay::api;
use shadowdesk::{ChatCompletionClient, Config, SpeechSynthesizer, Summarizer, WebhookPipeline};

#[derive(Parser, Debug)]
#[command(name = "shadowdesk", about = "IT support webhook relay with spoken announcements")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides config and SHADOWDESK_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides config and SHADOWDESK_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Credentials usually live in .env next to the binary
    let _ = dotenvy::dotenv();

    // Initialize logging (suppress noisy ort internals)
    let default_filter = if args.verbose {
        "debug,ort=info"
    } else {
        "info,ort=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("shadowdesk v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(args.config.as_deref());
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if config.summarizer.api_key.is_none() {
        tracing::warn!("No OPENAI_API_KEY set; every request will use the fallback line");
    }
    info!("Summarizer model: {}", config.summarizer.model);

    // Model loading for the local engine is blocking, takes a few seconds
    let speech = tokio::task::spawn_blocking({
        let config = config.clone();
        move || SpeechSynthesizer::from_config(&config)
    })
    .await?;

    let summarizer = Summarizer::new(ChatCompletionClient::new(config.summarizer.clone()));
    let pipeline = Arc::new(WebhookPipeline::new(summarizer, speech));

    api::serve(api::AppState { pipeline }, &config.server.host, config.server.port).await?;

    Ok(())
}
