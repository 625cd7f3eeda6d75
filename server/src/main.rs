use anyhow::Result;
use axum::Router;
use clap::Parser;
use rag_server::config::AppConfig;
use rag_server::ollama::OllamaGenerator;
use rag_server::{build_app, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// JSON config file (pipeline messages, generator settings, max_top_k)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ollama base URL, overrides the config file
    #[arg(long, env = "OLLAMA_URL")]
    ollama_url: Option<String>,
    /// Generator model, overrides the config file
    #[arg(long, env = "OLLAMA_MODEL")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(url) = args.ollama_url {
        config.generator.base_url = url;
    }
    if let Some(model) = args.model {
        config.generator.model = model;
    }

    let generator = Arc::new(OllamaGenerator::new(config.generator.clone())?);
    let state = AppState::load(&args.index, generator, &config)?;
    let app: Router = build_app(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, model = %config.generator.model, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
