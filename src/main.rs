use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;
use rmcp::transport::stdio;
use tracing_subscriber::EnvFilter;

use mcp_gite::adapters::cache::memory_cache::MemoryCache;
use mcp_gite::adapters::gemini::GeminiAnalyzer;
use mcp_gite::adapters::http_store::HttpStore;
use mcp_gite::adapters::memory_store::MemoryStore;
use mcp_gite::config::load_config;
use mcp_gite::mcp::server::LedgerMcpServer;

fn find_config_path() -> PathBuf {
    // Check common locations for config file
    let candidates = [
        PathBuf::from("config.yaml"),
        binary_dir().join("config.yaml"),
    ];

    for path in &candidates {
        if path.exists() {
            return path.clone();
        }
    }

    candidates[0].clone()
}

fn binary_dir() -> PathBuf {
    // Look in the directory where the binary is
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting mcp-gite server");

    // Load configuration
    let config_path = find_config_path();
    let config = load_config(&config_path)?;

    // Build dependencies
    let store: Arc<dyn mcp_gite::ports::store::TransactionStore> = if config.api.enabled {
        tracing::info!(
            base_url = %config.api.base_url,
            "API store enabled — the ledger lives behind the serverless functions"
        );
        let cache: Arc<dyn mcp_gite::ports::cache::SnapshotCache> =
            Arc::new(MemoryCache::new(config.api.max_cache_entries));
        Arc::new(HttpStore::new(&config.api, cache)?)
    } else {
        tracing::info!("API store disabled — keeping the ledger in memory");
        Arc::new(MemoryStore::new())
    };

    let analyzer = Arc::new(GeminiAnalyzer::new(&config.analyzer)?);

    let server = LedgerMcpServer::new(store, analyzer, &config.pricing);

    // Start MCP server over stdio
    let service = server.serve(stdio()).await?;
    service.waiting().await?;

    Ok(())
}
