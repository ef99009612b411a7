// src/main.rs

use std::env;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use eth_query_mcp::{
    api,
    config::Config,
    mcp::{
        handler::handle_mcp_request,
        protocol::{error_codes, Request, Response},
    },
    AppState,
};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// --- HTTP Server Logic ---
async fn run_http_server(state: AppState) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], state.config.port));
    let app = api::router(state);

    info!("🚀 HTTP Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("HTTP server terminated")?;
    Ok(())
}

// --- MCP Server Logic ---
async fn run_mcp_server(state: AppState) {
    info!("🚀 Starting MCP server on stdin/stdout...");

    let mut stdin = io::BufReader::new(io::stdin());
    let mut stdout = io::stdout();

    loop {
        let mut line = String::new();

        match stdin.read_line(&mut line).await {
            Ok(0) => {
                info!("EOF received, shutting down MCP server");
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                debug!("Received: {}", line);

                let response = match serde_json::from_str::<Request>(line) {
                    Ok(request) => handle_mcp_request(request, state.clone()).await,
                    Err(parse_error) => {
                        error!("JSON parse error: {}", parse_error);
                        Some(Response::error(
                            serde_json::Value::Null,
                            error_codes::PARSE_ERROR,
                            format!("Parse error: {}", parse_error),
                        ))
                    }
                };

                if let Some(response) = response {
                    match serde_json::to_string(&response) {
                        Ok(response_json) => {
                            debug!("Sending: {}", response_json);
                            let write = async {
                                stdout.write_all(response_json.as_bytes()).await?;
                                stdout.write_all(b"\n").await?;
                                stdout.flush().await
                            };
                            if let Err(e) = write.await {
                                error!("Failed to write response: {}", e);
                                break;
                            }
                        }
                        Err(e) => error!("Failed to serialize response: {}", e),
                    }
                }
            }
            Err(e) => {
                error!("Failed to read from stdin: {}", e);
                break;
            }
        }
    }

    info!("MCP server shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for MCP
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eth_query_mcp=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    let args: Vec<String> = env::args().skip(1).collect();
    config
        .apply_args(&args)
        .context("Invalid command-line arguments")?;

    info!(
        "Using {} RPC endpoints (timeout {:?}, {} attempts per endpoint)",
        config.rpc_urls.len(),
        config.rpc_timeout,
        config.max_retries
    );

    let app_state = AppState::from_config(config).context("Failed to initialize RPC client")?;

    // Check if running in MCP mode (stdin/stdout) or HTTP server mode
    if app_state.config.mcp_mode {
        run_mcp_server(app_state).await;
        Ok(())
    } else {
        run_http_server(app_state).await
    }
}
