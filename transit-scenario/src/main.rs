use std::net::SocketAddr;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use transit_scenario::graphql::{
    CacheConfig, CachedQueryClient, DEFAULT_ENDPOINT, HttpQueryClient, QueryClientConfig, RetryPolicy, RetryingClient,
};
use transit_scenario::web::{AppState, create_router};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

fn parse_bind_addr(raw: &str) -> Result<SocketAddr, String> {
    raw.parse()
        .map_err(|e| format!("BIND_ADDR must be a socket address, got {raw:?}: {e}"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // API endpoint, e.g. https://transit.land/api/v2; queries go to {base}/query
    let endpoint = match std::env::var("TRANSITLAND_API_BASE") {
        Ok(base) => format!("{}/query", base.trim_end_matches('/')),
        Err(_) => DEFAULT_ENDPOINT.to_string(),
    };

    let mut client_config = QueryClientConfig::new(&endpoint);
    match std::env::var("TRANSITLAND_API_KEY") {
        Ok(key) => client_config = client_config.with_api_key(key),
        Err(_) => warn!("TRANSITLAND_API_KEY not set. API calls will likely fail."),
    }

    let http = HttpQueryClient::new(client_config).expect("Failed to create query client");
    let client = CachedQueryClient::new(RetryingClient::new(http, RetryPolicy::default()), &CacheConfig::default());

    let state = AppState::new(client);
    let app = create_router(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let addr = parse_bind_addr(&bind_addr).unwrap_or_else(|message| panic!("{message}"));

    info!(%addr, %endpoint, "Transit scenario server listening");
    info!("  GET  /health    - Health check");
    info!("  POST /scenario  - Stream a scenario as NDJSON");
    info!("  POST /wsdot     - Stream a scenario and its WSDOT frequency report");
    info!("  POST /filter    - Filter a saved scenario");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server error");
}
