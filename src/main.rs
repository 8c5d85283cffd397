use n8ncloud_provider::{init_logging, serve, N8nCloudProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting n8n Cloud provider");
    serve(N8nCloudProvider::new(env!("CARGO_PKG_VERSION"))).await
}
