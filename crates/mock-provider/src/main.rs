use clap::Parser;
use mock_provider::MockProvider;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Stand-in FaaS provider for manual testing of the gateway against a
/// running process rather than an in-process `tower::Service`.
#[derive(Debug, Parser)]
struct Args {
    #[arg(long, default_value = "8081")]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::new("info"))
        .init();

    let args = Args::parse();
    let provider = MockProvider::new();
    provider.seed("openfaas-fn", "echo", 0, 5, 0, 0, Some(3));
    provider.seed("openfaas-fn", "figlet", 1, 10, 2, 2, Some(0));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    info!(%addr, "mock provider listening");
    axum::serve(listener, provider.router()).await.unwrap();
}
