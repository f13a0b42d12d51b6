use std::{net::SocketAddr, sync::Arc};

use prnotify::{
    AppState, BitbucketClient, ChannelHub, Config, EventBus, PullRequestRepository,
    SharedRepository, WebhookRouter, notify, server, sync,
};
use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with env filter, defaulting to debug levels if RUST_LOG is unset.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("debug,axum=info,reqwest=info,hyper_util=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();

    let config = Config::load()?;
    let client = BitbucketClient::from_config(&config);
    let repository: SharedRepository = Arc::new(RwLock::new(PullRequestRepository::new()));
    let bus = EventBus::new();
    let hub = Arc::new(ChannelHub::new());

    sync::sync_all(&client, &repository).await?;

    notify::spawn_fanout(&bus, hub.clone(), repository.clone());

    let state = AppState {
        router: Arc::new(WebhookRouter::new(client, repository.clone(), bus)),
        hub,
        repository,
    };
    let app = server::app(state);

    let addr: SocketAddr = std::env::var("BIND_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
