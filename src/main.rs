use murmur::{config::ChatConfig, error::StartupError, murmur_route, state::AppStateBuilder};
use std::{net::SocketAddr, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = serve().await {
        tracing::error!("murmur failed: {}", e);
    }
}

async fn serve() -> Result<(), StartupError> {
    let config = ChatConfig::from_env()?;
    let addr = config.bind_addr.clone();

    let state = AppStateBuilder::new().with_config(config).build().await?;
    let app = murmur_route(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!("murmur chat service listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(StartupError::Serve)
}
