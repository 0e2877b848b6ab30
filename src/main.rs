//! Storefront Cart - guest and user carts with login-time merge

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use storefront_cart::{
    api::{self, AppState},
    catalog::{InMemoryCatalog, PgProductCatalog, ProductCatalog},
    config::AppConfig,
    publisher::{EventPublisher, LogPublisher, NatsPublisher},
    store::{CartStore, InMemoryCartStore, PgCartStore},
    CartEngine,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let (store, catalog): (Arc<dyn CartStore>, Arc<dyn ProductCatalog>) = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            (Arc::new(PgCartStore::new(db.clone())), Arc::new(PgProductCatalog::new(db)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, carts are kept in memory");
            (Arc::new(InMemoryCartStore::new()), Arc::new(InMemoryCatalog::new()))
        }
    };

    let publisher: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client)),
            Err(error) => {
                tracing::warn!(%error, "NATS unavailable, cart events are only logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let engine = CartEngine::new(store, catalog).with_publisher(publisher);
    let app = api::router(AppState::new(engine));

    let addr = config.socket_addr();
    tracing::info!("storefront-cart listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
