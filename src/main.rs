use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ledgerbook::app::{Ledger, LedgerOptions};
use ledgerbook::config::{Config, StoreBackend};
use ledgerbook::modules::gateways::{PaymentGateway, StripeGateway};
use ledgerbook::store::{DocumentStore, MemoryStore, MySqlStore, TimedStore};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    init_tracing(&config.app.log_format);

    tracing::info!("Starting ledgerbook invoice ledger");
    tracing::info!(env = %config.app.env, bind = %config.server.bind_address(), "Configuration loaded");

    let backend: Arc<dyn DocumentStore> = match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Mysql => {
            let database = config
                .store
                .database
                .as_ref()
                .context("DATABASE_URL is required for the mysql backend")?;
            let pool = database
                .create_pool(config.store.timeout())
                .await
                .context("Failed to create database pool")?;
            let store = MySqlStore::new(pool);
            store.migrate().await.context("Failed to run migrations")?;
            tracing::info!(max_connections = database.max_connections, "MySQL store ready");
            Arc::new(store)
        }
    };
    let store: Arc<dyn DocumentStore> = Arc::new(TimedStore::new(backend, config.store.timeout()));

    let gateway: Option<Arc<dyn PaymentGateway>> = config.gateway.as_ref().map(|gateway| {
        tracing::info!(base_url = %gateway.base_url, "Stripe gateway enabled");
        Arc::new(StripeGateway::new(gateway)) as Arc<dyn PaymentGateway>
    });

    let ledger = Ledger::new(
        store,
        LedgerOptions {
            retry_limit: config.store.retry_limit,
            numbering_retry_limit: config.store.numbering_retry_limit,
            strict_numbering: config.ledger.strict_numbering,
        },
        gateway,
    );

    // Background sweep; never exits
    let scheduler = Arc::new(ledger.scheduler(Duration::from_secs(
        config.ledger.sweep_interval_secs,
    )));
    tokio::spawn(scheduler.start());

    // Start HTTP server
    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        let ledger = ledger.clone();
        App::new()
            .wrap(TracingLogger::default())
            .configure(move |cfg| ledger.configure(cfg))
    })
    .workers(config.server.workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await.context("HTTP server failed")
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ledgerbook=debug,actix_web=info".into());

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
