use std::sync::Arc;
use std::time::Duration;

use polymirror::api::create_router;
use polymirror::config::{AppConfig, LogFormat};
use polymirror::db;
use polymirror::execution::{
    run_copy_engine, CopyEngine, EngineDeps, ExchangeAdapter, ExchangeBackend, LiveExchange,
    PaperExchange,
};
use polymirror::ingestion::SignalFeedClient;
use polymirror::metrics::init_metrics;
use polymirror::store::PgStore;
use polymirror::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(LogFormat::from_env());

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database connected, migrations applied");

    let metrics_handle = init_metrics();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.call_timeout_ms))
        .build()?;

    let exchange: Arc<dyn ExchangeAdapter> = match config.exchange_backend {
        ExchangeBackend::Paper => {
            tracing::warn!("EXCHANGE_BACKEND=paper: orders are simulated, nothing reaches the exchange");
            Arc::new(PaperExchange::default())
        }
        ExchangeBackend::Live => Arc::new(LiveExchange::new(
            http.clone(),
            config.clob_api_url.clone(),
            config.data_api_url.clone(),
        )),
    };

    let store = Arc::new(PgStore::new(pool));
    let signals = Arc::new(SignalFeedClient::new(http, &config.signal_feed_url)?);

    // --- Worker loop ---
    let engine = CopyEngine::new(
        EngineDeps {
            store: store.clone(),
            ledger: store.clone(),
            signals,
            exchange: exchange.clone(),
            master_key: config.master_key.clone(),
        },
        config.engine_config(),
    );
    let poll_interval = config.poll_interval();
    tokio::spawn(async move {
        run_copy_engine(engine, poll_interval).await;
    });

    tracing::info!(
        backend = %config.exchange_backend,
        poll_interval_ms = config.poll_interval_ms,
        feed = %config.signal_feed_url,
        "Copy engine spawned"
    );

    // --- Reporting API ---
    let state = AppState {
        store: store.clone(),
        ledger: store,
        exchange,
        master_key: config.master_key.clone(),
        api_token: config.api_token.clone(),
        metrics_handle,
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}
