use std::{
    error::Error,
    fs::OpenOptions,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt,
};

use budget_sync::{
    AppConfig, AppState, CurrencyConverter, DEFAULT_RATE_API_URL, DEFAULT_RATE_TTL,
    HttpRateProvider, build_router, graceful_shutdown, logging_middleware,
};

/// The REST API server for budget_sync.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The address to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// The canonical name of the timezone used to decide which month "now"
    /// is, e.g. "Pacific/Auckland".
    #[arg(long, default_value = "Etc/UTC")]
    timezone: String,

    /// The base URL of the exchange rate API.
    #[arg(long, default_value = DEFAULT_RATE_API_URL)]
    fx_api_url: String,

    /// How many seconds fetched exchange rates are reused for.
    #[arg(long, default_value_t = DEFAULT_RATE_TTL.as_secs())]
    fx_cache_ttl_secs: u64,

    /// Send auth cookies over plain HTTP. Only use this for local development.
    #[arg(long)]
    insecure_cookies: bool,

    /// The secret the cookie signing key is derived from.
    #[arg(long, env = "SECRET", hide_env_values = true)]
    secret: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logging()?;

    let args = Args::parse();
    let addr = SocketAddr::new(args.host, args.port);

    let config = AppConfig {
        secure_cookies: !args.insecure_cookies,
        ..AppConfig::new(&args.secret, &args.timezone)
    };
    let currency_converter = CurrencyConverter::new(
        HttpRateProvider::new(&args.fx_api_url),
        Duration::from_secs(args.fx_cache_ttl_secs),
    );

    let conn = Connection::open(&args.db_path)?;
    let state = AppState::new(conn, config, currency_converter)?;

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(
        build_router(state).layer(middleware::from_fn(logging_middleware)),
    );

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    Ok(())
}

fn setup_logging() -> Result<(), Box<dyn Error>> {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")?;

    let debug_log = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();

    Ok(())
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // Errors are logged where they are turned into responses.
        .on_failure(());

    router.layer(tracing_layer)
}
