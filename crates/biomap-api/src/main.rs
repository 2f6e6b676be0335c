use std::sync::Arc;

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biomap_api::config::bind_address;
use biomap_api::{create_router, AppState, ServerArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biomap_api=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = ServerArgs::parse();
    let config = args.load_config().context("Failed to load configuration")?;

    if args.show_config {
        let mut entries: Vec<_> = config.to_inspection_map().into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, (value, source)) in entries {
            println!("{:<24} {:<40} {:?}", key, value, source);
        }
        return Ok(());
    }

    tracing::info!(
        port = config.port.value,
        metric_epsg = config.metric_epsg.value,
        raster = ?config.raster_path.value,
        municipalities = ?config.municipalities_path.value,
        "Starting Biomap API server"
    );

    // Layer loading reads whole files; keep it off the async workers
    let loader_config = config.clone();
    let state = tokio::task::spawn_blocking(move || AppState::from_config(&loader_config))
        .await
        .context("Startup loading task failed")?
        .context("Failed to initialise data sources")?;

    let origin = config
        .cors_origin
        .value
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin '{}'", config.cors_origin.value))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = create_router(Arc::new(state)).layer(cors);

    let addr = bind_address(&config);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Listening on {}", addr);
    tracing::info!("CORS enabled for {}", config.cors_origin.value);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
