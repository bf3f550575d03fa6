//! Arcade floor node entrypoint wiring the store, background tasks, REST and SSE layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use arcade_floor_back::{
    config::AppConfig,
    dao::venue_store::MemoryVenueStore,
    routes,
    services::{
        announcement_service,
        background::BackgroundTask,
        expiry_detector,
        playback::{PlaybackLimits, PlaybackQueue},
        speech, station_feed,
    },
    state::{AppState, SharedState},
};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backends = speech::backends_from_config(&config).context("building audio backends")?;
    let limits = PlaybackLimits {
        output_timeout: config.playback.output_timeout,
        fallback_timeout: config.playback.fallback_timeout,
    };
    let playback = PlaybackQueue::new(backends, limits);
    let app_state = AppState::new(config, playback);

    let mut tasks = Vec::new();
    tasks.extend(start_storage(app_state.clone()).await?);
    tasks.push(station_feed::spawn(app_state.clone()));
    tasks.push(announcement_service::spawn_feed(app_state.clone()));
    tasks.push(expiry_detector::spawn(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting floor node");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    for task in tasks {
        info!(task = task.name(), "stopping background task");
        task.stop().await;
    }

    Ok(())
}

/// Install the venue store: MongoDB under supervision when `MONGO_URI` is set, otherwise the
/// in-process store.
async fn start_storage(state: SharedState) -> anyhow::Result<Option<BackgroundTask>> {
    #[cfg(feature = "mongo-store")]
    if env::var_os("MONGO_URI").is_some() {
        use arcade_floor_back::{
            dao::{
                storage::StorageError,
                venue_store::{
                    VenueStore,
                    mongodb::{MongoConfig, MongoVenueStore},
                },
            },
            services::storage_supervisor,
        };

        let mongo = MongoConfig::from_env()
            .await
            .context("reading MongoDB configuration")?;
        info!(database = %mongo.database_name, "using MongoDB venue store");

        let task = BackgroundTask::spawn("storage-supervisor", move |shutdown| {
            storage_supervisor::run(state, shutdown, move || {
                let mongo = mongo.clone();
                async move {
                    let store = MongoVenueStore::connect(mongo)
                        .await
                        .map_err(StorageError::from)?;
                    Ok(Arc::new(store) as Arc<dyn VenueStore>)
                }
            })
        });
        return Ok(Some(task));
    }

    info!("MONGO_URI not set; using the in-memory venue store");
    state.set_store(Arc::new(MemoryVenueStore::new())).await;
    Ok(None)
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
