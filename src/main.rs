//! POTD Back binary entrypoint wiring the command API, the background jobs
//! and the document store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use potd_back::{
    config::AppConfig,
    dao::kv_store::FileStore,
    export::JsonSheetSink,
    gateway::MessagingGateway,
    routes,
    services::periodic,
    state::{
        AppState, Collaborators, SharedState,
        clock::SystemClock,
        ids::UuidGenerator,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let collaborators = Collaborators {
        store: Arc::new(FileStore::new(config.documents_dir())),
        gateway: build_gateway(&config)?,
        export: Arc::new(JsonSheetSink::new(config.export_path.clone())),
        clock: Arc::new(SystemClock::new(config.utc_offset)),
        ids: Arc::new(UuidGenerator),
    };

    let app_state = AppState::load(config, collaborators)
        .await
        .context("loading stored state")?;
    {
        let driver = app_state.driver().await;
        info!(
            season = driver.season.current_season,
            problems = driver.season.problems().count(),
            ungraded = driver.season.ungraded_answers().len(),
            scheduled = driver.scheduled_messages().len(),
            "state restored"
        );
    }

    let jobs = periodic::spawn_background_jobs(app_state.clone());
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    for job in jobs {
        job.abort();
    }
    Ok(())
}

/// Talk to the chat bridge when one is configured, otherwise only log traffic.
fn build_gateway(config: &AppConfig) -> anyhow::Result<Arc<dyn MessagingGateway>> {
    #[cfg(feature = "webhook-gateway")]
    {
        if let Some(url) = config.gateway_url.as_deref() {
            let gateway =
                potd_back::gateway::WebhookGateway::new(url, config.gateway_token.clone())
                    .context("building webhook gateway")?;
            info!(%url, "using webhook gateway");
            return Ok(Arc::new(gateway));
        }
    }

    info!(
        attachments = %config.attachments_dir().display(),
        "no gateway configured; outgoing messages are only logged"
    );
    Ok(Arc::new(potd_back::gateway::LogGateway::new(
        config.attachments_dir(),
    )))
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
                tracing::warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
