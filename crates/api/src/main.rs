mod commands;
mod config;
mod dispatch;
mod error;
mod format;
mod handlers;
mod hub;
mod middleware;
mod models;
mod services;
mod state;
mod stores;
#[cfg(test)]
mod test_utils;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use axum::{Router, http};
use chrono::Utc;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::Config,
    services::TelegramNotifier,
    state::AppState,
    stores::{RedisAtomicStore, Stores},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider before any TLS operations
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    let config = envy::prefixed("AUTHBOT_").from_env::<Config>()?;

    // Initialize Sentry for error tracking (must be done early, guard must stay alive)
    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(config.env.clone().into()),
                ..Default::default()
            },
        ))
    });

    // Set up tracing: JSON in production, human-readable otherwise
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    let redis = redis::Client::open(config.redis_url.as_str())?;
    let stores = Stores::new(Arc::new(RedisAtomicStore::new(redis)), &config);
    stores
        .record_start(&config, Utc::now().timestamp())
        .await?;

    let notifier = TelegramNotifier::new(
        &config.telegram_api_url,
        &config.token,
        Duration::from_millis(config.send_timeout),
    )?;

    let state = AppState::new(config.clone(), stores, Arc::new(notifier));

    if let Some((hub_redis, channel)) = config.hub_subscription()? {
        let client = redis::Client::open(hub_redis.as_str())?;
        let dispatcher = state.dispatcher.clone();
        tokio::spawn(async move {
            if let Err(e) = hub::run(client, channel, dispatcher).await {
                tracing::error!("hub subscriber failed: {:?}", e);
            }
        });
    }

    // Request ID header name
    let x_request_id = http::HeaderName::from_static("x-request-id");

    let mut app = Router::new()
        .nest("/health", handlers::health::router())
        .nest(
            "/authbot",
            handlers::auth::router().merge(handlers::webhook::router()),
        );
    if config.session_route {
        app = app.nest("/authbot-session", handlers::auth::session_router());
    }

    let app = app
        .with_state(state)
        // Request ID: generate UUID, include in logs, return in response
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &http::Request<axum::body::Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB limit

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(bot = %config.bot, "Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
