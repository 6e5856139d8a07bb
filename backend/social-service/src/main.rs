use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use social_service::config::Config;
use social_service::domain::ContentKind;
use social_service::handlers;
use social_service::repository::{ContentStore, InMemoryStore, PgStore};
use social_service::services::{LocalMediaStore, MediaStore};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler, waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,social_service=debug".into());

    if json {
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

async fn connect_store(config: &Config) -> Result<Arc<dyn ContentStore>> {
    let Some(url) = &config.database.url else {
        warn!("⚠️  DATABASE_URL not set, using in-memory store (development only)");
        return Ok(Arc::new(InMemoryStore::new()));
    };

    let connect_options = PgConnectOptions::from_str(url)
        .context("Failed to parse DATABASE_URL")?
        .statement_cache_capacity(0);

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;

    sqlx::query("SELECT 1")
        .execute(&pg_pool)
        .await
        .context("Failed to verify database connection")?;
    info!("✅ Database pool created and verified");

    let store = PgStore::new(pg_pool);
    store
        .run_migrations()
        .await
        .context("Failed to run database migrations")?;
    info!("✅ Database migrations completed");

    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.app.is_production());

    info!("🔧 Starting social-service");
    info!(
        "✅ Configuration loaded: env={}, http_port={}",
        config.app.env, config.app.http_port
    );

    let store = connect_store(&config).await?;
    let media: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(
        &config.uploads.dir,
        &config.uploads.public_prefix,
    ));

    let services = social_service::build_services(&config, store, media);
    info!(
        inline = config.fanout.inline,
        capacity = config.fanout.queue_capacity,
        "✅ Follower fan-out ready"
    );

    // Repair any counter drift left by an unclean shutdown.
    for kind in [ContentKind::Post, ContentKind::Comment] {
        if let Err(err) = services.state.counters.reconcile_counters(kind).await {
            warn!(kind = %kind, error = %err, "Counter reconciliation failed");
        }
    }

    let http_addr = format!("{}:{}", config.app.host, config.app.http_port);
    let state = web::Data::new(services.state.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind(&http_addr)
    .context("Failed to bind HTTP server")?
    .disable_signals()
    .run();

    info!("🚀 HTTP server listening on http://{}", http_addr);

    let handle = server.handle();
    let server_task = tokio::spawn(server);

    shutdown_signal().await;
    info!("Shutdown signal received, stopping HTTP server");
    handle.stop(true).await;

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "HTTP server exited with error"),
        Err(err) => warn!(error = %err, "HTTP server task failed"),
    }

    services.shutdown().await;
    info!("👋 social-service stopped");
    Ok(())
}
