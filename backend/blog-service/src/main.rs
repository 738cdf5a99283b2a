use actix_web::{web, App, HttpServer};
use anyhow::Context;
use blog_service::config::{CacheBackend, Config, MediaBackend, StoreBackend};
use blog_service::db::{self, BlogStore, DbConfig, MemoryStore, PgStore};
use blog_service::handlers::{self, AppState};
use blog_service::media::{LocalMediaStore, MediaStore, S3MediaConfig, S3MediaStore};
use blog_service::middleware::{MetricsMiddleware, SessionMiddleware, SessionSettings};
use page_cache::{MemoryPageCache, PageCache, RedisPageCache};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info,sqlx=warn".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn BlogStore>> {
    match config.database.backend {
        StoreBackend::Postgres => {
            let pool = db::create_pool(DbConfig::from(&config.database))
                .await
                .context("Failed to create database pool")?;
            if config.database.run_migrations {
                db::run_migrations(&pool)
                    .await
                    .context("Failed to run database migrations")?;
            }
            Ok(Arc::new(PgStore::new(pool)))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn build_cache(config: &Config) -> Arc<dyn PageCache> {
    match config.cache.backend {
        CacheBackend::Redis => match RedisPageCache::connect(&config.cache.url).await {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                // pages render uncached without Redis; keep serving from memory
                tracing::warn!("Redis unavailable ({}), falling back to in-memory page cache", e);
                Arc::new(MemoryPageCache::new())
            }
        },
        CacheBackend::Memory => Arc::new(MemoryPageCache::new()),
    }
}

async fn build_media(config: &Config) -> Arc<dyn MediaStore> {
    match config.media.backend {
        MediaBackend::Local => Arc::new(LocalMediaStore::new(
            config.media.root.clone(),
            config.media.url.clone(),
        )),
        MediaBackend::S3 => Arc::new(
            S3MediaStore::from_config(S3MediaConfig {
                bucket: config.media.s3_bucket.clone(),
                region: config.media.s3_region.clone(),
                endpoint: config.media.s3_endpoint.clone(),
                public_url: config.media.s3_public_url.clone(),
            })
            .await,
        ),
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.log.json);
    blog_service::metrics::init();

    tracing::info!("Starting blog-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    let store = build_store(&config).await?;
    let cache = build_cache(&config).await;
    let media = build_media(&config).await;
    tracing::info!(
        store = ?config.database.backend,
        cache = cache.backend(),
        media = ?config.media.backend,
        page_ttl_secs = config.cache.page_ttl_secs,
        "Backends ready"
    );

    let state = web::Data::new(AppState::new(
        store,
        cache,
        media,
        Duration::from_secs(config.cache.page_ttl_secs),
    ));
    let session = SessionSettings {
        secret: config.session.secret.clone(),
        cookie_name: config.session.cookie_name.clone(),
        login_url: config.session.login_url.clone(),
    };
    let session_data = web::Data::new(session.clone());

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!("Listening on {}", bind_address);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(session_data.clone())
            .wrap(SessionMiddleware::new(session.clone()))
            .wrap(MetricsMiddleware)
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure)
    })
    .disable_signals()
    .shutdown_timeout(30);
    if config.app.workers > 0 {
        server = server.workers(config.app.workers);
    }

    let server = server
        .bind(&bind_address)
        .with_context(|| format!("Failed to bind {}", bind_address))?
        .run();
    let server_handle = server.handle();

    tokio::select! {
        result = server => {
            result.context("HTTP server failed")?;
        }
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received");
            server_handle.stop(true).await;
        }
    }

    tracing::info!("blog-service shutting down");
    Ok(())
}
