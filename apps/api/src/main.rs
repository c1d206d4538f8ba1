use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use security_cell::{AuditLog, RepositoryAuditSink};
use shared_config::{AppConfig, StorageBackend};
use shared_database::{ClinicRepository, InMemoryClinicStore, SupabaseClinicStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting clinic operations API server");

    let config = Arc::new(AppConfig::from_env());
    let repository = open_repository(&config)?;

    // Activity log entries are written off the request path
    let audit = AuditLog::spawn(
        Arc::new(RepositoryAuditSink::new(repository.clone())),
        config.audit_delivery_attempts,
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(config.clone(), repository, audit.clone())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    audit.flush().await;
    info!("Server stopped");
    Ok(())
}

fn open_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn ClinicRepository>> {
    match config.storage_backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(InMemoryClinicStore::new()))
        }
        StorageBackend::Supabase => {
            if !config.is_configured() {
                bail!("STORAGE_BACKEND=supabase needs SUPABASE_URL, SUPABASE_SERVICE_ROLE_KEY and SUPABASE_JWT_SECRET");
            }
            info!("Using Supabase storage at {}", config.supabase_url);
            let store = SupabaseClinicStore::new(config).context("failed to build Supabase client")?;
            Ok(Arc::new(store))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
