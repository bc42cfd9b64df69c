use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use immersion_api::background;
use immersion_api::config::ServerConfig;
use immersion_api::notifications::NotificationDispatcher;
use immersion_api::router::build_app_router;
use immersion_api::state::AppState;
use immersion_events::{
    EmailConfig, EmailGateway, EventBus, HttpSiretGateway, HttpSmsGateway, InMemoryEmailGateway,
    InMemorySmsGateway, MonitoringNotifier, OfflineSiretGateway, OutboxConfig, OutboxCrawler,
    SiretConfig, SiretGateway, SmsConfig, SmsGateway, SmtpEmailGateway,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "immersion_api=debug,immersion_events=debug,tower_http=debug".into()
    });
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json_logs {
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

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = immersion_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    immersion_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    immersion_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Gateways ---
    let email_gateway: Arc<dyn EmailGateway> = match EmailConfig::from_env() {
        Some(email_config) => Arc::new(
            SmtpEmailGateway::new(&email_config).expect("Invalid SMTP configuration"),
        ),
        None => {
            tracing::warn!("SMTP_HOST not set, emails are recorded but not sent");
            Arc::new(InMemoryEmailGateway::new())
        }
    };

    let sms_gateway: Arc<dyn SmsGateway> = match SmsConfig::from_env() {
        Some(sms_config) => {
            Arc::new(HttpSmsGateway::new(sms_config).expect("Invalid SMS configuration"))
        }
        None => {
            tracing::warn!("SMS_API_URL not set, SMS are recorded but not sent");
            Arc::new(InMemorySmsGateway::new())
        }
    };

    let siret_gateway: Arc<dyn SiretGateway> = match SiretConfig::from_env() {
        Some(siret_config) => {
            Arc::new(HttpSiretGateway::new(siret_config).expect("Invalid SIRENE configuration"))
        }
        None => {
            tracing::warn!("SIRENE_API_TOKEN not set, every well-formed siret is trusted");
            Arc::new(OfflineSiretGateway::trusting())
        }
    };

    // --- Event bus and outbox ---
    let event_bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();

    let dispatcher = NotificationDispatcher::new(
        pool.clone(),
        email_gateway,
        sms_gateway,
        config.magic_link.clone(),
        config.frontend_base_url.clone(),
    );
    let crawler = OutboxCrawler::new(
        pool.clone(),
        Arc::clone(&event_bus),
        OutboxConfig::from_env(),
        MonitoringNotifier::from_env(),
    )
    .with_subscriber(Arc::new(dispatcher));

    let crawler_cancel = cancel.clone();
    let crawler_handle = tokio::spawn(async move {
        crawler.run(crawler_cancel).await;
    });

    let event_log_handle = tokio::spawn(background::event_log::run(event_bus.subscribe()));
    let cleanup_handle = tokio::spawn(background::session_cleanup::run(
        pool.clone(),
        cancel.clone(),
    ));

    tracing::info!("Background services started (outbox crawler, event log, session cleanup)");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        siret_gateway,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    cancel.cancel();
    if tokio::time::timeout(grace, crawler_handle).await.is_err() {
        tracing::warn!("Outbox crawler did not stop in time");
    }
    let _ = tokio::time::timeout(grace, cleanup_handle).await;
    tracing::info!("Scheduled jobs stopped");

    // The crawler task owned the other bus handle.
    drop(event_bus);
    let _ = tokio::time::timeout(grace, event_log_handle).await;
    tracing::info!("Event log shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
