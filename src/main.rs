use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wedy::{
    api,
    config::Settings,
    payments::{PaymentGateway, PaymentOrchestrator, PaymeClient},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wedy=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting Wedy server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let service_context = Arc::new(ServiceContext::new(db_pool.clone(), &settings));

    // Bootstrap: free plan and first administrator
    service_context
        .tariff_service
        .ensure_free_plan(&settings.subscription)
        .await?;

    if let Some(admin) = &settings.admin {
        service_context.auth_service.ensure_admin(admin).await?;
    }

    let removed = service_context.auth_service.cleanup_expired_sessions().await?;
    if removed > 0 {
        tracing::debug!("Removed {} expired sessions", removed);
    }

    // Payme is optional; without credentials the payment routes answer 503
    let payments = match PaymeClient::new(&settings.payme) {
        Ok(client) => {
            tracing::info!(
                "Payme payments enabled ({} mode)",
                if settings.payme.test_mode { "test" } else { "live" }
            );
            let gateway: Arc<dyn PaymentGateway> = Arc::new(client);
            Some(Arc::new(PaymentOrchestrator::new(
                gateway,
                service_context.payment_repo.clone(),
                service_context.account_repo.clone(),
                service_context.tariff_repo.clone(),
                service_context.subscription_service.clone(),
            )))
        }
        Err(e) => {
            tracing::warn!("Payme payments disabled: {}", e);
            None
        }
    };

    let app = api::create_app(service_context, payments, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
