use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use nova_apns_binary::{ApnsConfig, PushClient};
use push_gateway_service::{
    feedback::prune_stale_devices, handlers::register_routes, DeviceRegistry,
    InMemoryDeviceRegistry, ServiceConfig,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,nova_apns_binary=debug".into()),
    );

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("Starting push gateway service");

    let config = ServiceConfig::from_env().context("Invalid service configuration")?;
    let apns_config = ApnsConfig::from_env().context("Invalid APNs configuration")?;

    let client = Arc::new(PushClient::new(&apns_config).context("Failed to build APNs client")?);

    tracing::info!("Connecting to APNs ...");
    client.start();
    if !client.await_ready(config.ready_timeout()).await {
        client.stop().await;
        anyhow::bail!(
            "APNs gateway not reachable within {}s",
            config.apns_ready_timeout_secs
        );
    }

    let registry: Arc<dyn DeviceRegistry> = Arc::new(InMemoryDeviceRegistry::new());

    let feedback_client = client.clone();
    let feedback_registry = registry.clone();
    let poll_timeout = config.feedback_poll_timeout();
    tokio::spawn(async move {
        prune_stale_devices(&feedback_client, feedback_registry.as_ref(), poll_timeout).await;
    });

    let addr = config.bind_addr();
    tracing::info!("Starting HTTP server on {}", addr);

    let app_client = client.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_client.clone()))
            .app_data(web::Data::new(registry.clone()))
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(|| async { "OK" }))
            .configure(register_routes)
    })
    .bind(&addr)?
    .run()
    .await?;

    client.stop().await;
    Ok(())
}
