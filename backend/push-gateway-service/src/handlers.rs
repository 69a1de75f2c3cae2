/// Push front-end handlers
use std::sync::Arc;

use actix_web::http::header::ContentType;
use actix_web::{web, HttpResponse};
use nova_apns_binary::{ConnectionState, ErrorFrame, PushClient};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::registry::DeviceRegistry;

#[derive(Debug, Deserialize)]
pub struct RegisterDeviceForm {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SendNotificationForm {
    pub token: String,
    pub msg: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub state: ConnectionState,
    pub last_error: Option<ErrorFrame>,
}

/// List registered devices
///
/// GET /push/
pub async fn index(registry: web::Data<Arc<dyn DeviceRegistry>>) -> HttpResponse {
    let devices = registry
        .list()
        .await
        .iter()
        .map(|token| format!("<strong>{}</strong>", token))
        .collect::<Vec<_>>()
        .join("<br/>");

    HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(format!("<h1>Registered devices</h1>{}", devices))
}

/// Register a device token
///
/// PUT /push/device/
pub async fn register_device(
    registry: web::Data<Arc<dyn DeviceRegistry>>,
    form: web::Form<RegisterDeviceForm>,
) -> Result<HttpResponse> {
    let token = registry.register(&form.token).await?;
    info!(token = %token, "Device registered");
    Ok(HttpResponse::Ok().body("ok"))
}

/// Queue a notification for a device
///
/// POST /push/device/
pub async fn send_notification(
    client: web::Data<Arc<PushClient>>,
    form: web::Form<SendNotificationForm>,
) -> Result<HttpResponse> {
    client.send(&form.token, &form.msg)?;
    Ok(HttpResponse::Ok().body("ok"))
}

/// Connection state of the push client
///
/// GET /push/status
pub async fn status(client: web::Data<Arc<PushClient>>) -> HttpResponse {
    HttpResponse::Ok().json(StatusResponse {
        connected: client.status(),
        state: client.state(),
        last_error: client.last_error(),
    })
}

/// Register routes
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/push")
            .route("/", web::get().to(index))
            .route("/device/", web::put().to(register_device))
            .route("/device/", web::post().to(send_notification))
            .route("/status", web::get().to(status)),
    );
}
