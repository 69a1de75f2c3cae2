mod common;

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use common::push_client;
use push_gateway_service::handlers::register_routes;
use push_gateway_service::{DeviceRegistry, InMemoryDeviceRegistry};
use serde_json::Value;
use tokio::io::AsyncReadExt;

macro_rules! app {
    ($client:expr, $registry:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($client.clone()))
                .app_data(web::Data::new($registry.clone()))
                .configure(register_routes),
        )
        .await
    };
}

fn registry() -> Arc<dyn DeviceRegistry> {
    Arc::new(InMemoryDeviceRegistry::new())
}

#[actix_web::test]
async fn test_register_device_and_list() {
    let (client, _gateways) = push_client(Vec::new());
    let registry = registry();
    let app = app!(client, registry);

    let token = "AB".repeat(32);
    let req = test::TestRequest::put()
        .uri("/push/device/")
        .set_form(vec![("token", token.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(test::read_body(resp).await, "ok");

    let req = test::TestRequest::get().uri("/push/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let body = std::str::from_utf8(&body).unwrap();
    assert!(body.starts_with("<h1>Registered devices</h1>"));
    assert!(body.contains(&format!("<strong>{}</strong>", "ab".repeat(32))));
}

#[actix_web::test]
async fn test_register_invalid_token_is_rejected() {
    let (client, _gateways) = push_client(Vec::new());
    let registry = registry();
    let app = app!(client, registry);

    let req = test::TestRequest::put()
        .uri("/push/device/")
        .set_form(vec![("token", "not-hex")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 400);
    assert!(registry.list().await.is_empty());
}

#[actix_web::test]
async fn test_send_notification_reaches_gateway() {
    let (client, mut gateways) = push_client(Vec::new());
    let registry = registry();
    let app = app!(client, registry);
    client.start();
    assert!(client.await_ready(Duration::from_secs(2)).await);
    let mut gateway = gateways.recv().await.unwrap();

    let token = "0f".repeat(32);
    let req = test::TestRequest::post()
        .uri("/push/device/")
        .set_form(vec![("token", token.as_str()), ("msg", "hello")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let mut header = [0u8; 45];
    tokio::time::timeout(Duration::from_secs(2), gateway.read_exact(&mut header))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(header[0], 1);
    assert_eq!(&header[11..43], &[0x0f; 32]);

    let len = usize::from(u16::from_be_bytes([header[43], header[44]]));
    let mut payload = vec![0u8; len];
    gateway.read_exact(&mut payload).await.unwrap();
    let payload: Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(payload["aps"]["alert"], "hello");
    assert_eq!(payload["aps"]["sound"], "default");

    client.stop().await;
}

#[actix_web::test]
async fn test_send_empty_message_is_rejected() {
    let (client, _gateways) = push_client(Vec::new());
    let registry = registry();
    let app = app!(client, registry);

    let token = "0f".repeat(32);
    let req = test::TestRequest::post()
        .uri("/push/device/")
        .set_form(vec![("token", token.as_str()), ("msg", "")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Validation error: Alert must not be empty");
}

#[actix_web::test]
async fn test_send_without_message_field_is_rejected() {
    let (client, _gateways) = push_client(Vec::new());
    let registry = registry();
    let app = app!(client, registry);

    let token = "0f".repeat(32);
    let req = test::TestRequest::post()
        .uri("/push/device/")
        .set_form(vec![("token", token.as_str())])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_status_reports_connection() {
    let (client, _gateways) = push_client(Vec::new());
    let registry = registry();
    let app = app!(client, registry);

    let req = test::TestRequest::get().uri("/push/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["connected"], false);
    assert_eq!(body["state"], "disconnected");
    assert!(body["last_error"].is_null());

    client.start();
    assert!(client.await_ready(Duration::from_secs(2)).await);

    let req = test::TestRequest::get().uri("/push/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["connected"], true);
    assert_eq!(body["state"], "connected");

    client.stop().await;
}
