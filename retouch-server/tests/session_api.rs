//! End-to-end tests of the session API over real HTTP.

mod common;

use std::time::Duration;

use common::TestServer;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use retouch_core::{Color, RasterSurface};
use retouch_raster::image::encode_png;
use retouch_raster::PixelSurface;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png(width: u32, height: u32, color: Color) -> Vec<u8> {
    encode_png(PixelSurface::filled(width, height, color).pixels()).unwrap()
}

async fn create_session(client: &Client, server: &TestServer) -> String {
    let response = client
        .post(server.url("/api/sessions"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    body["session_id"].as_str().unwrap().to_string()
}

async fn upload(
    client: &Client,
    server: &TestServer,
    id: &str,
    file_name: &str,
    mime: &str,
    bytes: Vec<u8>,
) -> reqwest::Response {
    let part = Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .unwrap();
    client
        .post(server.session_url(id, "/upload"))
        .multipart(Form::new().part("image", part))
        .send()
        .await
        .unwrap()
}

async fn post_json(client: &Client, url: String, body: Value) -> (StatusCode, Value) {
    let response = client.post(url).json(&body).send().await.unwrap();
    let status = response.status();
    (status, response.json().await.unwrap_or(Value::Null))
}

async fn draw_line(client: &Client, server: &TestServer, id: &str, y: f32) {
    client
        .put(server.session_url(id, "/tool"))
        .json(&json!({ "tool": "brush", "color": "#0000ff", "width": 4.0 }))
        .send()
        .await
        .unwrap();
    for (phase, x) in [("down", 5.0), ("move", 30.0), ("up", 30.0)] {
        let (status, _) = post_json(
            client,
            server.session_url(id, "/pointer"),
            json!({ "phase": phase, "x": x, "y": y }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}

async fn canvas(client: &Client, server: &TestServer, id: &str) -> PixelSurface {
    let response = client
        .get(server.session_url(id, "/image"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "image/png"
    );
    let bytes = response.bytes().await.unwrap();
    let mut surface = PixelSurface::blank(1, 1);
    surface.load_from(&bytes).unwrap();
    surface
}

#[tokio::test]
async fn offline_edit_cycle() {
    let server = TestServer::start().await;
    let client = Client::new();
    let id = create_session(&client, &server).await;

    let response = upload(
        &client,
        &server,
        &id,
        "red.png",
        "image/png",
        png(40, 20, Color::rgb(255, 0, 0)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["width"], 40);
    assert_eq!(body["history"]["len"], 1);
    assert_eq!(body["remote"], Value::Null);

    draw_line(&client, &server, &id, 10.0).await;
    assert_eq!(
        canvas(&client, &server, &id).await.pixel(15, 10),
        Some([0, 0, 255, 255])
    );

    let (status, body) = post_json(&client, server.session_url(&id, "/undo"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"]["position"], 0);
    assert_eq!(
        canvas(&client, &server, &id).await.pixel(15, 10),
        Some([255, 0, 0, 255])
    );

    // History browser jump back to the stroke
    let (status, body) =
        post_json(&client, server.session_url(&id, "/restore/1"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"]["len"], 2);
    assert_eq!(body["history"]["entries"][1]["current"], true);

    server.shutdown().await;
}

#[tokio::test]
async fn rejects_non_image_upload() {
    let server = TestServer::start().await;
    let client = Client::new();
    let id = create_session(&client, &server).await;

    let response = upload(
        &client,
        &server,
        &id,
        "notes.txt",
        "text/plain",
        b"hello".to_vec(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let history: Value = client
        .get(server.session_url(&id, "/history"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["len"], 0);

    server.shutdown().await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn remote_filter_round_trip() {
    let service = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "image": { "filename": "image-1.png", "path": "/uploads/image-1.png" }
        })))
        .expect(1)
        .mount(&service)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/filter"))
        .and(body_json(json!({
            "filename": "image-1.png",
            "filter": "grayscale",
            "value": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "processedImage": "/processed/filtered-1.png"
        })))
        .expect(1)
        .mount(&service)
        .await;
    Mock::given(method("GET"))
        .and(path("/processed/filtered-1.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(png(10, 10, Color::rgb(128, 128, 128))),
        )
        .mount(&service)
        .await;

    let server = TestServer::with_gateway(&service.uri()).await;
    let client = Client::new();
    let id = create_session(&client, &server).await;

    let response = upload(
        &client,
        &server,
        &id,
        "red.png",
        "image/png",
        png(40, 20, Color::rgb(255, 0, 0)),
    )
    .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["remote"]["resource_id"], "image-1.png");

    let (status, body) = post_json(
        &client,
        server.session_url(&id, "/transform"),
        json!({ "operation": "filter", "params": { "kind": "grayscale" } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["resource_id"], "filtered-1.png");
    assert_eq!(body["session"]["width"], 10);
    assert_eq!(body["session"]["history"]["len"], 2);
    assert_eq!(body["session"]["remote"]["resource_id"], "filtered-1.png");

    assert_eq!(
        canvas(&client, &server, &id).await.pixel(5, 5),
        Some([128, 128, 128, 255])
    );

    server.shutdown().await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn failed_transform_leaves_state_unchanged() {
    let service = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "image": { "filename": "canvas-1.png", "path": "/uploads/canvas-1.png" }
        })))
        .mount(&service)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/rotate"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "Error rotating image" })),
        )
        .mount(&service)
        .await;

    let server = TestServer::with_gateway(&service.uri()).await;
    let client = Client::new();
    let id = create_session(&client, &server).await;
    draw_line(&client, &server, &id, 20.0).await;
    let before = canvas(&client, &server, &id).await;

    let (status, body) = post_json(
        &client,
        server.session_url(&id, "/transform"),
        json!({ "operation": "rotate", "params": { "angle_degrees": 90 } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("rotate"));
    assert!(message.contains("Error rotating image"));

    assert_eq!(canvas(&client, &server, &id).await, before);
    let summary: Value = client
        .get(server.session_url(&id, ""))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["history"]["len"], 1);
    assert_eq!(summary["pending"], false);

    // Still editable
    draw_line(&client, &server, &id, 40.0).await;

    server.shutdown().await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn save_does_not_touch_history() {
    let service = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/save-canvas"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "savedImage": "/processed/canvas-99.jpeg"
        })))
        .expect(1)
        .mount(&service)
        .await;

    let server = TestServer::with_gateway(&service.uri()).await;
    let client = Client::new();
    let id = create_session(&client, &server).await;
    draw_line(&client, &server, &id, 10.0).await;

    let (status, body) = post_json(
        &client,
        server.session_url(&id, "/save"),
        json!({ "format": "jpeg" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["saved"]["location"], "/processed/canvas-99.jpeg");

    let history: Value = client
        .get(server.session_url(&id, "/history"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["len"], 1);

    server.shutdown().await;
}

/// Service whose filter endpoint answers after a delay.
async fn slow_filter_service() -> MockServer {
    let service = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "image": { "filename": "image-1.png", "path": "/uploads/image-1.png" }
        })))
        .mount(&service)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/filter"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(1000))
                .set_body_json(json!({
                    "success": true,
                    "processedImage": "/processed/slow-1.png"
                })),
        )
        .expect(1)
        .mount(&service)
        .await;
    Mock::given(method("GET"))
        .and(path("/processed/slow-1.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(png(8, 8, Color::rgb(90, 90, 90))),
        )
        .mount(&service)
        .await;
    service
}

fn start_filter(
    client: &Client,
    server: &TestServer,
    id: &str,
) -> tokio::task::JoinHandle<(StatusCode, Value)> {
    let client = client.clone();
    let url = server.session_url(id, "/transform");
    tokio::spawn(async move {
        post_json(
            &client,
            url,
            json!({ "operation": "filter", "params": { "kind": "sepia" } }),
        )
        .await
    })
}

async fn wait_for_pending(client: &Client, server: &TestServer, id: &str) {
    for _ in 0..200 {
        let summary: Value = client
            .get(server.session_url(id, ""))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if summary["pending"] == true {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("transform never became pending");
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn transform_in_flight_refuses_edits() {
    let service = slow_filter_service().await;
    let server = TestServer::with_gateway(&service.uri()).await;
    let client = Client::new();
    let id = create_session(&client, &server).await;
    let response = upload(
        &client,
        &server,
        &id,
        "red.png",
        "image/png",
        png(40, 20, Color::rgb(255, 0, 0)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    client
        .put(server.session_url(&id, "/tool"))
        .json(&json!({ "tool": "brush" }))
        .send()
        .await
        .unwrap();

    let in_flight = start_filter(&client, &server, &id);
    wait_for_pending(&client, &server, &id).await;

    let (status, body) = post_json(
        &client,
        server.session_url(&id, "/pointer"),
        json!({ "phase": "down", "x": 5.0, "y": 5.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("pending"));

    let (status, _) = post_json(&client, server.session_url(&id, "/undo"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post_json(
        &client,
        server.session_url(&id, "/transform"),
        json!({ "operation": "rotate", "params": { "angle_degrees": 90 } }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = in_flight.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["history"]["len"], 2);
    assert_eq!(body["session"]["pending"], false);

    // Unfrozen again
    let (status, _) = post_json(
        &client,
        server.session_url(&id, "/pointer"),
        json!({ "phase": "down", "x": 5.0, "y": 5.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    server.shutdown().await;
}

#[tokio::test]
#[cfg_attr(
    target_os = "macos",
    ignore = "wiremock/reqwest system-configuration issue on macOS"
)]
async fn delete_during_transform_discards_result() {
    let service = slow_filter_service().await;
    let server = TestServer::with_gateway(&service.uri()).await;
    let client = Client::new();
    let id = create_session(&client, &server).await;
    upload(
        &client,
        &server,
        &id,
        "red.png",
        "image/png",
        png(40, 20, Color::rgb(255, 0, 0)),
    )
    .await;

    let in_flight = start_filter(&client, &server, &id);
    wait_for_pending(&client, &server, &id).await;

    let response = client
        .delete(server.session_url(&id, ""))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, body) = in_flight.await.unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("closed"));

    let response = client
        .get(server.session_url(&id, "/history"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    server.shutdown().await;
}

#[tokio::test]
async fn keyboard_shortcuts_drive_history() {
    let server = TestServer::start().await;
    let client = Client::new();
    let id = create_session(&client, &server).await;
    draw_line(&client, &server, &id, 10.0).await;
    draw_line(&client, &server, &id, 30.0).await;

    let (status, body) = post_json(
        &client,
        server.session_url(&id, "/keys"),
        json!({ "key": "z", "modifiers": { "meta": true } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["command"], "undo");
    assert_eq!(body["session"]["history"]["position"], 0);

    let (_, body) = post_json(
        &client,
        server.session_url(&id, "/keys"),
        json!({ "key": "Z", "modifiers": { "ctrl": true, "shift": true } }),
    )
    .await;
    assert_eq!(body["command"], "redo");
    assert_eq!(body["session"]["history"]["position"], 1);

    let (_, body) = post_json(
        &client,
        server.session_url(&id, "/keys"),
        json!({ "key": "z" }),
    )
    .await;
    assert_eq!(body["command"], Value::Null);

    // Save shortcut without a service
    let (status, _) = post_json(
        &client,
        server.session_url(&id, "/keys"),
        json!({ "key": "s", "modifiers": { "ctrl": true } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    server.shutdown().await;
}

#[tokio::test]
async fn health_reports_sessions() {
    let server = TestServer::start().await;
    let client = Client::new();
    create_session(&client, &server).await;

    let body: Value = client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["sessions"], 1);

    server.shutdown().await;
}
