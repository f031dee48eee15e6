//! API Tests
//!
//! These tests drive the axum router end to end with in-memory collaborators:
//! - Request schemas and error bodies
//! - Provision / unprovision / OTA responses
//! - CORS preflight and unknown paths
//! - Firmware download through capability URLs

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use fleet_bridge::backends::{MemoryBlobStore, MemoryBroker, MemoryIssuer};
use fleet_bridge::{BridgeError, StaticTrustAnchor};
use fleet_core::{AccessPolicy, UrlSigner};
use fleet_plane::{
    create_router, AppState, FirmwareLocation, LifecycleManager, MemoryStore, OtaDispatcher,
    PlaneConfig,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const ROOT_CA: &str = "-----BEGIN CERTIFICATE-----\nroot\n-----END CERTIFICATE-----\n";
const FIRMWARE: &[u8] = b"firmware-image-v1";

// =============================================================================
// Test Helpers
// =============================================================================

struct TestApp {
    router: Router,
    broker: Arc<MemoryBroker>,
    issuer: Arc<MemoryIssuer>,
}

fn test_app() -> TestApp {
    test_app_with(PlaneConfig::default())
}

fn test_app_with(config: PlaneConfig) -> TestApp {
    let issuer = Arc::new(MemoryIssuer::new(&config.region, &config.account_id));
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(MemoryBlobStore::new(
        config.firmware_endpoint(),
        UrlSigner::from_bytes("api-test", &[11u8; 32]),
    ));
    blobs.put_object(&config.firmware_bucket, &config.firmware_key, FIRMWARE.to_vec());
    let broker = Arc::new(MemoryBroker::new());

    let lifecycle = LifecycleManager::new(
        issuer.clone(),
        store.clone(),
        Arc::new(StaticTrustAnchor::new(ROOT_CA)),
        AccessPolicy::new(&config.policy_name, &config.region, &config.account_id),
    );
    let dispatcher = OtaDispatcher::new(
        blobs.clone(),
        broker.clone(),
        FirmwareLocation::new(&config.firmware_bucket, &config.firmware_key),
        &config.command_topic_base,
    );

    let state = Arc::new(AppState {
        lifecycle,
        dispatcher,
        store,
        blob_store: blobs,
        config,
    });

    TestApp {
        router: create_router(state),
        broker,
        issuer,
    }
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    (status, bytes.to_vec())
}

async fn post_json(app: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let (status, bytes) = send(app, Method::POST, uri, Some(body)).await;
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

// =============================================================================
// Provisioning
// =============================================================================

#[tokio::test]
async fn test_provision_then_already_provisioned() {
    let app = test_app();

    let (status, first) = post_json(&app.router, "/provisioning", r#"{"device_id":"ESP32-001"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["message"], "Device provisioned successfully");
    assert_eq!(first["root_ca"], ROOT_CA);
    assert!(first["device_cert"].as_str().unwrap().contains("BEGIN CERTIFICATE"));

    let (status, second) = post_json(&app.router, "/provisioning", r#"{"device_id":"ESP32-001"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["message"], "Device already provisioned");
    assert_eq!(second["device_cert"], first["device_cert"]);
    assert_eq!(second["private_key"], first["private_key"]);
    assert_eq!(app.issuer.certificate_count(), 1);
}

#[tokio::test]
async fn test_provision_missing_device_id() {
    let app = test_app();

    for body in [r#"{}"#, r#"{"device_id":""}"#, r#"{"device_id":null}"#] {
        let (status, json) = post_json(&app.router, "/provisioning", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(json["code"], "INVALID_REQUEST");
        assert_eq!(json["error"], "Missing device ID");
    }
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = test_app();

    for body in ["{not json", r#"{"device_id":42}"#] {
        let (status, json) = post_json(&app.router, "/provisioning", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(json["code"], "INVALID_REQUEST");
    }
}

#[tokio::test]
async fn test_unprovision_unknown_device() {
    let app = test_app();

    let (status, json) = post_json(&app.router, "/unprovisioning", r#"{"device_id":"ghost"}"#).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert!(app.issuer.calls().is_empty());
}

#[tokio::test]
async fn test_unprovision_after_provision() {
    let app = test_app();
    post_json(&app.router, "/provisioning", r#"{"device_id":"ESP32-001"}"#).await;

    let (status, json) = post_json(&app.router, "/unprovisioning", r#"{"device_id":"ESP32-001"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Device unprovisioned successfully");
    assert_eq!(app.issuer.certificate_count(), 0);
}

// =============================================================================
// OTA
// =============================================================================

#[tokio::test]
async fn test_ota_success() {
    let app = test_app();

    let (status, json) = post_json(
        &app.router,
        "/ota",
        r#"{"device_id":"ESP32-001","command":"OTA"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "OTA command sent successfully");
    assert_eq!(json["device_id"], "ESP32-001");
    assert_eq!(json["topic"], "/topic/command/ESP32-001");
    assert_eq!(json["fw_crc"], fleet_core::firmware_crc32(FIRMWARE));
    assert!(json["fw_url"]
        .as_str()
        .unwrap()
        .starts_with("http://localhost:8080/v1/firmware/esp32-firmware-storage/iot_esp32_ota.bin?"));
    assert_eq!(app.broker.published_to("/topic/command/ESP32-001").len(), 1);
}

#[tokio::test]
async fn test_ota_unsupported_command() {
    let app = test_app();

    let (status, json) = post_json(
        &app.router,
        "/ota",
        r#"{"device_id":"ESP32-001","command":"weather"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "UNSUPPORTED_COMMAND");
    assert!(app.broker.published().is_empty());
}

#[tokio::test]
async fn test_ota_missing_command() {
    let app = test_app();

    let (status, json) = post_json(&app.router, "/ota", r#"{"device_id":"ESP32-001"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_ota_publish_failure() {
    let app = test_app();
    app.broker
        .fail_next_publish(BridgeError::Rejected("403 Forbidden".into()));

    let (status, json) = post_json(
        &app.router,
        "/ota",
        r#"{"device_id":"ESP32-001","command":"ota"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "PUBLISH_FAILED");
    assert!(json["error"].as_str().unwrap().contains("403 Forbidden"));
}

// =============================================================================
// Firmware Download
// =============================================================================

#[tokio::test]
async fn test_firmware_download_with_capability_url() {
    let app = test_app();
    let (_, json) = post_json(
        &app.router,
        "/ota",
        r#"{"device_id":"ESP32-001","command":"ota"}"#,
    )
    .await;
    let fw_url = json["fw_url"].as_str().unwrap();
    let path = fw_url.trim_start_matches("http://localhost:8080");

    let (status, bytes) = send(&app.router, Method::GET, path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, FIRMWARE);

    let forged = path.replace("X-Fleet-Expires=", "X-Fleet-Expires=9");
    let (status, _) = send(&app.router, Method::GET, &forged, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_firmware_download_nested_key() {
    let config = PlaneConfig {
        firmware_key: "releases/v2.bin".into(),
        ..PlaneConfig::default()
    };
    let app = test_app_with(config);

    let (status, json) = post_json(
        &app.router,
        "/ota",
        r#"{"device_id":"ESP32-001","command":"ota"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let fw_url = json["fw_url"].as_str().unwrap();
    let path = fw_url.trim_start_matches("http://localhost:8080");
    assert!(path.starts_with("/v1/firmware/esp32-firmware-storage/releases%2Fv2.bin?"));

    let (status, bytes) = send(&app.router, Method::GET, path, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, FIRMWARE);
}

#[tokio::test]
async fn test_firmware_download_without_signature() {
    let app = test_app();

    let (status, bytes) = send(
        &app.router,
        Method::GET,
        "/v1/firmware/esp32-firmware-storage/iot_esp32_ota.bin",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["code"], "FORBIDDEN");
}

// =============================================================================
// Preflight, Fallback, Health
// =============================================================================

#[tokio::test]
async fn test_options_answered_without_core_logic() {
    let app = test_app();

    for path in ["/provisioning", "/unprovisioning", "/ota"] {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK, "{}", path);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    assert!(app.issuer.calls().is_empty());
    assert!(app.broker.published().is_empty());
}

#[tokio::test]
async fn test_cors_preflight_headers() {
    let app = test_app();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/ota")
        .header(header::ORIGIN, "https://dashboard.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_cors_headers_on_responses() {
    let app = test_app();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header(header::ORIGIN, "https://dashboard.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_unknown_path() {
    let app = test_app();

    let (status, json) = post_json(&app.router, "/reprovisioning", r#"{"device_id":"x"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_REQUEST");
    assert_eq!(json["details"]["received_path"], "/reprovisioning");
}

#[tokio::test]
async fn test_wrong_method_on_known_path() {
    let app = test_app();

    for (method, path) in [
        (Method::GET, "/provisioning"),
        (Method::PUT, "/unprovisioning"),
        (Method::DELETE, "/ota"),
        (Method::POST, "/health"),
    ] {
        let (status, bytes) = send(&app.router, method.clone(), path, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", method, path);

        let json: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(json["error"], "Invalid HTTP method");
        assert_eq!(json["code"], "INVALID_REQUEST");
        assert_eq!(json["details"]["received_method"], method.as_str());
    }
    assert!(app.issuer.calls().is_empty());
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = test_app();

    let (status, bytes) = send(&app.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health["status"], "ok");

    post_json(&app.router, "/provisioning", r#"{"device_id":"ESP32-001"}"#).await;

    let (status, bytes) = send(&app.router, Method::GET, "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    let ready: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(ready["ready"], true);
    assert_eq!(ready["provisioned_devices"], 1);
    assert_eq!(ready["policy_name"], "IoT_Policy");
    assert_eq!(ready["firmware"], "esp32-firmware-storage/iot_esp32_ota.bin");
}
