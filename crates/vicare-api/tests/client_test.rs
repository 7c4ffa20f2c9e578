#![allow(clippy::unwrap_used)]
// Integration tests for `ViClient` using wiremock.

use std::sync::Arc;

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vicare_api::{Error, MemoryTokenStore, OAuthConfig, Token, TokenManager, ViClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ViClient) {
    let server = MockServer::start().await;
    let oauth = OAuthConfig {
        client_id: "client".into(),
        redirect_uri: "http://localhost:4200/".into(),
        scope: "IoT User offline_access".into(),
        authorize_url: Url::parse(&format!("{}/authorize", server.uri())).unwrap(),
        token_url: Url::parse(&format!("{}/token", server.uri())).unwrap(),
    };
    let store = MemoryTokenStore::with_token(Token {
        access_token: "test-token".into(),
        refresh_token: "refresh".into(),
        expires_at: 4_000_000_000.0,
    });
    let auth = TokenManager::with_system_clock(
        reqwest::Client::new(),
        oauth,
        Some(Arc::new(store)),
    );

    let client = ViClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        Arc::new(auth),
    );
    (server, client)
}

fn features_path(suffix: &str) -> String {
    format!("/iot/v2/features/installations/123/gateways/7571381234567890/devices/0/features{suffix}")
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_installations_unwraps_envelope() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/iot/v2/equipment/installations"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": 123, "description": "Home", "installationType": "Residential" }
            ]
        })))
        .mount(&server)
        .await;

    let installations = client.installations().await.unwrap();

    assert_eq!(installations.len(), 1);
    assert_eq!(installations[0].id, 123);
    assert_eq!(installations[0].description.as_deref(), Some("Home"));
}

#[tokio::test]
async fn test_list_devices_for_gateway() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(
            "/iot/v2/equipment/installations/123/gateways/7571381234567890/devices",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                { "id": "gateway", "modelId": "Heatbox2", "deviceType": "vitoconnect", "status": "Online" },
                { "id": "0", "modelId": "E3_Vitodens_100", "deviceType": "heating", "status": "Online" }
            ]
        })))
        .mount(&server)
        .await;

    let devices = client.devices(123, "7571381234567890").await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[1].id, "0");
    assert_eq!(devices[1].device_type, "heating");
}

// ── Features ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_features() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(features_path("")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "feature": "heating.circuits.0.heating.curve",
                "isEnabled": true,
                "isReady": true,
                "properties": {
                    "slope": { "type": "number", "value": 1.4 },
                    "shift": { "type": "number", "value": 0 }
                },
                "commands": {
                    "setCurve": { "uri": "/x", "isExecutable": true, "params": {} }
                }
            }]
        })))
        .mount(&server)
        .await;

    let features = client.features(123, "7571381234567890", "0").await.unwrap();

    assert_eq!(features.len(), 1);
    assert_eq!(features[0].feature, "heating.circuits.0.heating.curve");
    assert_eq!(features[0].properties.len(), 2);
    assert_eq!(features[0].commands["setCurve"].uri.as_deref(), Some("/x"));
}

#[tokio::test]
async fn test_get_single_feature() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(features_path("/heating.dhw.temperature.main")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "feature": "heating.dhw.temperature.main",
                "properties": { "value": { "type": "number", "value": 50, "unit": "celsius" } }
            }
        })))
        .mount(&server)
        .await;

    let feature = client
        .feature(123, "7571381234567890", "0", "heating.dhw.temperature.main")
        .await
        .unwrap();

    assert_eq!(feature.feature, "heating.dhw.temperature.main");
}

// ── Error translation ───────────────────────────────────────────────

#[tokio::test]
async fn test_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(features_path("/nope")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "viErrorId": "abc",
            "statusCode": 404,
            "errorType": "FEATURE_NOT_FOUND",
            "message": "Feature not found"
        })))
        .mount(&server)
        .await;

    let result = client.feature(123, "7571381234567890", "0", "nope").await;

    match result {
        Err(Error::NotFound { message }) => assert_eq!(message, "Feature not found"),
        other => panic!("expected NotFound, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limited_carries_retry_after() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/iot/v2/equipment/gateways"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.gateways().await;

    assert!(
        matches!(result, Err(Error::RateLimited { retry_after_secs: 30 })),
        "expected RateLimited, got: {result:?}"
    );
}

#[tokio::test]
async fn test_unauthorized_is_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/iot/v2/equipment/gateways"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "Token expired" })))
        .mount(&server)
        .await;

    let result = client.gateways().await;

    assert!(result.as_ref().is_err_and(Error::is_auth_error), "got: {result:?}");
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/iot/v2/equipment/gateways"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.gateways().await;

    assert!(matches!(result, Err(Error::Server { status: 502, .. })));
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_execute_command_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(features_path("/heating.circuits.0.heating.curve/commands/setCurve")))
        .and(body_json(json!({ "slope": 1.6, "shift": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "success": true, "message": null, "reason": "COMMAND_EXECUTION_SUCCESS" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let uri = format!(
        "{}{}",
        server.uri(),
        features_path("/heating.circuits.0.heating.curve/commands/setCurve")
    );
    let payload = json!({ "slope": 1.6, "shift": 0 });
    let resp = client
        .execute(&uri, payload.as_object().unwrap())
        .await
        .unwrap();

    assert!(resp.success);
    assert_eq!(resp.reason.as_deref(), Some("COMMAND_EXECUTION_SUCCESS"));
}

#[tokio::test]
async fn test_execute_command_rejected_by_device_is_not_an_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/cmd"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "viErrorId": "req-1",
            "statusCode": 422,
            "errorType": "DEVICE_COMMUNICATION_ERROR",
            "message": "Device not reachable"
        })))
        .mount(&server)
        .await;

    let payload = serde_json::Map::new();
    let resp = client.execute("/cmd", &payload).await.unwrap();

    assert!(!resp.success);
    assert_eq!(resp.message.as_deref(), Some("Device not reachable"));
    assert_eq!(resp.reason.as_deref(), Some("DEVICE_COMMUNICATION_ERROR"));
}

#[tokio::test]
async fn test_execute_command_auth_failure_still_raises() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/cmd"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let result = client.execute("/cmd", &serde_json::Map::new()).await;

    assert!(matches!(result, Err(Error::Authentication { .. })));
}
