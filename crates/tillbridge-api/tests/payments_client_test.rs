#![allow(clippy::unwrap_used)]
// Integration tests for `PaymentsClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tillbridge_api::{Error, ListLocationsParams, PaymentsClient, WebConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, PaymentsClient) {
    let server = MockServer::start().await;
    let client =
        PaymentsClient::with_client(reqwest::Client::new(), &WebConfig::new(server.uri())).unwrap();
    (server, client)
}

fn token() -> SecretString {
    "pst_test_token".to_string().into()
}

// ── Payment intents ─────────────────────────────────────────────────

#[tokio::test]
async fn test_retrieve_payment_intent() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_123"))
        .and(query_param("client_secret", "pi_123_secret_xyz"))
        .and(header("authorization", "Bearer pst_test_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_123",
            "amount": 1000,
            "currency": "usd",
            "status": "requires_payment_method",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let intent = client
        .retrieve_payment_intent("pi_123_secret_xyz", &token())
        .await
        .unwrap();
    assert_eq!(intent["id"], "pi_123");
    assert_eq!(intent["amount"], 1000);
}

#[tokio::test]
async fn test_retrieve_payment_intent_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "message": "No such payment_intent: 'pi_missing'" }
        })))
        .mount(&server)
        .await;

    let err = client
        .retrieve_payment_intent("pi_missing_secret_1", &token())
        .await
        .unwrap_err();

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "No such payment_intent: 'pi_missing'");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_keeps_raw_text() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/payment_intents/pi_1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client.retrieve_payment_intent("pi_1_secret_a", &token()).await;
    assert!(
        matches!(result, Err(Error::Deserialization { ref body, .. }) if body.contains("oops")),
        "expected Deserialization error, got: {result:?}"
    );
}

// ── Locations ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_locations_with_pagination() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/terminal/locations"))
        .and(query_param("limit", "2"))
        .and(query_param("starting_after", "tml_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [{ "id": "tml_2", "display_name": "Warehouse" }],
            "has_more": false,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let params = ListLocationsParams {
        limit: Some(2),
        starting_after: Some("tml_1".into()),
        ..ListLocationsParams::default()
    };
    let list = client.list_locations(&params, &token()).await.unwrap();
    assert_eq!(list["data"][0]["id"], "tml_2");
}

#[tokio::test]
async fn test_list_locations_server_error_keeps_plain_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/terminal/locations"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let err = client
        .list_locations(&ListLocationsParams::default(), &token())
        .await
        .unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "Service Unavailable");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}
