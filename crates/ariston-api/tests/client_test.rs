#![allow(clippy::unwrap_used, clippy::float_cmp)]
// Integration tests for `AristonClient` using wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ariston_api::{AristonClient, Error, PlantData, Timeouts, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

fn client(server: &MockServer) -> AristonClient {
    client_with_timeouts(server, Timeouts::default())
}

fn client_with_timeouts(server: &MockServer, timeouts: Timeouts) -> AristonClient {
    let transport = TransportConfig {
        timeouts,
        cookie_jar: None,
    };
    AristonClient::new(
        server.uri().parse().unwrap(),
        "user@example.com".into(),
        SecretString::from("hunter2".to_string()),
        &transport,
    )
    .unwrap()
}

fn plant_document() -> Value {
    json!({
        "mode": 1,
        "dhwTemp": { "value": 55.0, "min": 40.0, "max": 80.0 },
        "zone": {
            "comfortTemp": { "value": 20.5, "min": 10.0, "max": 30.0 },
            "mode": { "value": 2 },
            "derogaUntil": "9:15 AM"
        },
        "flameSensor": false
    })
}

async fn mount_login(server: &MockServer, plant_id: &str) {
    Mock::given(method("POST"))
        .and(path("/Account/Login"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("/PlantDashboard/Index/{plant_id}").as_str()),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/PlantDashboard/Index/{plant_id}")))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
}

// ── Session tests ───────────────────────────────────────────────────

#[tokio::test]
async fn login_resolves_plant_id_from_the_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Account/Login"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/PlantDashboard/Index/12345"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/PlantDashboard/Index/12345"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(client.base_url().as_str(), format!("{}/", server.uri()));
    assert_eq!(client.ensure_logged_in().await.unwrap(), "12345");
    assert!(client.is_logged_in().await);
    assert_eq!(client.plant_id().await.as_deref(), Some("12345"));

    // Already logged in: idempotent, no second login request (the mock
    // expectation of exactly one POST is verified on server shutdown).
    assert_eq!(client.ensure_logged_in().await.unwrap(), "12345");
}

#[tokio::test]
async fn login_without_a_dashboard_redirect_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Account/Login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client.ensure_logged_in().await;

    match result {
        Err(Error::Login { .. }) => {}
        other => panic!("expected Login error, got: {other:?}"),
    }
    assert!(!client.is_logged_in().await);
}

#[tokio::test]
async fn login_timeout_is_a_communication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Account/Login"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/PlantDashboard/Index/12345")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let timeouts = Timeouts {
        login: Duration::from_millis(50),
        ..Timeouts::default()
    };
    let client = client_with_timeouts(&server, timeouts);

    let result = client.ensure_logged_in().await;
    match result {
        Err(ref e @ Error::Timeout { .. }) => assert!(!e.is_auth_expired()),
        other => panic!("expected Timeout error, got: {other:?}"),
    }
    assert!(!client.is_logged_in().await);
}

// ── Dashboard read tests ────────────────────────────────────────────

#[tokio::test]
async fn get_plant_data_parses_the_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/PlantDashboard/GetPlantData/12345"))
        .respond_with(ResponseTemplate::new(200).set_body_json(plant_document()))
        .mount(&server)
        .await;

    let client = client(&server);
    let data = client.get_plant_data("12345").await.unwrap();

    assert_eq!(data.mode, 1);
    assert_eq!(data.dhw_temp.min, 40.0);
    assert_eq!(data.zone.comfort_temp.value, 20.5);
    assert_eq!(data.zone.mode.value, 2);
    assert_eq!(data.extra["flameSensor"], json!(false));
}

#[tokio::test]
async fn get_500_expires_the_session() {
    let server = MockServer::start().await;
    mount_login(&server, "12345").await;
    Mock::given(method("GET"))
        .and(path("/PlantDashboard/GetPlantData/12345"))
        .respond_with(ResponseTemplate::new(500).set_body_string("error page"))
        .mount(&server)
        .await;

    let client = client(&server);
    client.ensure_logged_in().await.unwrap();

    let result = client.get_plant_data("12345").await;
    match result {
        Err(ref e @ Error::SessionExpired) => assert!(e.is_auth_expired()),
        other => panic!("expected SessionExpired, got: {other:?}"),
    }
    assert!(!client.is_logged_in().await);
}

#[tokio::test]
async fn get_599_is_a_plain_communication_failure() {
    let server = MockServer::start().await;
    mount_login(&server, "12345").await;
    Mock::given(method("GET"))
        .and(path("/PlantDashboard/GetPlantData/12345"))
        .respond_with(ResponseTemplate::new(599))
        .mount(&server)
        .await;

    let client = client(&server);
    client.ensure_logged_in().await.unwrap();

    let result = client.get_plant_data("12345").await;
    match result {
        Err(Error::UnexpectedStatus { status: 599 }) => {}
        other => panic!("expected UnexpectedStatus 599, got: {other:?}"),
    }
    // The gateway giving up on the heater says nothing about the session.
    assert!(client.is_logged_in().await);
}

#[tokio::test]
async fn get_malformed_body_expires_the_session() {
    let server = MockServer::start().await;
    mount_login(&server, "12345").await;
    Mock::given(method("GET"))
        .and(path("/PlantDashboard/GetPlantData/12345"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let client = client(&server);
    client.ensure_logged_in().await.unwrap();

    let result = client.get_plant_data("12345").await;
    match result {
        Err(Error::Deserialization { ref body, .. }) => assert!(body.contains("login")),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
    assert!(!client.is_logged_in().await);
}

// ── Dashboard write tests ───────────────────────────────────────────

#[tokio::test]
async fn set_plant_data_posts_the_before_after_pair() {
    let server = MockServer::start().await;

    let mut echoed = plant_document();
    echoed["mode"] = json!(5);
    Mock::given(method("POST"))
        .and(path("/PlantDashboard/SetPlantAndZoneData/12345"))
        .and(query_param("zoneNum", "1"))
        .and(query_param("umsys", "si"))
        .and(body_partial_json(json!({
            "NewValue": { "mode": 5 },
            "OldValue": { "mode": 1 },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&echoed))
        .expect(1)
        .mount(&server)
        .await;

    let old_value: PlantData = serde_json::from_value(plant_document()).unwrap();
    let mut new_value = old_value.clone();
    new_value.mode = 5;

    let client = client(&server);
    let update = ariston_api::PlantUpdate {
        new_value,
        old_value,
    };
    let data = client.set_plant_data("12345", &update).await.unwrap();

    assert_eq!(data.mode, 5);
}

#[tokio::test]
async fn set_failure_keeps_the_session() {
    let server = MockServer::start().await;
    mount_login(&server, "12345").await;
    Mock::given(method("POST"))
        .and(path("/PlantDashboard/SetPlantAndZoneData/12345"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client(&server);
    client.ensure_logged_in().await.unwrap();

    let snapshot: PlantData = serde_json::from_value(plant_document()).unwrap();
    let update = ariston_api::PlantUpdate {
        new_value: snapshot.clone(),
        old_value: snapshot,
    };

    let result = client.set_plant_data("12345", &update).await;
    match result {
        Err(Error::UnexpectedStatus { status: 500 }) => {}
        other => panic!("expected UnexpectedStatus 500, got: {other:?}"),
    }
    assert!(client.is_logged_in().await);
}
