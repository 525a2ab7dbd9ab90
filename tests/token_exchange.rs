use std::collections::HashMap;

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::json;
use tiny_apple_sign_in::{
    client::AppleAuth,
    client_secret::{CLIENT_SECRET_LIFETIME_SECS, ClientSecretClaims},
    code::Code,
    config::{Config, ConfigBuilder},
    error::Error,
    token::RefreshToken,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

const CLIENT_KEY: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client_key.p8");
const CLIENT_PUB: &[u8] = include_bytes!("fixtures/client_key_pub.pem");

fn builder(endpoint: &str) -> ConfigBuilder {
    Config::builder()
        .endpoint(endpoint)
        .client_id("com.example.service")
        .team_id("TEAM123456")
        .key_id("KEY1234567")
        .private_key_path(CLIENT_KEY)
}

fn token_body() -> serde_json::Value {
    json!({
        "access_token": "a1",
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "r1",
        "id_token": "h.p.s"
    })
}

async fn sent_form(server: &MockServer) -> HashMap<String, String> {
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    url::form_urlencoded::parse(&requests[0].body)
        .into_owned()
        .collect()
}

#[tokio::test]
async fn test_authorization_token_sends_one_post() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(1)
        .mount(&server)
        .await;

    let auth = AppleAuth::new(builder(&server.uri()).redirect_uri("https://x/cb").build());
    let res = auth
        .authorization_token(&Code::new("c0de"))
        .await
        .unwrap();

    assert_eq!(res.access_token().value(), "a1");
    assert_eq!(res.refresh_token().map(|v| v.value()), Some("r1"));
    assert_eq!(res.id_token().map(|v| v.value()), Some("h.p.s"));

    let form = sent_form(&server).await;
    assert_eq!(form.len(), 5);
    assert_eq!(form["client_id"], "com.example.service");
    assert_eq!(form["code"], "c0de");
    assert_eq!(form["grant_type"], "authorization_code");
    assert_eq!(form["redirect_uri"], "https://x/cb");

    let mut validation = Validation::new(Algorithm::ES256);
    validation.set_audience(&[server.uri()]);
    let secret = decode::<ClientSecretClaims>(
        &form["client_secret"],
        &DecodingKey::from_ec_pem(CLIENT_PUB).unwrap(),
        &validation,
    )
    .unwrap()
    .claims;
    assert_eq!(secret.iss, "TEAM123456");
    assert_eq!(secret.sub, "com.example.service");
    assert_eq!(secret.exp - secret.iat, CLIENT_SECRET_LIFETIME_SECS);
}

#[tokio::test]
async fn test_refresh_token_sends_one_post_without_redirect_uri() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "a2",
            "token_type": "Bearer",
            "expires_in": 3600,
            "id_token": "h.p.s"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = AppleAuth::new(builder(&server.uri()).build());
    let res = auth
        .refresh_authorization_token(&RefreshToken::new("r1"))
        .await
        .unwrap();
    assert_eq!(res.access_token().value(), "a2");
    assert!(res.refresh_token().is_none());

    let form = sent_form(&server).await;
    assert_eq!(form.len(), 4);
    assert_eq!(form["refresh_token"], "r1");
    assert_eq!(form["grant_type"], "refresh_token");
    assert!(!form.contains_key("redirect_uri"));
}

#[tokio::test]
async fn test_authorization_token_requires_redirect_uri_before_io() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(0)
        .mount(&server)
        .await;

    let auth = AppleAuth::new(builder(&server.uri()).build());
    let res = auth.authorization_token(&Code::new("c0de")).await;
    assert!(matches!(res, Err(Error::MissingParameter("redirect_uri"))));
}

#[tokio::test]
async fn test_provider_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "The code has expired or has been revoked."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = AppleAuth::new(builder(&server.uri()).build());
    let res = auth
        .refresh_authorization_token(&RefreshToken::new("r1"))
        .await;
    match res {
        Err(Error::Provider {
            status,
            error,
            description,
        }) => {
            assert_eq!(status.as_u16(), 400);
            assert_eq!(error, "invalid_grant");
            assert!(description.is_some());
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let auth = AppleAuth::new(builder(&server.uri()).redirect_uri("https://x/cb").build());
    let res = auth.authorization_token(&Code::new("c0de")).await;
    assert!(matches!(res, Err(Error::Parse)));
}

#[tokio::test]
async fn test_missing_key_file_fails_before_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(0)
        .mount(&server)
        .await;

    let auth = AppleAuth::new(
        builder(&server.uri())
            .private_key_path("/nonexistent/AuthKey.p8")
            .build(),
    );
    let res = auth
        .refresh_authorization_token(&RefreshToken::new("r1"))
        .await;
    assert!(matches!(res, Err(Error::KeyNotFound(_))));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    let auth = AppleAuth::new(builder("http://127.0.0.1:1").build());
    let res = auth
        .refresh_authorization_token(&RefreshToken::new("r1"))
        .await;
    assert!(matches!(res, Err(Error::Network)));
}
