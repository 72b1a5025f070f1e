use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use drive_core::{DRIVE_SCOPE, OAuthClient, OAuthError, OUT_OF_BAND_REDIRECT};

#[test]
fn authorize_url_includes_required_params() {
    let client = OAuthClient::with_endpoints(
        "https://oauth.example/auth",
        "https://oauth.example/token",
        "client-id",
        "secret",
    )
    .expect("client should build");
    let url = client.authorize_url(OUT_OF_BAND_REDIRECT, DRIVE_SCOPE, Some("state-token"));

    let query = url.query().unwrap_or_default();
    assert_eq!(url.path(), "/auth");
    assert!(query.contains("response_type=code"));
    assert!(query.contains("client_id=client-id"));
    assert!(query.contains("redirect_uri=urn%3Aietf%3Awg%3Aoauth%3A2.0%3Aoob"));
    assert!(query.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdrive"));
    assert!(query.contains("access_type=offline"));
    assert!(query.contains("state=state-token"));
}

#[tokio::test]
async fn exchange_code_posts_form_data() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .and(body_string_contains("client_id=client-id"))
        .and(body_string_contains("client_secret=secret"))
        .and(body_string_contains(
            "redirect_uri=http%3A%2F%2Flocalhost%2Fcallback",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "token",
            "token_type": "Bearer",
            "expires_in": 3599,
            "refresh_token": "refresh",
            "scope": "https://www.googleapis.com/auth/drive"
        })))
        .mount(&server)
        .await;

    let client = OAuthClient::with_endpoints(
        &format!("{}/auth", server.uri()),
        &format!("{}/token", server.uri()),
        "client-id",
        "secret",
    )
    .unwrap();
    let token = client
        .exchange_code("auth-code", "http://localhost/callback")
        .await
        .unwrap();

    assert_eq!(token.access_token, "token");
    assert_eq!(token.token_type, "Bearer");
    assert_eq!(token.expires_in, Some(3599));
    assert_eq!(token.refresh_token.as_deref(), Some("refresh"));
}

#[tokio::test]
async fn refresh_token_reports_api_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&server)
        .await;

    let client = OAuthClient::with_endpoints(
        &format!("{}/auth", server.uri()),
        &format!("{}/token", server.uri()),
        "client-id",
        "secret",
    )
    .unwrap();
    let err = client.refresh_token("stale").await.unwrap_err();

    assert!(err.is_invalid_grant());
    assert_eq!(err.error_code().as_deref(), Some("invalid_grant"));
    match err {
        OAuthError::Api { status, body } => {
            assert_eq!(status.as_u16(), 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
