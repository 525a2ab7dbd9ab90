// In Apple Developer (Certificates, Identifiers & Profiles)
// - Create a Services ID and enable Sign in with Apple
// - Register Return URL: https://your-domain/auth/callback
// - Create a key for Sign in with Apple and download AuthKey_XXXXXXXXXX.p8
// Apple only redirects to https, so run this behind a TLS proxy or tunnel.
// Set .env file
// ```.env
// client_id="com.example.service"
// team_id="TEAMID1234"
// key_id="KEYID12345"
// private_key_path="./AuthKey_KEYID12345.p8"
// redirect_uri="https://your-domain/auth/callback"
// ```
// finally ```cargo run --example axum_server```
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use http::StatusCode;
use serde::Deserialize;
use tiny_apple_sign_in::{
    client::AppleAuth,
    code::{CodeRequest, UnCheckedCodeResponse},
    config::{AppleScope, ConfigBuilder, ResponseMode},
    id_token::KeySelection,
    state::{Nonce, StateToken},
    token::RefreshToken,
};
use tracing::{error, info};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log settings
    tracing_subscriber::fmt::init();

    // Read environment
    let client_id = read_env("client_id")?;
    let team_id = read_env("team_id")?;
    let key_id = read_env("key_id")?;
    let private_key_path = read_env("private_key_path")?;
    let redirect_uri = read_env("redirect_uri")?;

    // Apple requires form_post once any scope is requested
    let config = ConfigBuilder::new()
        .client_id(&client_id)
        .team_id(&team_id)
        .key_id(&key_id)
        .private_key_path(&private_key_path)
        .redirect_uri(&redirect_uri)
        .scopes([AppleScope::Name, AppleScope::Email])
        .response_mode(ResponseMode::FormPost)
        .key_selection(KeySelection::MatchKid)
        .audience(&client_id)
        .build();

    let app_state = AppState::new(AppleAuth::new(config));
    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .context("Failed to bind")?;
    // '/': A path to start auth (redirects to Apple)
    // '/auth/callback': Return URL registered with Apple, receives a form POST
    let app = Router::new()
        .route("/", get(start_auth))
        .route("/auth/callback", post(call_back))
        .route("/refresh", post(refresh_token))
        .with_state(Arc::new(app_state));

    axum::serve(listener, app).await.context("Server error")?;
    anyhow::Ok(())
}

static COOKIE_KEY: &str = "apple_state";

async fn start_auth(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, StatusCode> {
    let state = StateToken::new().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let nonce = Nonce::new();

    // Cookie_Key -- Session_Key
    //               Session_Key -- (state, nonce) (in memory or redis)
    let session_key = Uuid::new_v4().to_string();
    // The callback is a cross-site POST, so the cookie must be SameSite=None
    let cookie = Cookie::build((COOKIE_KEY, session_key.clone()))
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::None);
    app_state
        .sessions
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .insert(session_key, (state.clone(), nonce.clone()));

    let url = CodeRequest::new(app_state.auth.config())
        .with_state(&state)
        .with_nonce(&nonce)
        .into_url()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok((jar.add(cookie), Redirect::to(&url)))
}

async fn call_back(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    body: String,
) -> Result<impl IntoResponse, StatusCode> {
    let code_res = UnCheckedCodeResponse::from_form(&body).map_err(|e| {
        error!("Failed to parse callback: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    if let Some(user) = code_res.user() {
        // Apple sends the user's name only on the first sign in
        info!("First sign in, user: {}", user);
    }

    let session_key = jar.get(COOKIE_KEY).ok_or(StatusCode::BAD_REQUEST)?.value();
    let (state, nonce) = app_state
        .sessions
        .lock()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .remove(session_key)
        .ok_or(StatusCode::BAD_REQUEST)?;

    let code = code_res
        .exchange_with_code(state.value())
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let tokens = app_state
        .auth
        .authorization_token(&code)
        .await
        .map_err(|e| {
            error!("Failed to exchange code: {}", e);
            StatusCode::BAD_GATEWAY
        })?;
    let id_token = tokens.id_token().ok_or(StatusCode::BAD_GATEWAY)?;

    let claims = app_state
        .auth
        .verify_id_token(id_token.value())
        .await
        .map_err(|e| {
            error!("Failed to verify IDToken: {}", e);
            StatusCode::UNAUTHORIZED
        })?;
    claims
        .verify_nonce(&nonce)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    Ok((StatusCode::OK, Json(claims)))
}

// Refresh token handler
// Recommend get refresh_token from secure database in production code
async fn refresh_token(
    State(app_state): State<Arc<AppState>>,
    Json(token): Json<Token>,
) -> Result<impl IntoResponse, StatusCode> {
    let res = app_state
        .auth
        .refresh_authorization_token(&RefreshToken::new(&token.token))
        .await
        .map_err(|e| {
            error!("Failed to refresh token: {}", e);
            StatusCode::BAD_GATEWAY
        })?;
    Ok((StatusCode::OK, Json(res)))
}

// Get env from .env file
fn read_env(key: &str) -> anyhow::Result<String> {
    dotenvy::var(key).with_context(|| format!("Failed to read env {}", key))
}

struct AppState {
    auth: AppleAuth,
    sessions: Mutex<HashMap<String, (StateToken, Nonce)>>,
}

impl AppState {
    fn new(auth: AppleAuth) -> Self {
        Self {
            auth,
            sessions: Mutex::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Token {
    token: String,
}
