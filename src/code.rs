//! This module handles the authorization request and the callback that carries the code.
//!
//! - `CodeRequest`: builds the `/auth/authorize` URL the user is redirected to.
//! - `UnCheckedCodeResponse`: the `code` and `state` Apple sends back, not yet checked.
//! - `Code`: an authorization code whose `state` has been checked.
//!
//! # Example
//! ```rust,no_run
//! use tiny_apple_sign_in::{code::CodeRequest, config::Config};
//!
//! let config = Config::builder()
//!     .client_id("com.example.service")
//!     .redirect_uri("https://example.com/auth/callback")
//!     .build();
//!
//! let url = CodeRequest::new(&config).into_url().unwrap();
//! println!("Auth URL: {}", url);
//! ```
//!
//! # Flow
//! 1. Generate a `StateToken` and pass it with `CodeRequest::with_state`.
//! 2. Redirect the user to the URL from `CodeRequest::into_url`.
//! 3. Apple redirects (or posts, with `response_mode=form_post`) back with `code` and `state`.
//! 4. Parse it into `UnCheckedCodeResponse` and call `exchange_with_code` with the stored state.
//! 5. Exchange the resulting `Code` for tokens.
use std::collections::HashMap;

use tracing::error;
use url::Url;

use crate::{
    config::{ClientID, Config, RedirectURI, ResponseMode, Scope, State},
    error::Error,
    state::{Nonce, StateToken},
};

/// Authorization code returned to the redirect URI.
#[derive(Debug, Clone, PartialEq)]
pub struct Code(pub(crate) String);

impl Code {
    /// Wraps a code obtained outside this crate (e.g. from a native app).
    pub fn new(value: &str) -> Self {
        Self(value.to_string())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl From<String> for Code {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Parameters of the `/auth/authorize` redirect.
#[derive(Debug, Clone)]
pub struct CodeRequest {
    authorize_endpoint: String,
    response_type: String,
    state: State,
    client_id: ClientID,
    redirect_uri: RedirectURI,
    scope: Scope,
    response_mode: Option<ResponseMode>,
    nonce: Option<Nonce>,
}

impl CodeRequest {
    pub fn new(config: &Config) -> Self {
        Self {
            authorize_endpoint: config.endpoint_url("/auth/authorize"),
            response_type: "code".to_string(),
            state: config.state.to_owned(),
            client_id: config.client_id.to_owned(),
            redirect_uri: config.redirect_uri.to_owned(),
            scope: config.scope.to_owned(),
            response_mode: config.response_mode,
            nonce: config.nonce.to_owned(),
        }
    }

    /// Uses a per-request state instead of the configured one.
    pub fn with_state(mut self, state: &StateToken) -> Self {
        self.state = State(state.value().to_string());
        self
    }

    /// Uses a per-request nonce instead of the configured one.
    pub fn with_nonce(mut self, nonce: &Nonce) -> Self {
        self.nonce = Some(nonce.to_owned());
        self
    }

    /// Serializes the request as an absolute URL.
    ///
    /// Query order is fixed: `response_type`, `state`, `client_id`, `redirect_uri`, `scope`,
    /// then `response_mode` and `nonce` when configured.
    pub fn into_url(&self) -> Result<String, Error> {
        if self.client_id.0.is_empty() {
            return Err(Error::MissingParameter("client_id"));
        }
        if self.redirect_uri.0.is_empty() {
            return Err(Error::MissingParameter("redirect_uri"));
        }

        let mut url = Url::parse(&self.authorize_endpoint).map_err(|e| {
            error!("Failed to parse url: {}", e);
            Error::URL
        })?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", &self.response_type)
                .append_pair("state", &self.state.0)
                .append_pair("client_id", &self.client_id.0)
                .append_pair("redirect_uri", &self.redirect_uri.0)
                .append_pair("scope", &self.scope.0);
            if let Some(response_mode) = self.response_mode {
                query.append_pair("response_mode", response_mode.as_str());
            }
            if let Some(nonce) = &self.nonce {
                query.append_pair("nonce", &nonce.0);
            }
        }
        Ok(url.to_string())
    }
}

/// A callback from Apple containing an unverified `code` and `state`.
/// Must be validated against the stored state before use.
#[derive(Debug, Clone)]
pub struct UnCheckedCodeResponse {
    state: String,
    code: Code,
    user: Option<String>,
}

impl UnCheckedCodeResponse {
    /// Parses a query-string callback (`response_mode=query`).
    pub fn from_url(response_url: &str) -> Result<Self, Error> {
        let url = Url::parse(response_url).map_err(|e| {
            error!("Failed to parse callback url: {}", e);
            Error::URL
        })?;
        Self::from_pairs(url.query_pairs().into_owned().collect())
    }

    /// Parses a form-encoded callback body (`response_mode=form_post`).
    pub fn from_form(body: &str) -> Result<Self, Error> {
        Self::from_pairs(
            url::form_urlencoded::parse(body.as_bytes())
                .into_owned()
                .collect(),
        )
    }

    fn from_pairs(mut params: HashMap<String, String>) -> Result<Self, Error> {
        let state = params.remove("state").ok_or(Error::Callback)?;
        let code = params.remove("code").ok_or(Error::Callback)?;
        Ok(Self {
            state,
            code: code.into(),
            user: params.remove("user"),
        })
    }

    /// The `user` JSON Apple posts on the first authorization only.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Returns the `Code` if `state` matches the value stored for this session.
    pub fn exchange_with_code(self, expected_state: &str) -> Result<Code, Error> {
        if self.state == expected_state {
            Ok(self.code)
        } else {
            Err(Error::StateMismatch)
        }
    }
}
