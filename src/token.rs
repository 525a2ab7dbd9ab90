//! Requests and responses for Apple's token endpoint (`/auth/token`).
//!
//! This module:
//! - TokenRequest: the form sent to exchange a `Code` or a `RefreshToken`.
//! - TokenResponse: the tokens Apple returns.
//! - AccessToken / RefreshToken / IDTokenRaw: opaque token values.
//!
//! Building a `TokenRequest` mints a new [`ClientSecret`] every time.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    client_secret::ClientSecret,
    code::Code,
    config::{ClientID, Config, RedirectURI},
    error::Error,
};

/// An OAuth 2.0 access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken(pub(crate) String);

impl AccessToken {
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Used to obtain new tokens without user interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshToken(pub(crate) String);

impl RefreshToken {
    pub fn new(value: &str) -> Self {
        Self(value.to_string())
    }
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// An encoded IDToken as returned by the token endpoint, not yet verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IDTokenRaw(pub(crate) String);

impl IDTokenRaw {
    pub fn new(value: &str) -> Self {
        Self(value.to_string())
    }
    pub fn value(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Grant {
    AuthorizationCode { code: Code, redirect_uri: RedirectURI },
    RefreshToken(RefreshToken),
}

/// A form POSTed to the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    token_endpoint: String,
    client_id: ClientID,
    client_secret: ClientSecret,
    grant: Grant,
}

impl TokenRequest {
    /// Builds an `authorization_code` grant.
    ///
    /// Requires `client_id` and `redirect_uri`, plus everything [`ClientSecret::mint`] requires.
    pub fn authorization_code(config: &Config, code: &Code) -> Result<Self, Error> {
        if config.client_id.0.is_empty() {
            return Err(Error::MissingParameter("client_id"));
        }
        if config.redirect_uri.0.is_empty() {
            return Err(Error::MissingParameter("redirect_uri"));
        }
        Ok(Self {
            token_endpoint: config.endpoint_url("/auth/token"),
            client_id: config.client_id.to_owned(),
            client_secret: ClientSecret::mint(config)?,
            grant: Grant::AuthorizationCode {
                code: code.to_owned(),
                redirect_uri: config.redirect_uri.to_owned(),
            },
        })
    }

    /// Builds a `refresh_token` grant. `redirect_uri` is not needed here.
    pub fn refresh_token(config: &Config, refresh_token: &RefreshToken) -> Result<Self, Error> {
        if config.client_id.0.is_empty() {
            return Err(Error::MissingParameter("client_id"));
        }
        Ok(Self {
            token_endpoint: config.endpoint_url("/auth/token"),
            client_id: config.client_id.to_owned(),
            client_secret: ClientSecret::mint(config)?,
            grant: Grant::RefreshToken(refresh_token.to_owned()),
        })
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    pub fn grant_type(&self) -> &str {
        match self.grant {
            Grant::AuthorizationCode { .. } => "authorization_code",
            Grant::RefreshToken(_) => "refresh_token",
        }
    }

    /// Form fields in the order they are sent.
    pub fn form(&self) -> Vec<(&'static str, &str)> {
        let mut form = vec![
            ("client_id", self.client_id.0.as_str()),
            ("client_secret", self.client_secret.value()),
        ];
        match &self.grant {
            Grant::AuthorizationCode { code, redirect_uri } => {
                form.push(("code", code.value()));
                form.push(("grant_type", self.grant_type()));
                form.push(("redirect_uri", redirect_uri.0.as_str()));
            }
            Grant::RefreshToken(refresh_token) => {
                form.push(("refresh_token", refresh_token.value()));
                form.push(("grant_type", self.grant_type()));
            }
        }
        form
    }
}

/// Tokens returned by `/auth/token`.
///
/// Only `access_token` is required.
/// Fields Apple adds beyond the typed ones are kept untouched in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    access_token: AccessToken,
    token_type: Option<String>,
    expires_in: Option<u64>,
    refresh_token: Option<RefreshToken>,
    id_token: Option<IDTokenRaw>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TokenResponse {
    pub fn access_token(&self) -> &AccessToken {
        &self.access_token
    }

    /// Typically "Bearer".
    pub fn token_type(&self) -> Option<&str> {
        self.token_type.as_deref()
    }

    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }

    /// Only present on `authorization_code` grants.
    pub fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh_token.as_ref()
    }

    pub fn id_token(&self) -> Option<&IDTokenRaw> {
        self.id_token.as_ref()
    }

    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }
}

/// Error payload of a rejected token request (RFC 6749 section 5.2).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProviderErrorBody {
    pub error: String,
    pub error_description: Option<String>,
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use crate::{
        code::Code,
        config::{Config, ConfigBuilder},
        error::Error,
    };

    use super::{RefreshToken, TokenRequest, TokenResponse};

    const CLIENT_KEY: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/client_key.p8");

    fn builder() -> ConfigBuilder {
        Config::builder()
            .client_id("com.example.service")
            .team_id("TEAM123456")
            .key_id("KEY1234567")
            .private_key_path(CLIENT_KEY)
    }

    #[test]
    fn test_code_request_form() {
        let config = builder().redirect_uri("https://example.com/cb").build();
        let req = TokenRequest::authorization_code(&config, &Code::new("c0de")).unwrap();

        assert_eq!(req.token_endpoint(), "https://appleid.apple.com/auth/token");
        let form = req.form();
        let keys: Vec<_> = form.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            ["client_id", "client_secret", "code", "grant_type", "redirect_uri"]
        );
        assert_eq!(form[0].1, "com.example.service");
        assert_eq!(form[1].1.split('.').count(), 3);
        assert_eq!(form[2].1, "c0de");
        assert_eq!(form[3].1, "authorization_code");
        assert_eq!(form[4].1, "https://example.com/cb");
    }

    #[test]
    fn test_refresh_request_form() {
        let config = builder().build();
        let req = TokenRequest::refresh_token(&config, &RefreshToken::new("r1")).unwrap();

        let form = req.form();
        let keys: Vec<_> = form.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            ["client_id", "client_secret", "refresh_token", "grant_type"]
        );
        assert_eq!(form[2].1, "r1");
        assert_eq!(form[3].1, "refresh_token");
    }

    #[test]
    fn test_code_request_requires_redirect_uri() {
        let config = builder().build();
        let res = TokenRequest::authorization_code(&config, &Code::new("c0de"));
        assert!(matches!(res, Err(Error::MissingParameter("redirect_uri"))));
    }

    #[test]
    fn test_refresh_request_does_not_require_redirect_uri() {
        let config = builder().build();
        assert!(TokenRequest::refresh_token(&config, &RefreshToken::new("r1")).is_ok());
    }

    #[test]
    fn test_requests_require_client_id() {
        let config = Config::builder().redirect_uri("https://example.com/cb").build();
        assert!(matches!(
            TokenRequest::authorization_code(&config, &Code::new("c0de")),
            Err(Error::MissingParameter("client_id"))
        ));
        assert!(matches!(
            TokenRequest::refresh_token(&config, &RefreshToken::new("r1")),
            Err(Error::MissingParameter("client_id"))
        ));
    }

    #[test]
    fn test_request_propagates_key_not_found() {
        let config = builder()
            .private_key_path("/nonexistent/AuthKey.p8")
            .redirect_uri("https://example.com/cb")
            .build();
        let res = TokenRequest::authorization_code(&config, &Code::new("c0de"));
        assert!(matches!(res, Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn test_token_response_keeps_extra_fields() {
        let json = r#"{
            "access_token": "a1",
            "token_type": "Bearer",
            "expires_in": 3600,
            "refresh_token": "r1",
            "id_token": "h.p.s",
            "custom": 42
        }"#;
        let res: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(res.access_token().value(), "a1");
        assert_eq!(res.token_type(), Some("Bearer"));
        assert_eq!(res.expires_in(), Some(3600));
        assert_eq!(res.refresh_token().map(|v| v.value()), Some("r1"));
        assert_eq!(res.id_token().map(|v| v.value()), Some("h.p.s"));
        assert_eq!(res.extra()["custom"], 42);
    }

    #[test]
    fn test_token_response_only_access_token_required() {
        let res: TokenResponse = serde_json::from_str(r#"{"access_token":"a1"}"#).unwrap();
        assert_eq!(res.access_token().value(), "a1");
        assert!(res.token_type().is_none());
        assert!(res.expires_in().is_none());
        assert!(res.refresh_token().is_none());
        assert!(res.id_token().is_none());
    }

    #[test]
    fn test_token_response_rejects_error_payload() {
        let res = serde_json::from_str::<TokenResponse>(r#"{"error":"invalid_grant"}"#);
        assert!(res.is_err());
    }
}
