//! One-call entry points for the whole flow.
//!
//! `AppleAuth` wraps a [`Config`] and exposes the four operations an
//! application usually needs. Each call is independent: the client secret is
//! minted and the key set is fetched anew on every call.
//!
//! # Example
//! ```rust,no_run
//! use tiny_apple_sign_in::{client::AppleAuth, code::Code, config::Config};
//!
//! # async fn run() -> Result<(), tiny_apple_sign_in::error::Error> {
//! let auth = AppleAuth::new(
//!     Config::builder()
//!         .client_id("com.example.service")
//!         .team_id("TEAMID1234")
//!         .key_id("KEYID12345")
//!         .private_key_path("./AuthKey_KEYID12345.p8")
//!         .redirect_uri("https://example.com/auth/callback")
//!         .build(),
//! );
//!
//! let url = auth.authorization_url()?;
//! // ... redirect, receive the code ...
//! let tokens = auth.authorization_token(&Code::new("code-from-callback")).await?;
//! if let Some(id_token) = tokens.id_token() {
//!     let claims = auth.verify_id_token(id_token.value()).await?;
//!     println!("signed in as {}", claims.sub);
//! }
//! # Ok(())
//! # }
//! ```
use crate::{
    code::{Code, CodeRequest},
    config::Config,
    error::Error,
    executer::{Executer, TokenExe},
    id_token::{self, IdTokenClaims},
    token::{RefreshToken, TokenRequest, TokenResponse},
};

#[derive(Debug, Clone)]
pub struct AppleAuth {
    config: Config,
}

impl AppleAuth {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// URL to redirect the user to.
    pub fn authorization_url(&self) -> Result<String, Error> {
        CodeRequest::new(&self.config).into_url()
    }

    /// Exchanges an authorization code for tokens.
    pub async fn authorization_token(&self, code: &Code) -> Result<TokenResponse, Error> {
        let req = TokenRequest::authorization_code(&self.config, code)?;
        TokenExe.execute(&req).await
    }

    /// Exchanges a refresh token for a new access token.
    pub async fn refresh_authorization_token(
        &self,
        refresh_token: &RefreshToken,
    ) -> Result<TokenResponse, Error> {
        let req = TokenRequest::refresh_token(&self.config, refresh_token)?;
        TokenExe.execute(&req).await
    }

    /// Verifies an IDToken against Apple's current public key.
    pub async fn verify_id_token(&self, id_token: &str) -> Result<IdTokenClaims, Error> {
        id_token::verify(&self.config, id_token).await
    }
}
