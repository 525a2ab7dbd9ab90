//! Mints the signed assertion Apple expects in place of a static `client_secret`.
//!
//! The assertion is an ES256 JWT signed with the `.p8` key registered for
//! Sign in with Apple:
//!
//! | claim | value |
//! |-------|-------|
//! | `iss` | team ID |
//! | `iat` | now |
//! | `exp` | now + 15,777,000 seconds (about six months) |
//! | `aud` | provider endpoint |
//! | `sub` | client ID |
//!
//! A fresh assertion is minted for every token request; nothing is cached.
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{config::Config, error::Error};

/// Lifetime of a minted client secret in seconds.
pub const CLIENT_SECRET_LIFETIME_SECS: u64 = 15_777_000;

/// Claim set of the client secret assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSecretClaims {
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
    pub aud: String,
    pub sub: String,
}

/// A compact ES256 JWT used as `client_secret` at the token endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSecret(pub(crate) String);

impl ClientSecret {
    /// Mints a client secret issued now.
    ///
    /// Every required field is checked before the key file is touched.
    pub fn mint(config: &Config) -> Result<Self, Error> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| {
                error!("System clock is before UNIX epoch: {}", e);
                Error::Signing("system clock is before UNIX epoch".to_string())
            })?
            .as_secs();
        Self::mint_at(config, now)
    }

    pub(crate) fn mint_at(config: &Config, issued_at: u64) -> Result<Self, Error> {
        if config.client_id.0.is_empty() {
            return Err(Error::MissingParameter("client_id"));
        }
        if config.team_id.0.is_empty() {
            return Err(Error::MissingParameter("team_id"));
        }
        if config.key_id.0.is_empty() {
            return Err(Error::MissingParameter("key_id"));
        }
        if config.private_key_path.0.is_empty() {
            return Err(Error::MissingParameter("private_key_path"));
        }

        let claims = ClientSecretClaims {
            iss: config.team_id.0.to_owned(),
            iat: issued_at,
            exp: issued_at + CLIENT_SECRET_LIFETIME_SECS,
            aud: config.endpoint.0.to_owned(),
            sub: config.client_id.0.to_owned(),
        };

        let path = &config.private_key_path.0;
        let pem = std::fs::read(path).map_err(|e| {
            error!("Failed to read private key {}: {}", path, e);
            Error::KeyNotFound(path.to_owned())
        })?;
        let key = EncodingKey::from_ec_pem(&pem).map_err(|e| {
            error!("Failed to load EC private key: {}", e);
            Error::Signing(e.to_string())
        })?;

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(config.key_id.0.to_owned());

        let token = jsonwebtoken::encode(&header, &claims, &key).map_err(|e| {
            error!("Failed to sign client secret: {}", e);
            Error::Signing(e.to_string())
        })?;
        Ok(Self(token))
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}
