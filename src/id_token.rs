//! Verification of IDTokens against Apple's published signing keys.
//!
//! This module:
//! - KeySetRequest: where Apple's key set (`/auth/keys`) is fetched from.
//! - JsonWebKeySet / JsonWebKey: the fetched key set.
//! - KeySelection: how one key is picked from the set.
//! - IdTokenClaims: the verified payload.
//! - verify: fetch, select, rebuild the RSA key and check the RS256 signature.
//!
//! The key set is fetched on every call; nothing is cached.
use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::{
    config::Config,
    error::Error,
    executer::{Executer, KeySetExe},
    state::Nonce,
};

/// Minimum RSA modulus size accepted for RS256 (RFC 7518 section 3.3).
const MIN_MODULUS_BITS: usize = 2048;

/// Base64url with or without padding. Standard-alphabet input is mapped onto it first.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// How the verification key is chosen from the fetched key set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum KeySelection {
    /// Always use the first key in the set, ignoring the token's `kid`.
    #[default]
    First,
    /// Use the key whose `kid` equals the `kid` in the token header.
    MatchKid,
}

/// Request for Apple's public key set.
#[derive(Debug, Clone)]
pub struct KeySetRequest {
    pub(crate) keys_endpoint: String,
}

impl KeySetRequest {
    pub fn new(config: &Config) -> Self {
        Self {
            keys_endpoint: config.endpoint_url("/auth/keys"),
        }
    }

    pub fn keys_endpoint(&self) -> &str {
        &self.keys_endpoint
    }
}

/// One RSA public key from `/auth/keys`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonWebKey {
    pub kty: String,
    pub kid: Option<String>,
    #[serde(rename = "use")]
    pub use_: Option<String>,
    pub alg: Option<String>,
    pub n: String,
    pub e: String,
}

impl JsonWebKey {
    /// Rebuilds the RSA public key from its modulus and exponent.
    ///
    /// Both base64url and standard base64, padded or not, are accepted.
    pub fn decoding_key(&self) -> Result<DecodingKey, Error> {
        let n = decode_component("n", &self.n)?;
        let e = decode_component("e", &self.e)?;
        let n = match n.iter().position(|b| *b != 0) {
            Some(start) => &n[start..],
            None => return Err(Error::KeySet("RSA modulus is empty".to_string())),
        };
        if e.iter().all(|b| *b == 0) {
            return Err(Error::KeySet("RSA exponent is empty".to_string()));
        }
        let bits = (n.len() - 1) * 8 + (8 - n[0].leading_zeros() as usize);
        if bits < MIN_MODULUS_BITS {
            error!("RSA modulus is {} bits", bits);
            return Err(Error::KeySet(format!("RSA modulus too short: {} bits", bits)));
        }
        Ok(DecodingKey::from_rsa_raw_components(n, &e))
    }
}

fn decode_component(name: &str, value: &str) -> Result<Vec<u8>, Error> {
    let normalized = value.replace('+', "-").replace('/', "_");
    LENIENT_BASE64.decode(normalized).map_err(|e| {
        error!("Invalid RSA key component {}: {}", name, e);
        Error::KeySet(format!("invalid RSA key component {}: {}", name, e))
    })
}

/// The document served by `/auth/keys`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

impl JsonWebKeySet {
    /// Picks the key used to verify `id_token`.
    pub fn select(&self, selection: KeySelection, id_token: &str) -> Result<&JsonWebKey, Error> {
        match selection {
            KeySelection::First => self
                .keys
                .first()
                .ok_or_else(|| Error::KeySet("key set is empty".to_string())),
            KeySelection::MatchKid => {
                let header = decode_header(id_token).map_err(|e| {
                    error!("Failed to decode IDToken header: {}", e);
                    Error::InvalidToken(e.to_string())
                })?;
                let kid = header
                    .kid
                    .ok_or_else(|| Error::InvalidToken("header has no kid".to_string()))?;
                self.keys
                    .iter()
                    .find(|k| k.kid.as_deref() == Some(kid.as_str()))
                    .ok_or_else(|| Error::KeySet(format!("no key matches kid {}", kid)))
            }
        }
    }
}

/// The `aud` claim, which a JWT may carry as one string or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::One(v) => v == audience,
            Audience::Many(v) => v.iter().any(|a| a == audience),
        }
    }
}

/// Verified payload of an Apple IDToken.
///
/// Only `sub` and `exp` are required. Apple sends `email_verified`,
/// `is_private_email` and `real_user_status` in varying shapes, so those stay in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: Option<String>,
    pub sub: String,
    pub aud: Option<Audience>,
    pub iat: Option<u64>,
    pub exp: u64,
    pub email: Option<String>,
    pub nonce: Option<String>,
    pub auth_time: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdTokenClaims {
    /// Reads `email_verified`, accepting both `true` and `"true"`.
    pub fn email_verified(&self) -> Option<bool> {
        flag(self.extra.get("email_verified"))
    }

    /// Reads `is_private_email`, accepting both `true` and `"true"`.
    pub fn is_private_email(&self) -> Option<bool> {
        flag(self.extra.get("is_private_email"))
    }

    /// Checks the `nonce` claim against the nonce sent in the authorization request.
    pub fn verify_nonce(&self, nonce: &Nonce) -> Result<(), Error> {
        match &self.nonce {
            Some(n) if n == nonce.value() => Ok(()),
            Some(_) => Err(Error::InvalidClaims("nonce mismatch".to_string())),
            None => Err(Error::InvalidClaims("nonce missing".to_string())),
        }
    }
}

fn flag(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Fetches Apple's key set and verifies `id_token` against it.
pub async fn verify(config: &Config, id_token: &str) -> Result<IdTokenClaims, Error> {
    let req = KeySetRequest::new(config);
    let key_set = KeySetExe.execute(&req).await?;
    verify_with_key_set(config, &key_set, id_token)
}

/// Verifies `id_token` against an already fetched key set.
///
/// The signature must be RS256 and `exp` must be in the future.
/// `aud` and `iss` are only checked when configured.
pub fn verify_with_key_set(
    config: &Config,
    key_set: &JsonWebKeySet,
    id_token: &str,
) -> Result<IdTokenClaims, Error> {
    let jwk = key_set.select(config.key_selection, id_token)?;
    debug!("Verifying IDToken with key {:?}", jwk.kid);
    let key = jwk.decoding_key()?;

    let mut validation = Validation::new(Algorithm::RS256);
    match &config.audience {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }
    if let Some(iss) = &config.issuer {
        validation.set_issuer(&[iss]);
    }

    let data = decode::<IdTokenClaims>(id_token, &key, &validation).map_err(|e| {
        error!("Failed to verify IDToken: {}", e);
        verification_error(&e)
    })?;
    Ok(data.claims)
}

fn verification_error(e: &jsonwebtoken::errors::Error) -> Error {
    match e.kind() {
        ErrorKind::InvalidSignature => Error::InvalidSignature,
        ErrorKind::ExpiredSignature => Error::ExpiredSignature,
        ErrorKind::InvalidAlgorithm => Error::InvalidAlgorithm,
        ErrorKind::InvalidAudience
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => Error::InvalidClaims(e.to_string()),
        // the key set entry decoded but is not a usable RSA key
        ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => Error::KeySet(e.to_string()),
        _ => Error::InvalidToken(e.to_string()),
    }
}
