//! Random values carried through the authorization round trip.
//!
//! - `StateToken`: an unguessable `state` value that binds the callback to the request.
//! - `Nonce`: a value Apple copies into the IDToken to mitigate replay.
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::Error;

/// A randomly generated `state` value created using `OsRng` and Base64URL-encoded.
///
/// Pass its value to [`ConfigBuilder::state`](crate::config::ConfigBuilder::state),
/// keep it server side, and compare it against the callback with
/// [`UnCheckedCodeResponse::exchange_with_code`](crate::code::UnCheckedCodeResponse::exchange_with_code).
///
/// # Example
/// ```rust,no_run
/// use tiny_apple_sign_in::state::StateToken;
///
/// let state = StateToken::new().expect("Failed to generate state");
/// println!("Generated state: {}", state.value());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StateToken(pub(crate) String);

impl StateToken {
    /// Generates a new state value from 32 bytes of OS randomness.
    /// Returns `Error::StateGeneration` if the random source fails.
    pub fn new() -> Result<Self, Error> {
        let mut key = [0u8; 32];
        OsRng.try_fill_bytes(&mut key).map_err(|e| {
            error!("Failed to generate state: {:?}", e);
            Error::StateGeneration
        })?;
        Ok(Self(URL_SAFE_NO_PAD.encode(key)))
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

/// A unique value Apple embeds in the IDToken's `nonce` claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nonce(pub(crate) String);

impl Nonce {
    /// Generates a new nonce using UUIDv4.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Equivalent to `Nonce::new()`.
impl Default for Nonce {
    fn default() -> Self {
        Self::new()
    }
}
