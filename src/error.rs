use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Can't find private key: {0}")]
    KeyNotFound(String),
    #[error("Failed to sign client secret: {0}")]
    Signing(String),
    #[error("Failed to send request")]
    Network,
    #[error("Provider rejected request ({status}): {error}")]
    Provider {
        status: StatusCode,
        error: String,
        description: Option<String>,
    },
    /// The provider answered 2xx with a body that is not a token response.
    /// Non-2xx answers are `Provider`.
    #[error("Failed to parse data")]
    Parse,
    #[error("Invalid key set: {0}")]
    KeySet(String),
    #[error("IDToken signature is invalid")]
    InvalidSignature,
    #[error("IDToken is expired")]
    ExpiredSignature,
    #[error("IDToken is signed with an unexpected algorithm")]
    InvalidAlgorithm,
    #[error("IDToken claims rejected: {0}")]
    InvalidClaims(String),
    #[error("Malformed IDToken: {0}")]
    InvalidToken(String),
    #[error("Callback is missing code or state")]
    Callback,
    #[error("State not matched")]
    StateMismatch,
    #[error("Failed to generate state")]
    StateGeneration,
    #[error("Failed to parse url")]
    URL,
}
