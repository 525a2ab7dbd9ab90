//! Defines structures and builders related to Sign in with Apple configuration.
//!
//! Provides a structured way to handle the identifiers, key material location
//! and endpoint required for authorization, client secret minting and token exchange.
//!
//! ## Structures
//! - `Config`: Stores all the necessary authentication information.
//! - `ConfigBuilder`: A builder for constructing a `Config` instance.
//!
//! ## Defaults
//! - endpoint: `https://appleid.apple.com`
//! - scope: `email`
//! - state: `state`
//! - key selection: [`KeySelection::First`]
//!
//! # Example
//! ```rust,no_run
//! use tiny_apple_sign_in::config::Config;
//!
//! let config = Config::builder()
//!     .client_id("com.example.service")
//!     .team_id("TEAMID1234")
//!     .key_id("KEYID12345")
//!     .private_key_path("./AuthKey_KEYID12345.p8")
//!     .redirect_uri("https://example.com/auth/callback")
//!     .build();
//! ```
use itertools::Itertools;

use crate::{id_token::KeySelection, state::Nonce};

/// Base address of Apple's authorization server.
pub const APPLE_ENDPOINT: &str = "https://appleid.apple.com";
/// Scope requested when none is configured.
pub const DEFAULT_SCOPE: &str = "email";
/// State sent when none is configured.
pub const DEFAULT_STATE: &str = "state";

/// Scopes Apple can share with the client.
#[derive(Debug, Clone, PartialEq)]
pub enum AppleScope {
    Email,
    Name,
}

/// How Apple returns the authorization result to the redirect URI.
///
/// Apple requires `FormPost` whenever any scope is requested.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseMode {
    Query,
    Fragment,
    FormPost,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Query => "query",
            ResponseMode::Fragment => "fragment",
            ResponseMode::FormPost => "form_post",
        }
    }
}

/// Holds everything needed to talk to Apple on behalf of one registered client.
///
/// It is designed to be immutable once constructed, and is never persisted by this crate.
///
/// # Fields
/// - `endpoint`: Base address of the provider (`https://appleid.apple.com` by default).
/// - `client_id`: The Services ID (or App ID) registered with Apple.
/// - `team_id`: The Apple Developer team identifier, used as the client secret issuer.
/// - `key_id`: Identifier of the private key registered for Sign in with Apple.
/// - `private_key_path`: Location of the `.p8` private key file.
/// - `redirect_uri`: The redirect URI registered with Apple.
/// - `scope`, `state`, `response_mode`, `nonce`: Authorization request parameters.
/// - `key_selection`, `audience`, `issuer`: IDToken verification policy.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) endpoint: EndPoint,
    pub(crate) client_id: ClientID,
    pub(crate) team_id: TeamID,
    pub(crate) key_id: KeyID,
    pub(crate) private_key_path: PrivateKeyPath,
    pub(crate) redirect_uri: RedirectURI,
    pub(crate) scope: Scope,
    pub(crate) state: State,
    pub(crate) response_mode: Option<ResponseMode>,
    pub(crate) nonce: Option<Nonce>,
    pub(crate) key_selection: KeySelection,
    pub(crate) audience: Option<String>,
    pub(crate) issuer: Option<String>,
}

// ==========impl Config==========
impl Config {
    /// Returns a new `ConfigBuilder` instance to create a `Config` object.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Base address requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint.0
    }

    pub fn client_id(&self) -> &str {
        &self.client_id.0
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri.0
    }

    /// Joins `path` onto the configured endpoint.
    pub(crate) fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.0.trim_end_matches('/'), path)
    }
}

/// Provides a convenient way to create a `Config` instance step by step.
///
/// Required values are checked by each operation rather than at `build()`,
/// so a config for URL building alone does not need key material.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    endpoint: EndPoint,
    client_id: ClientID,
    team_id: TeamID,
    key_id: KeyID,
    private_key_path: PrivateKeyPath,
    redirect_uri: RedirectURI,
    scope: Scope,
    state: State,
    response_mode: Option<ResponseMode>,
    nonce: Option<Nonce>,
    key_selection: KeySelection,
    audience: Option<String>,
    issuer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EndPoint(pub String);

impl Default for EndPoint {
    fn default() -> Self {
        Self(APPLE_ENDPOINT.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ClientID(pub String);

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TeamID(pub String);

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct KeyID(pub String);

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PrivateKeyPath(pub String);

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RedirectURI(pub String);

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Scope(pub String);

impl Default for Scope {
    fn default() -> Self {
        Self(DEFAULT_SCOPE.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct State(pub String);

impl Default for State {
    fn default() -> Self {
        Self(DEFAULT_STATE.to_string())
    }
}

// ==========impl ConfigBuilder==========
impl ConfigBuilder {
    /// Creates a new `ConfigBuilder` instance with default values.
    pub fn new() -> Self {
        ConfigBuilder::default()
    }

    /// Overrides the provider base address (useful for a stub server).
    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = EndPoint(endpoint.to_string());
        self
    }

    /// Sets the Services ID registered with Apple.
    pub fn client_id(mut self, client_id: &str) -> Self {
        self.client_id = ClientID(client_id.to_string());
        self
    }

    /// Sets the Apple Developer team identifier.
    pub fn team_id(mut self, team_id: &str) -> Self {
        self.team_id = TeamID(team_id.to_string());
        self
    }

    /// Sets the identifier of the Sign in with Apple private key.
    pub fn key_id(mut self, key_id: &str) -> Self {
        self.key_id = KeyID(key_id.to_string());
        self
    }

    /// Sets the location of the `.p8` private key file.
    pub fn private_key_path(mut self, path: &str) -> Self {
        self.private_key_path = PrivateKeyPath(path.to_string());
        self
    }

    /// Sets the redirect URI registered with Apple.
    pub fn redirect_uri(mut self, redirect_uri: &str) -> Self {
        self.redirect_uri = RedirectURI(redirect_uri.to_string());
        self
    }

    /// Sets the raw scope string sent verbatim.
    pub fn scope(mut self, scope: &str) -> Self {
        self.scope = Scope(scope.to_string());
        self
    }

    /// Sets the scope from a list of known scopes.
    /// Duplicates are removed and the result is sorted, e.g. `email name`.
    pub fn scopes<S>(mut self, scopes: S) -> Self
    where
        S: IntoIterator<Item = AppleScope>,
    {
        let scope = scopes
            .into_iter()
            .map(|v| match v {
                AppleScope::Email => "email",
                AppleScope::Name => "name",
            })
            .unique()
            .sorted()
            .join(" ");
        self.scope = Scope(scope);
        self
    }

    pub fn state(mut self, state: &str) -> Self {
        self.state = State(state.to_string());
        self
    }

    /// Adds `response_mode` to the authorization request.
    pub fn response_mode(mut self, response_mode: ResponseMode) -> Self {
        self.response_mode = Some(response_mode);
        self
    }

    /// Adds a `nonce` to the authorization request.
    pub fn nonce(mut self, nonce: &Nonce) -> Self {
        self.nonce = Some(nonce.to_owned());
        self
    }

    /// Chooses how the verification key is picked from Apple's key set.
    pub fn key_selection(mut self, key_selection: KeySelection) -> Self {
        self.key_selection = key_selection;
        self
    }

    /// Requires IDTokens to carry this `aud` claim.
    pub fn audience(mut self, audience: &str) -> Self {
        self.audience = Some(audience.to_string());
        self
    }

    /// Requires IDTokens to carry this `iss` claim.
    pub fn issuer(mut self, issuer: &str) -> Self {
        self.issuer = Some(issuer.to_string());
        self
    }

    /// Constructs a `Config` instance with the provided values.
    pub fn build(self) -> Config {
        Config {
            endpoint: self.endpoint,
            client_id: self.client_id,
            team_id: self.team_id,
            key_id: self.key_id,
            private_key_path: self.private_key_path,
            redirect_uri: self.redirect_uri,
            scope: self.scope,
            state: self.state,
            response_mode: self.response_mode,
            nonce: self.nonce,
            key_selection: self.key_selection,
            audience: self.audience,
            issuer: self.issuer,
        }
    }
}
