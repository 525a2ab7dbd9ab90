//! Tiny library for Sign in with Apple.
//!
//! This library provides the client side of Apple's OAuth 2.0 / OpenID Connect flow:
//! generating the authorization URL, minting the signed client secret, exchanging
//! codes and refresh tokens, and verifying IDTokens.
//! [Apple document](https://developer.apple.com/documentation/sign_in_with_apple/sign_in_with_apple_rest_api)
//! # Feature
//! - Generate an authorization request URL (code)
//! - Generate a random state and nonce, and check the callback's state
//! - Mint the ES256 client secret from your `.p8` key
//! - Exchange code for tokens (using reqwest)
//! - Refresh tokens using a refresh token (using reqwest)
//! - Verify an IDToken's RS256 signature against Apple's published key (using reqwest)
//! # Caution
//! - Nothing is cached: every exchange mints a new client secret and every
//!   verification fetches Apple's key set again.
//! - By default the first key of Apple's key set is used for verification.
//!   Use [`KeySelection::MatchKid`](id_token::KeySelection::MatchKid) to pick the key by the token's `kid`.
//! - No retry or timeout is applied to requests.
//! # Examples
//! See `demos/axum_server.rs`, or [`client::AppleAuth`] for the short path.
pub mod client;
pub mod client_secret;
pub mod code;
pub mod config;
pub mod error;
pub mod executer;
pub mod id_token;
pub mod state;
pub mod token;
