//! Provides an asynchronous execution framework for sending HTTP requests to Apple.
//!
//! This module:
//! - Defines the Executer trait, which provides a unified interface for making HTTP requests.
//! - Implements executers for token requests and key set requests.
//!
//! Each execution sends exactly one request. There is no retry and no timeout
//! policy here; wrap the future if you need either.

use std::{error::Error as StdError, pin::Pin};

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::{
    error::Error,
    id_token::{JsonWebKeySet, KeySetRequest},
    token::{ProviderErrorBody, TokenRequest, TokenResponse},
};

/// generic asynchronous execution interface for sending HTTP requests.
/// Key Components:
/// - Req: The request type that the executer will handle.
/// - Response: The expected response type.
/// - Error: The error type that will be returned on failure.
/// - Future: The asynchronous execution result, returning either Response or Error
pub trait Executer<'a, Req>
where
    Req: Send,
{
    type Response;
    type Error: StdError;
    type Future: Future<Output = Result<Self::Response, Self::Error>> + Send + 'a;

    fn execute(&'a self, req: &'a Req) -> Self::Future;
}

/// Exchanges a code or refresh token at the token endpoint.
pub struct TokenExe;

/// Request Workflow
/// 1. Parse the token endpoint URL.
/// 2. Send the form as an HTTP POST request.
/// 3. Map a non-2xx status to `Error::Provider`.
/// 4. Parse and return the body as TokenResponse.
impl<'a> Executer<'a, TokenRequest> for TokenExe {
    type Response = TokenResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'a>>;

    fn execute(&'a self, req: &'a TokenRequest) -> Self::Future {
        Box::pin(async move {
            let url = Url::parse(req.token_endpoint()).map_err(|e| {
                error!("Failed to parse url: {:?}", e);
                Error::URL
            })?;
            debug!("POST {} grant_type={}", url, req.grant_type());

            let client = Client::new();
            let res = client
                .post(url)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .form(&req.form())
                .send()
                .await
                .map_err(|e| {
                    error!("Failed to send request: {:?}", e);
                    Error::Network
                })?;

            if !res.status().is_success() {
                return Err(provider_error(res).await);
            }
            parse_json::<TokenResponse>(res).await
        })
    }
}

/// Fetches Apple's public key set.
pub struct KeySetExe;

/// Request Workflow
/// 1. Send an HTTP GET request to the keys endpoint.
/// 2. Parse the body as JsonWebKeySet; reject an empty set.
impl<'a> Executer<'a, KeySetRequest> for KeySetExe {
    type Response = JsonWebKeySet;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'a>>;

    fn execute(&'a self, req: &'a KeySetRequest) -> Self::Future {
        Box::pin(async move {
            let url = Url::parse(req.keys_endpoint()).map_err(|e| {
                error!("Failed to parse url: {:?}", e);
                Error::URL
            })?;
            debug!("GET {}", url);

            let client = Client::new();
            let res = client.get(url).send().await.map_err(|e| {
                error!("Failed to send request: {:?}", e);
                Error::Network
            })?;

            let status = res.status();
            if !status.is_success() {
                error!("Key set request failed with status {}", status);
                return Err(Error::KeySet(format!("status {}", status)));
            }
            let key_set = parse_json::<JsonWebKeySet>(res)
                .await
                .map_err(|_| Error::KeySet("malformed key set".to_string()))?;
            if key_set.keys.is_empty() {
                return Err(Error::KeySet("key set is empty".to_string()));
            }
            Ok(key_set)
        })
    }
}

async fn parse_json<T: DeserializeOwned>(res: Response) -> Result<T, Error> {
    res.json::<T>().await.map_err(|e| {
        error!("Failed to parse JSON: {:?}", e);
        Error::Parse
    })
}

async fn provider_error(res: Response) -> Error {
    let status = res.status();
    let body = res.json::<ProviderErrorBody>().await.ok();
    error!("Token request rejected with status {}: {:?}", status, body);
    match body {
        Some(body) => Error::Provider {
            status,
            error: body.error,
            description: body.error_description,
        },
        None => Error::Provider {
            status,
            error: status.to_string(),
            description: None,
        },
    }
}
