//! Client for the identity service endpoints.
//!
//! This is the raw network boundary: no token attachment, no 401
//! interception. The session store drives it directly, and the request
//! pipeline only reaches it indirectly through the store's refresh. The
//! login endpoint takes form-encoded credentials; everything else is JSON.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::models::{RegisterInput, TokenPair, UserProfile};

use super::ApiError;

/// HTTP request timeout in seconds, matching the authenticated pipeline.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Network operations against the identity service.
#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn login(&self, username_or_email: &str, password: &str) -> Result<TokenPair, ApiError>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
    async fn logout(&self, refresh_token: &str, access_token: Option<&str>)
        -> Result<(), ApiError>;
    async fn register(&self, input: &RegisterInput) -> Result<UserProfile, ApiError>;
    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, ApiError>;
}

/// Identity client for the remote service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpIdentityClient {
    client: Client,
    base_url: String,
}

impl HttpIdentityClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check if a response is successful, classifying the failure otherwise.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl IdentityApi for HttpIdentityClient {
    async fn login(&self, username_or_email: &str, password: &str) -> Result<TokenPair, ApiError> {
        debug!("Sending login request");
        let response = self
            .client
            .post(self.url("/login/mobile"))
            .header(header::ACCEPT, "application/json")
            .form(&[("username", username_or_email), ("password", password)])
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse(response).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        debug!("Sending token refresh request");
        let response = self
            .client
            .post(self.url("/refresh/mobile"))
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse(response).await
    }

    async fn logout(
        &self,
        refresh_token: &str,
        access_token: Option<&str>,
    ) -> Result<(), ApiError> {
        debug!("Sending logout request");
        let mut builder = self
            .client
            .post(self.url("/logout/mobile"))
            .json(&json!({ "refresh_token": refresh_token }));

        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn register(&self, input: &RegisterInput) -> Result<UserProfile, ApiError> {
        debug!(username = %input.username, "Sending registration request");
        let response = self
            .client
            .post(self.url("/user"))
            .json(input)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse(response).await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        let response = self
            .client
            .get(self.url("/user/me/"))
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Self::parse(response).await
    }
}
