//! Authenticated request pipeline.
//!
//! Every outgoing API call passes through here: the current access token is
//! attached as a bearer credential, and a single 401 per request is repaired
//! by rotating the token (through the refresh gate) and resending the
//! original call exactly once. The retry-once guard is structural; there is
//! no loop to run away.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{RefreshGate, SessionStore};
use crate::config::Config;

use super::transport::{ApiRequest, HttpTransport, Transport};
use super::ApiError;

pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    session: SessionStore,
    gate: RefreshGate,
    base_url: String,
}

impl RequestPipeline {
    pub fn new(config: &Config, session: SessionStore) -> Result<Self, ApiError> {
        Ok(Self::with_transport(
            Arc::new(HttpTransport::new()?),
            session,
            &config.api_base_url,
        ))
    }

    /// Build a pipeline over a custom transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        session: SessionStore,
        base_url: &str,
    ) -> Self {
        Self {
            transport,
            session,
            gate: RefreshGate::new(),
            base_url: base_url.to_string(),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let body = self.execute(Method::GET, path, None).await?;
        Self::decode(&body)
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        let response = self.execute(Method::POST, path, Some(body)).await?;
        Self::decode(&response)
    }

    fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
        serde_json::from_str(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Send one request, repairing at most one expired-token rejection.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<String, ApiError> {
        let mut request = ApiRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            bearer: self.session.access_token(),
            body,
        };

        let response = self.transport.send(request.clone()).await?;
        if response.is_success() {
            return Ok(response.body);
        }
        if response.status != 401 {
            return Err(ApiError::from_status(response.status, &response.body));
        }

        debug!(url = %request.url, "Got 401; rotating access token");
        let session = self.session.clone();
        let rotated = self
            .gate
            .run_single_flight(async move { session.refresh_access_token().await })
            .await;

        match rotated {
            Ok(access_token) => {
                request.bearer = Some(access_token);
                let retry = self.transport.send(request).await?;
                if retry.is_success() {
                    Ok(retry.body)
                } else {
                    // A second 401 lands here too: propagate, never rotate
                    // twice for one request.
                    Err(ApiError::from_status(retry.status, &retry.body))
                }
            }
            Err(e) => {
                // Demote before the error becomes observable, so a caller
                // reacting to it already sees guest state.
                warn!(error = %e, "Token refresh failed; clearing session");
                self.session.clear_session().await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde::Deserialize;

    use crate::api::transport::ApiResponse;
    use crate::auth::session::tests::{store_with, FakeIdentity};
    use crate::auth::SessionStatus;
    use crate::models::TokenPair;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ack {
        ok: bool,
    }

    enum Behavior {
        /// 200 when the bearer matches, 401 otherwise.
        RequireBearer(String),
        /// Same status no matter what.
        AlwaysStatus(u16),
    }

    struct FakeTransport {
        behavior: Behavior,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl FakeTransport {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn request_count(&self) -> usize {
            self.requests.lock().len()
        }

        fn bearer_of(&self, index: usize) -> Option<String> {
            self.requests.lock()[index].bearer.clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
            let response = match &self.behavior {
                Behavior::RequireBearer(valid) => {
                    if request.bearer.as_deref() == Some(valid.as_str()) {
                        ApiResponse {
                            status: 200,
                            body: r#"{"ok": true}"#.to_string(),
                        }
                    } else {
                        ApiResponse {
                            status: 401,
                            body: String::new(),
                        }
                    }
                }
                Behavior::AlwaysStatus(status) => ApiResponse {
                    status: *status,
                    body: String::new(),
                },
            };
            self.requests.lock().push(request);
            Ok(response)
        }
    }

    fn pipeline_with(
        identity: Arc<FakeIdentity>,
        transport: Arc<FakeTransport>,
    ) -> (RequestPipeline, SessionStore) {
        let (session, _tokens) = store_with(identity);
        let pipeline = RequestPipeline::with_transport(
            transport,
            session.clone(),
            "https://api.example.com/api/v1",
        );
        (pipeline, session)
    }

    #[tokio::test]
    async fn attaches_bearer_when_authenticated() {
        let identity = Arc::new(FakeIdentity::default());
        let transport = FakeTransport::new(Behavior::RequireBearer("at-1".to_string()));
        let (pipeline, session) = pipeline_with(Arc::clone(&identity), Arc::clone(&transport));
        session.sign_in("ada", "hunter2").await.expect("sign in");

        let ack: Ack = pipeline.get("/ping").await.expect("request");

        assert_eq!(ack, Ack { ok: true });
        assert_eq!(transport.request_count(), 1);
        assert_eq!(transport.bearer_of(0), Some("at-1".to_string()));
    }

    #[tokio::test]
    async fn sends_unauthenticated_when_guest() {
        let identity = Arc::new(FakeIdentity::default());
        let transport = FakeTransport::new(Behavior::AlwaysStatus(200));
        let (pipeline, session) = pipeline_with(identity, Arc::clone(&transport));
        session.clear_session().await;

        let result: Result<Ack, ApiError> = pipeline.get("/ping").await;

        // Empty 200 body does not decode, but the request itself went out
        // without credentials.
        assert!(matches!(result, Err(ApiError::InvalidResponse(_))));
        assert_eq!(transport.bearer_of(0), None);
    }

    #[tokio::test]
    async fn retries_once_after_token_rotation() {
        let identity = Arc::new(FakeIdentity::default());
        let transport = FakeTransport::new(Behavior::RequireBearer("at-2".to_string()));
        let (pipeline, session) = pipeline_with(Arc::clone(&identity), Arc::clone(&transport));
        *identity.login_response.lock() = Ok(TokenPair::new("at-expired", "rt-1"));
        session.sign_in("ada", "hunter2").await.expect("sign in");

        let ack: Ack = pipeline.get("/ping").await.expect("request");

        assert_eq!(ack, Ack { ok: true });
        assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.request_count(), 2);
        assert_eq!(transport.bearer_of(0), Some("at-expired".to_string()));
        assert_eq!(transport.bearer_of(1), Some("at-2".to_string()));
        assert_eq!(session.access_token(), Some("at-2".to_string()));
    }

    #[tokio::test]
    async fn second_401_propagates_without_second_rotation() {
        let identity = Arc::new(FakeIdentity::default());
        // The rotated token is still not the one the server wants.
        let transport = FakeTransport::new(Behavior::RequireBearer("at-3".to_string()));
        let (pipeline, session) = pipeline_with(Arc::clone(&identity), Arc::clone(&transport));
        *identity.login_response.lock() = Ok(TokenPair::new("at-expired", "rt-1"));
        session.sign_in("ada", "hunter2").await.expect("sign in");

        let result: Result<Ack, ApiError> = pipeline.get("/ping").await;

        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
        assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn refresh_failure_clears_session_and_propagates_refresh_error() {
        let identity = Arc::new(FakeIdentity::default());
        let transport = FakeTransport::new(Behavior::RequireBearer("at-2".to_string()));
        let (pipeline, session) = pipeline_with(Arc::clone(&identity), Arc::clone(&transport));
        *identity.login_response.lock() = Ok(TokenPair::new("at-expired", "rt-1"));
        session.sign_in("ada", "hunter2").await.expect("sign in");
        *identity.refresh_response.lock() = Err(ApiError::from_status(401, ""));

        let result: Result<Ack, ApiError> = pipeline.get("/ping").await;

        // The refresh error is the actionable one, not the original 401.
        assert!(matches!(result, Err(ApiError::RefreshRejected(_))));
        assert_eq!(session.status(), SessionStatus::Guest);
        assert_eq!(session.access_token(), None);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn non_401_failure_propagates_without_refresh() {
        let identity = Arc::new(FakeIdentity::default());
        let transport = FakeTransport::new(Behavior::AlwaysStatus(500));
        let (pipeline, session) = pipeline_with(Arc::clone(&identity), Arc::clone(&transport));
        session.sign_in("ada", "hunter2").await.expect("sign in");

        let result: Result<Ack, ApiError> = pipeline.get("/ping").await;

        assert!(matches!(result, Err(ApiError::Request(_))));
        assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 0);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_rotation() {
        let identity = Arc::new(FakeIdentity {
            refresh_yields: 4,
            ..FakeIdentity::default()
        });
        let transport = FakeTransport::new(Behavior::RequireBearer("at-2".to_string()));
        let (pipeline, session) = pipeline_with(Arc::clone(&identity), Arc::clone(&transport));
        *identity.login_response.lock() = Ok(TokenPair::new("at-expired", "rt-1"));
        session.sign_in("ada", "hunter2").await.expect("sign in");

        let (a, b): (Result<Ack, _>, Result<Ack, _>) =
            tokio::join!(pipeline.get("/a"), pipeline.get("/b"));

        assert_eq!(a.expect("request a"), Ack { ok: true });
        assert_eq!(b.expect("request b"), Ack { ok: true });
        assert_eq!(identity.refresh_calls.load(Ordering::SeqCst), 1);
        // Two original sends plus two retries, both retries with the
        // rotated token.
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test]
    async fn post_serializes_body_and_succeeds() {
        let identity = Arc::new(FakeIdentity::default());
        let transport = FakeTransport::new(Behavior::RequireBearer("at-1".to_string()));
        let (pipeline, session) = pipeline_with(identity, Arc::clone(&transport));
        session.sign_in("ada", "hunter2").await.expect("sign in");

        let ack: Ack = pipeline
            .post("/notes", &serde_json::json!({ "text": "hello" }))
            .await
            .expect("request");

        assert_eq!(ack, Ack { ok: true });
        let recorded = transport.requests.lock()[0].clone();
        assert_eq!(recorded.method, Method::POST);
        assert_eq!(recorded.body, Some(serde_json::json!({ "text": "hello" })));
    }
}
