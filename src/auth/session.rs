//! The session state machine.
//!
//! One session exists per process. It starts in `Booting`, settles into
//! `Guest` or `Authed` during bootstrap, and is only ever mutated through
//! the operations here: bootstrap, sign-in, sign-up, sign-out, refresh, and
//! clear. The persisted refresh token is the sole durable state; everything
//! else is wiped on demotion.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::api::{ApiError, IdentityApi};
use crate::models::{RegisterInput, UserProfile};
use crate::storage::TokenStore;

/// Storage key under which the refresh token is persisted.
const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Where the session currently stands. Drives UI gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Startup only; never re-entered except by an explicit bootstrap.
    Booting,
    Guest,
    Authed,
}

#[derive(Debug, Clone)]
struct SessionState {
    status: SessionStatus,
    access_token: Option<String>,
    user: Option<UserProfile>,
}

impl SessionState {
    fn booting() -> Self {
        Self {
            status: SessionStatus::Booting,
            access_token: None,
            user: None,
        }
    }

    fn guest() -> Self {
        Self {
            status: SessionStatus::Guest,
            access_token: None,
            user: None,
        }
    }
}

/// Owner of the session: status, in-memory access token, and profile
/// snapshot, plus the persisted refresh token reached through the injected
/// [`TokenStore`].
///
/// Invariant: `status == Authed` if and only if an access token is held, and
/// `user` is never set while the access token is absent.
///
/// Clone is cheap - handles share one session behind an Arc.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: RwLock<SessionState>,
    identity: Arc<dyn IdentityApi>,
    tokens: Arc<dyn TokenStore>,
}

impl SessionStore {
    /// Create the session in `Booting`; call [`bootstrap`](Self::bootstrap)
    /// to settle it.
    pub fn new(identity: Arc<dyn IdentityApi>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(SessionState::booting()),
                identity,
                tokens,
            }),
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.state.read().status
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.state.read().access_token.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.inner.state.read().user.clone()
    }

    /// Restore a session from the persisted refresh token, if any.
    ///
    /// Never errors and never finishes in `Booting`: any failure along the
    /// way is treated as "no valid session" and lands in a clean `Guest`
    /// state with the persisted token cleared. With no persisted token, no
    /// network call is made.
    pub async fn bootstrap(&self) {
        *self.inner.state.write() = SessionState::booting();

        let refresh_token = self.inner.tokens.get(REFRESH_TOKEN_KEY).await;
        if refresh_token.is_none() {
            debug!("No persisted refresh token; starting as guest");
            *self.inner.state.write() = SessionState::guest();
            return;
        }

        match self.restore_session().await {
            Ok(user) => {
                let mut state = self.inner.state.write();
                state.status = SessionStatus::Authed;
                state.user = Some(user);
                info!("Session restored from persisted refresh token");
            }
            Err(e) => {
                warn!(error = %e, "Session restore failed; demoting to guest");
                self.clear_session().await;
            }
        }
    }

    async fn restore_session(&self) -> Result<UserProfile, ApiError> {
        let access_token = self.refresh_access_token().await?;
        self.inner.identity.fetch_profile(&access_token).await
    }

    /// Exchange credentials for a session.
    ///
    /// On success the refresh token is persisted, the access token and
    /// profile are set, and the session is `Authed`. On any failure the
    /// session is cleared *before* the error propagates, so callers always
    /// observe a consistent `Guest` state alongside the error.
    pub async fn sign_in(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        match self.establish_session(username_or_email, password).await {
            Ok(()) => {
                info!("Signed in");
                Ok(())
            }
            Err(e) => {
                self.clear_session().await;
                Err(e)
            }
        }
    }

    async fn establish_session(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        let tokens = self
            .inner
            .identity
            .login(username_or_email, password)
            .await?;

        // Persist before exposing the new access token in memory: a crash
        // in between must never leave an in-memory token with no persisted
        // refresh token behind it.
        self.inner
            .tokens
            .set(REFRESH_TOKEN_KEY, &tokens.refresh_token)
            .await;
        self.inner.state.write().access_token = Some(tokens.access_token.clone());

        let user = self.inner.identity.fetch_profile(&tokens.access_token).await?;

        let mut state = self.inner.state.write();
        state.status = SessionStatus::Authed;
        state.user = Some(user);
        Ok(())
    }

    /// Register a new account, then establish a session through the normal
    /// sign-in path with the submitted credentials.
    ///
    /// Registration is not assumed to return credentials. If registration
    /// succeeds but the follow-up sign-in fails, the sign-in error surfaces
    /// even though the account now exists server-side; that asymmetry is
    /// deliberate and keeps the two paths from diverging.
    pub async fn sign_up(&self, input: RegisterInput) -> Result<(), ApiError> {
        self.inner.identity.register(&input).await?;
        self.sign_in(&input.username, &input.password).await
    }

    /// Tear down the session.
    ///
    /// The remote logout is best-effort: its failure is logged and
    /// discarded. Local clearing runs unconditionally afterwards, so the
    /// session always ends in `Guest` with no credentials.
    pub async fn sign_out(&self) {
        let access_token = self.access_token();
        let refresh_token = self.inner.tokens.get(REFRESH_TOKEN_KEY).await;

        if let Some(refresh_token) = refresh_token {
            if let Err(e) = self
                .inner
                .identity
                .logout(&refresh_token, access_token.as_deref())
                .await
            {
                warn!(error = %e, "Remote logout failed; clearing local session anyway");
            }
        }

        self.clear_session().await;
        info!("Signed out");
    }

    /// Rotate the access token using the persisted refresh token.
    ///
    /// Fails with [`ApiError::NoRefreshToken`] when nothing is persisted and
    /// [`ApiError::RefreshRejected`] when the identity service refuses the
    /// token. Does not change `status` - only the bootstrap / sign-in /
    /// sign-out paths (and the pipeline's failure handler) do that.
    pub async fn refresh_access_token(&self) -> Result<String, ApiError> {
        let refresh_token = self
            .inner
            .tokens
            .get(REFRESH_TOKEN_KEY)
            .await
            .ok_or(ApiError::NoRefreshToken)?;

        let tokens = self
            .inner
            .identity
            .refresh(&refresh_token)
            .await
            .map_err(|e| match e {
                // The refresh endpoint refusing the token is fatal to the
                // session, unlike an ordinary 401 on an API call. Other
                // failures (server errors, network) keep their own label.
                ApiError::Unauthorized(body) => ApiError::RefreshRejected(body),
                other => other,
            })?;

        // Same ordering as sign-in: persisted refresh token first, then the
        // in-memory access token.
        self.inner
            .tokens
            .set(REFRESH_TOKEN_KEY, &tokens.refresh_token)
            .await;
        self.inner.state.write().access_token = Some(tokens.access_token.clone());

        debug!("Access token rotated");
        Ok(tokens.access_token)
    }

    /// Demote to `Guest`, wiping the persisted refresh token and all
    /// in-memory credentials.
    pub async fn clear_session(&self) {
        self.inner.tokens.delete(REFRESH_TOKEN_KEY).await;
        *self.inner.state.write() = SessionState::guest();
        debug!("Session cleared");
    }
}
