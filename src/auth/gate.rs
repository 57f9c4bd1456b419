//! Single-flight coordinator for token refresh.
//!
//! However many in-flight requests discover an expired access token at once,
//! only one refresh call may reach the identity service: the refresh token
//! is single-use per rotation, so racing refreshes would invalidate each
//! other. All concurrent callers share the outcome of the one refresh that
//! actually runs.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

use crate::api::ApiError;

type SharedRefresh = Shared<BoxFuture<'static, Result<String, ApiError>>>;

/// Deduplicates concurrent refresh attempts into one network call.
///
/// The pending slot is the only state: `None` when idle, `Some` while a
/// refresh is in flight. Check-then-set happens under one synchronous lock,
/// so no task can suspend between observing "idle" and registering itself
/// as the pending refresh. Clone shares the slot.
#[derive(Clone, Default)]
pub struct RefreshGate {
    slot: Arc<Mutex<Option<SharedRefresh>>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `operation` unless a refresh is already pending, in which case
    /// await the pending one instead. Every caller that joins before the
    /// refresh settles receives the identical `Ok` or `Err`.
    ///
    /// The slot is cleared by the refresh itself, before its result becomes
    /// observable to any waiter: a later 401 (from a token that was already
    /// rotated and has expired again) starts a fresh refresh instead of
    /// reusing a stale completed one.
    ///
    /// No internal retry; the error comes out exactly as `operation`
    /// produced it.
    pub async fn run_single_flight<F>(&self, operation: F) -> Result<String, ApiError>
    where
        F: Future<Output = Result<String, ApiError>> + Send + 'static,
    {
        let pending = {
            let mut slot = self.slot.lock();
            match slot.as_ref() {
                Some(existing) => {
                    debug!("Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    let slot_handle = Arc::clone(&self.slot);
                    let refresh = async move {
                        let result = operation.await;
                        *slot_handle.lock() = None;
                        result
                    }
                    .boxed()
                    .shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        pending.await
    }
}
