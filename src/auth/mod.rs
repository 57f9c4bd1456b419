//! Session state machine and refresh coordination.
//!
//! This module provides:
//! - `SessionStore`: the one mutable session aggregate and its transitions
//! - `RefreshGate`: single-flight deduplication of token refresh calls
//!
//! The refresh token is persisted through the storage layer; the access
//! token never leaves memory.

pub mod gate;
pub mod session;

pub use gate::RefreshGate;
pub use session::{SessionStatus, SessionStore};
