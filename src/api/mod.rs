//! Network boundary: identity endpoints, error taxonomy, and the
//! authenticated request pipeline.
//!
//! Two paths exist to the wire. The identity client is raw: no token
//! attachment, no interception, used for login/refresh/logout/registration.
//! The request pipeline carries every other API call, attaching the current
//! access token and repairing a single expired-token rejection per request.

pub mod error;
pub mod identity;
pub mod pipeline;
pub mod transport;

pub use error::{ApiError, ErrorBody};
pub use identity::{HttpIdentityClient, IdentityApi};
pub use pipeline::RequestPipeline;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
