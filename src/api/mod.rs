//! Session & transport layer for the game API.
//!
//! envelope    request/response shapes, error normalisation
//! transport   `Transport` seam + reqwest implementation
//! session     token lifecycle, retries, rate limits, re-auth, pre-flight
//! policy      retry schedule, mutating/dock-state endpoint tables
//! credentials credential file + persisted token slot
//! cancel      interruptible waits

pub mod cancel;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod policy;
pub mod session;
pub mod transport;

#[cfg(test)]
pub mod testing;

pub use cancel::CancelSignal;
pub use credentials::TokenStore;
pub use envelope::{Body, RequestEnvelope, ResponseEnvelope};
pub use error::ApiError;
pub use session::{Session, SessionConfig};
pub use transport::{HttpTransport, Transport};
