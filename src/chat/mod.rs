//! Chat request lifecycle for the analyze endpoint.
//!
//! - [`RequestLifecycle`]: builds, submits, classifies and retries one request
//! - [`ChatSession`]: conversation history on top of the lifecycle
//! - [`classify_response`]: pure status/body classification
//! - [`CredentialProvider`] and [`Sleeper`]: injected capabilities

mod classify;
mod clock;
mod credentials;
mod lifecycle;
mod session;
mod types;

pub use classify::*;
pub use clock::*;
pub use credentials::*;
pub use lifecycle::*;
pub use session::*;
pub use types::*;
