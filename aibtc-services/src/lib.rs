//! # aibtc-services
//!
//! The `/auth` service: trusted callers present a shared key, users prove
//! control of a Stacks account by signing a challenge, and the service hands
//! out session tokens held in an expiring key-value store.

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod session;
pub mod store;

pub use api::{app, serve, AppState};
pub use config::{ChallengeMode, ServiceConfig};
pub use error::ServiceError;
pub use gate::{SharedSecretGate, SharedSecretLayer, TrustedCaller};
pub use session::{IssuedSession, SessionConfig, SessionManager};
