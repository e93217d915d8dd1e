//! # aibtc-auth
//!
//! Stacks message signature verification for aibtcdev services.
//!
//! This crate recovers the signer of an RSV signature over a fixed or
//! SIP-018 structured challenge, checks it against the claimed public key
//! and derives the signer's c32check Stacks address.

pub mod address;
pub mod clarity;
pub mod error;
pub mod signature;

// Re-export the most commonly used types
pub use address::{Network, StacksAddress};
pub use error::AuthError;
pub use signature::{sign_challenge, Challenge, Domain, SignatureVerifier, VerifiedIdentity};
