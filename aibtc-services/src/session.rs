//! Session issuance and lookup.
//!
//! A session is three independent store entries written one after another:
//! `session:{token} -> address`, `address:{address} -> token` and
//! `pubkey:{address} -> public key`. The store has no transactions, so a
//! reader may find one entry without the others; every lookup treats a
//! missing entry as "not found".

use std::time::Duration;

use aibtc_auth::{StacksAddress, VerifiedIdentity};
use aibtc_kv::{KvStore, SharedStore};
use uuid::Uuid;

use crate::config::DEFAULT_SESSION_TTL_SECS;
use crate::error::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lifetime of every entry written at issuance
    pub ttl: Duration,
    /// Delete the address's previous session entry when issuing a new one
    pub revoke_previous_sessions: bool,
    /// Namespace for this subsystem's keys
    pub key_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            revoke_previous_sessions: false,
            key_prefix: "auth".to_string(),
        }
    }
}

/// A freshly issued session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub address: String,
    pub session_token: String,
}

#[derive(Clone)]
pub struct SessionManager {
    store: SharedStore,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(store: SharedStore, config: SessionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn session_key(&self, token: &str) -> String {
        format!("{}:session:{}", self.config.key_prefix, token)
    }

    fn address_key(&self, address: &str) -> String {
        format!("{}:address:{}", self.config.key_prefix, address)
    }

    fn pubkey_key(&self, address: &str) -> String {
        format!("{}:pubkey:{}", self.config.key_prefix, address)
    }

    /// Mint a token for a verified identity and index it both ways.
    ///
    /// Signing in again before expiry overwrites the address index and so
    /// resets its ttl. Earlier tokens stay valid until their own ttl lapses
    /// unless `revoke_previous_sessions` is set.
    pub async fn issue_session(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<IssuedSession, ServiceError> {
        let address = identity.address.to_string();
        let token = Uuid::new_v4().to_string();
        let ttl = Some(self.config.ttl);

        if self.config.revoke_previous_sessions {
            self.revoke_previous(&address).await;
        }

        // The session entry is authoritative, so it goes first
        self.store.put(&self.session_key(&token), &address, ttl).await?;
        self.store.put(&self.address_key(&address), &token, ttl).await?;
        self.store
            .put(&self.pubkey_key(&address), &identity.public_key, ttl)
            .await?;

        log::info!("Issued session for {}", address);

        Ok(IssuedSession {
            address,
            session_token: token,
        })
    }

    async fn revoke_previous(&self, address: &str) {
        let previous = match self.store.get(&self.address_key(address)).await {
            Ok(previous) => previous,
            Err(e) => {
                log::warn!("Unable to look up previous session for {}: {}", address, e);
                return;
            }
        };

        if let Some(previous) = previous {
            if let Err(e) = self.store.delete(&self.session_key(&previous)).await {
                log::warn!("Unable to revoke previous session for {}: {}", address, e);
            }
        }
    }

    /// The current token indexed for `address`
    pub async fn verify_address(&self, address: &str) -> Result<String, ServiceError> {
        let address = parse_address(address)?;
        self.store
            .get(&self.address_key(&address))
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated(format!("Address not found: {}", address)))
    }

    /// The address that owns `token`
    pub async fn verify_session_token(&self, token: &str) -> Result<String, ServiceError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ServiceError::MalformedInput(
                "Missing required parameter: data".to_string(),
            ));
        }
        self.store
            .get(&self.session_key(token))
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated("Invalid or expired session token".to_string()))
    }

    /// The public key recorded at the address's last sign-in
    pub async fn public_key_for(&self, address: &str) -> Result<String, ServiceError> {
        let address = parse_address(address)?;
        self.store
            .get(&self.pubkey_key(&address))
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated(format!("Address not found: {}", address)))
    }
}

/// Addresses are looked up in their canonical upper-case form
fn parse_address(address: &str) -> Result<String, ServiceError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ServiceError::MalformedInput(
            "Missing required parameter: data".to_string(),
        ));
    }
    let parsed: StacksAddress = address.parse()?;
    Ok(parsed.to_string())
}
