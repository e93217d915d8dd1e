use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use aibtc_auth::{Challenge, Domain, Network, SignatureVerifier};
use aibtc_kv::RetryConfig;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::session::SessionConfig;
use crate::store::parse_shared_key;

pub const DEFAULT_LISTEN: ([u8; 4], u16) = ([0, 0, 0, 0], 8787);
/// 30 days
pub const DEFAULT_SESSION_TTL_SECS: u64 = 2_592_000;
/// 365 days
pub const MAX_SESSION_TTL_SECS: u64 = 31_536_000;
pub const DEFAULT_DOMAIN_NAME: &str = "sprint.aibtc.dev";
pub const DEFAULT_DOMAIN_VERSION: &str = "0.0.1";
pub const DEFAULT_STRUCTURED_MESSAGE: &str = "Welcome to aibtcdev!";
pub const DEFAULT_FIXED_MESSAGE: &str = "welcome to aibtcdev!";
pub const MEMORY_STORE_URL: &str = "memory";

/// Which bytes clients sign when requesting a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeMode {
    /// A plain text message
    Fixed,
    /// A SIP-018 message bound to the configured domain
    #[default]
    Structured,
}

fn default_trusted_callers() -> Vec<String> {
    vec!["aibtcdev-frontend".to_string(), "aibtcdev-backend".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize, Args)]
#[serde(default)]
pub struct ServiceConfig {
    #[clap(long, short = 'l', default_value_t = SocketAddr::from(DEFAULT_LISTEN))]
    pub listen: SocketAddr,
    #[clap(long, short = 'n', default_value_t = Network::Mainnet)]
    pub network: Network,
    #[clap(long = "challenge-mode", value_enum, default_value_t = ChallengeMode::Structured)]
    pub challenge_mode: ChallengeMode,
    #[clap(long = "challenge-message", help = "Message clients sign; defaults depend on the challenge mode")]
    pub challenge_message: Option<String>,
    #[clap(long = "domain-name", default_value = DEFAULT_DOMAIN_NAME)]
    pub domain_name: String,
    #[clap(long = "domain-version", default_value = DEFAULT_DOMAIN_VERSION)]
    pub domain_version: String,
    #[clap(long = "chain-id", help = "SIP-018 chain id; defaults to the network's chain id")]
    pub chain_id: Option<u64>,
    #[clap(long = "session-ttl", default_value_t = DEFAULT_SESSION_TTL_SECS)]
    pub session_ttl_secs: u64,
    #[clap(long = "revoke-previous-sessions", help = "Delete an address's previous session when it signs in again")]
    pub revoke_previous_sessions: bool,
    #[clap(long = "trusted-caller", value_delimiter = ',', default_values_t = default_trusted_callers())]
    pub trusted_callers: Vec<String>,
    #[clap(long = "store-url", short = 's', default_value = MEMORY_STORE_URL)]
    pub store_url: String,
    #[clap(
        long = "seed-shared-key",
        value_delimiter = ',',
        help = "name=secret pairs written to the in-memory store at startup"
    )]
    pub seed_shared_keys: Vec<String>,
    #[clap(long = "store-timeout-ms", default_value_t = 2000)]
    pub store_timeout_ms: u64,
    #[clap(long = "store-retries", default_value_t = 2)]
    pub store_retries: u32,
    #[clap(long = "log-level", default_value = "info")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(DEFAULT_LISTEN),
            network: Network::Mainnet,
            challenge_mode: ChallengeMode::Structured,
            challenge_message: None,
            domain_name: DEFAULT_DOMAIN_NAME.to_string(),
            domain_version: DEFAULT_DOMAIN_VERSION.to_string(),
            chain_id: None,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            revoke_previous_sessions: false,
            trusted_callers: default_trusted_callers(),
            store_url: MEMORY_STORE_URL.to_string(),
            seed_shared_keys: vec![],
            store_timeout_ms: 2000,
            store_retries: 2,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        log::info!("Reading service config from {}", path.display());
        let bytes = std::fs::read(path).map_err(|e| {
            ServiceError::Configuration(format!("unable to read {}: {e}", path.display()))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ServiceError::Configuration(format!("unable to parse {}: {e}", path.display()))
        })
    }

    /// The challenge every client must sign for this deployment
    pub fn challenge(&self) -> Challenge {
        match self.challenge_mode {
            ChallengeMode::Fixed => Challenge::Fixed {
                message: self
                    .challenge_message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_FIXED_MESSAGE.to_string()),
            },
            ChallengeMode::Structured => Challenge::Structured {
                domain: Domain {
                    name: self.domain_name.clone(),
                    version: self.domain_version.clone(),
                    chain_id: self.chain_id.unwrap_or_else(|| self.network.chain_id()),
                },
                message: self
                    .challenge_message
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STRUCTURED_MESSAGE.to_string()),
            },
        }
    }

    pub fn verifier(&self) -> Result<SignatureVerifier, ServiceError> {
        SignatureVerifier::new(self.challenge(), self.network)
            .map_err(|e| ServiceError::Configuration(format!("invalid challenge: {e}")))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            ttl: Duration::from_secs(self.session_ttl_secs),
            revoke_previous_sessions: self.revoke_previous_sessions,
            ..SessionConfig::default()
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            timeout: Duration::from_millis(self.store_timeout_ms),
            max_retries: self.store_retries,
            ..RetryConfig::default()
        }
    }

    pub fn log_level(&self) -> Result<log::LevelFilter, ServiceError> {
        self.log_level
            .parse()
            .map_err(|_| ServiceError::Configuration(format!("unknown log level: {}", self.log_level)))
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.trusted_callers.is_empty() {
            return Err(ServiceError::Configuration(
                "at least one trusted caller is required".to_string(),
            ));
        }
        if self.trusted_callers.iter().any(|name| name.trim().is_empty()) {
            return Err(ServiceError::Configuration(
                "trusted caller names cannot be empty".to_string(),
            ));
        }
        if self.session_ttl_secs == 0 {
            return Err(ServiceError::Configuration(
                "session ttl must be greater than zero".to_string(),
            ));
        }
        if self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ServiceError::Configuration(format!(
                "session ttl cannot exceed {} seconds",
                MAX_SESSION_TTL_SECS
            )));
        }
        if self.store_timeout_ms == 0 {
            return Err(ServiceError::Configuration(
                "store timeout must be greater than zero".to_string(),
            ));
        }
        if self.store_url != MEMORY_STORE_URL
            && !self.store_url.starts_with("redis://")
            && !self.store_url.starts_with("rediss://")
        {
            return Err(ServiceError::Configuration(format!(
                "unsupported store url: {}",
                self.store_url
            )));
        }
        for pair in &self.seed_shared_keys {
            parse_shared_key(pair)?;
        }
        self.log_level()?;
        self.verifier()?;
        Ok(())
    }
}
