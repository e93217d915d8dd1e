use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::{Network, StacksAddress};
use crate::clarity::{encode_structured_data, ClarityValue};
use crate::error::AuthError;

/// Prefix prepended by Stacks wallets when signing a plain text message
const STACKS_MESSAGE_PREFIX: &[u8] = b"\x17Stacks Signed Message:\n";

/// Length of an RSV signature: r (32) || s (32) || v (1)
pub const RSV_SIGNATURE_LEN: usize = 65;

const COMPRESSED_KEY_LEN: usize = 33;

/// SIP-018 domain: binds a signature to one application, version and chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
}

impl Domain {
    pub fn to_clarity(&self) -> Result<ClarityValue, AuthError> {
        Ok(ClarityValue::Tuple(vec![
            ("name".to_string(), ClarityValue::string_ascii(&self.name)?),
            ("version".to_string(), ClarityValue::string_ascii(&self.version)?),
            ("chain-id".to_string(), ClarityValue::UInt(self.chain_id as u128)),
        ]))
    }
}

/// The bytes a client is expected to sign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Challenge {
    /// A constant text message, hashed the way Stacks wallets hash signed messages
    Fixed { message: String },
    /// A SIP-018 structured message bound to a domain
    Structured { domain: Domain, message: String },
}

impl Challenge {
    /// The 32-byte digest the signature must be made over
    pub fn digest(&self) -> Result<[u8; 32], AuthError> {
        match self {
            Self::Fixed { message } => Ok(hash_message(message.as_bytes())),
            Self::Structured { domain, message } => {
                let encoded = encode_structured_data(
                    &domain.to_clarity()?,
                    &ClarityValue::string_ascii(message)?,
                );
                Ok(Sha256::digest(encoded).into())
            }
        }
    }
}

/// Stacks signed-message hash: `sha256(prefix || varint(len) || message)`
pub fn hash_message(message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(STACKS_MESSAGE_PREFIX);
    hasher.update(encode_varint(message.len() as u64));
    hasher.update(message);
    hasher.finalize().into()
}

fn encode_varint(n: u64) -> Vec<u8> {
    match n {
        0..=0xfc => vec![n as u8],
        0xfd..=0xffff => {
            let mut out = vec![0xfd];
            out.extend_from_slice(&(n as u16).to_le_bytes());
            out
        }
        0x1_0000..=0xffff_ffff => {
            let mut out = vec![0xfe];
            out.extend_from_slice(&(n as u32).to_le_bytes());
            out
        }
        _ => {
            let mut out = vec![0xff];
            out.extend_from_slice(&n.to_le_bytes());
            out
        }
    }
}

/// Parse a hex RSV signature into its signature and recovery id.
///
/// Shape problems (not hex, wrong length) are malformed input; anything that
/// is shaped correctly but unusable is an invalid signature.
pub fn parse_rsv_signature(signature: &str) -> Result<(Signature, RecoveryId), AuthError> {
    let trimmed = signature.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let bytes = hex::decode(trimmed)
        .map_err(|_| AuthError::MalformedInput("signature is not valid hex".to_string()))?;
    if bytes.len() != RSV_SIGNATURE_LEN {
        return Err(AuthError::MalformedInput(format!(
            "signature must be {} bytes, got {}",
            RSV_SIGNATURE_LEN,
            bytes.len()
        )));
    }

    let signature = Signature::from_slice(&bytes[..64]).map_err(|_| AuthError::SignatureInvalid)?;

    // Only the low-S form is accepted, the high-S twin is a malleated copy
    if signature.normalize_s().is_some() {
        log::debug!("Rejecting high-S signature");
        return Err(AuthError::SignatureInvalid);
    }

    let recovery_id = RecoveryId::from_byte(bytes[64]).ok_or(AuthError::SignatureInvalid)?;

    Ok((signature, recovery_id))
}

/// Parse a SEC1 encoded public key from hex. The flag is true when the key
/// was given in compressed form.
pub fn parse_public_key(public_key: &str) -> Result<(VerifyingKey, bool), AuthError> {
    let trimmed = public_key.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(trimmed)
        .map_err(|_| AuthError::MalformedInput("publicKey is not valid hex".to_string()))?;
    let key = VerifyingKey::from_sec1_bytes(&bytes)
        .map_err(|_| AuthError::MalformedInput("publicKey is not a valid secp256k1 key".to_string()))?;
    Ok((key, bytes.len() == COMPRESSED_KEY_LEN))
}

/// Recover the public key from an RSV signature over a digest
pub fn recover_public_key(digest: &[u8; 32], signature: &str) -> Result<VerifyingKey, AuthError> {
    let (signature, recovery_id) = parse_rsv_signature(signature)?;
    VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
        .map_err(|_| AuthError::SignatureInvalid)
}

/// Sign a challenge, returning the hex RSV signature
pub fn sign_challenge(challenge: &Challenge, signing_key: &SigningKey) -> Result<String, AuthError> {
    let digest = challenge.digest()?;
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(&digest)
        .map_err(|_| AuthError::SignatureInvalid)?;

    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte());
    Ok(hex::encode(bytes))
}

/// The outcome of a successful verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub address: StacksAddress,
    /// SEC1 public key in the encoding the address was derived from, hex encoded
    pub public_key: String,
}

/// Verifies signatures over one fixed challenge for one network
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    challenge: Challenge,
    network: Network,
    digest: [u8; 32],
}

impl SignatureVerifier {
    pub fn new(challenge: Challenge, network: Network) -> Result<Self, AuthError> {
        let digest = challenge.digest()?;
        Ok(Self {
            challenge,
            network,
            digest,
        })
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    /// Check that `signature` was produced over the challenge by the holder of
    /// `public_key` and derive that holder's address.
    pub fn verify_and_derive_address(
        &self,
        signature: &str,
        public_key: &str,
    ) -> Result<VerifiedIdentity, AuthError> {
        let (claimed, compressed) = parse_public_key(public_key)?;
        let recovered = recover_public_key(&self.digest, signature)?;

        if recovered != claimed {
            log::debug!("Recovered public key does not match the claimed public key");
            return Err(AuthError::SignatureInvalid);
        }

        let address = StacksAddress::from_public_key(&recovered, compressed, self.network);
        validate_address(&address, self.network)?;

        Ok(VerifiedIdentity {
            address,
            public_key: hex::encode(recovered.to_encoded_point(compressed).as_bytes()),
        })
    }
}

fn validate_address(address: &StacksAddress, network: Network) -> Result<(), AuthError> {
    let rendered = address.to_string();
    let parsed: StacksAddress = rendered
        .parse()
        .map_err(|e: AuthError| AuthError::AddressDerivationFailed(e.to_string()))?;

    if parsed != *address || parsed.network() != Some(network) {
        return Err(AuthError::AddressDerivationFailed(format!(
            "{} is not a {} single-sig address",
            rendered, network
        )));
    }
    Ok(())
}
