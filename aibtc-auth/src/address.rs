//! c32check Stacks addresses.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::VerifyingKey;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AuthError;

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Single-sig (P2PKH) address version on mainnet, renders as `SP...`
pub const MAINNET_SINGLE_SIG: u8 = 22;
/// Single-sig (P2PKH) address version on testnet, renders as `ST...`
pub const TESTNET_SINGLE_SIG: u8 = 26;

/// SIP-005 chain ids
pub const MAINNET_CHAIN_ID: u64 = 0x0000_0001;
pub const TESTNET_CHAIN_ID: u64 = 0x8000_0000;

/// Stacks network the service derives addresses for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn address_version(&self) -> u8 {
        match self {
            Self::Mainnet => MAINNET_SINGLE_SIG,
            Self::Testnet => TESTNET_SINGLE_SIG,
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Mainnet => MAINNET_CHAIN_ID,
            Self::Testnet => TESTNET_CHAIN_ID,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            other => Err(format!("unknown network: {other}")),
        }
    }
}

/// A Stacks account address: a version byte and the hash160 of a public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StacksAddress {
    version: u8,
    hash160: [u8; 20],
}

impl StacksAddress {
    pub fn new(version: u8, hash160: [u8; 20]) -> Result<Self, AuthError> {
        if version >= 32 {
            return Err(AuthError::InvalidAddress(format!("version {version} out of range")));
        }
        Ok(Self { version, hash160 })
    }

    /// Derive the single-sig address of a public key on the given network.
    ///
    /// The key is hashed in the SEC1 form it was presented in. A compressed and
    /// an uncompressed encoding of the same point are different accounts.
    pub fn from_public_key(key: &VerifyingKey, compressed: bool, network: Network) -> Self {
        let encoded = key.to_encoded_point(compressed);
        Self {
            version: network.address_version(),
            hash160: hash160(encoded.as_bytes()),
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn hash160(&self) -> &[u8; 20] {
        &self.hash160
    }

    pub fn network(&self) -> Option<Network> {
        match self.version {
            MAINNET_SINGLE_SIG => Some(Network::Mainnet),
            TESTNET_SINGLE_SIG => Some(Network::Testnet),
            _ => None,
        }
    }
}

impl fmt::Display for StacksAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", c32check_encode(self.version, &self.hash160))
    }
}

impl FromStr for StacksAddress {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let encoded = s
            .strip_prefix(['S', 's'])
            .ok_or_else(|| AuthError::InvalidAddress(s.to_string()))?;
        let (version, data) = c32check_decode(encoded)
            .map_err(|_| AuthError::InvalidAddress(s.to_string()))?;
        let hash160: [u8; 20] = data
            .as_slice()
            .try_into()
            .map_err(|_| AuthError::InvalidAddress(s.to_string()))?;
        Self::new(version, hash160)
    }
}

impl Serialize for StacksAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StacksAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// `ripemd160(sha256(data))`
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

fn checksum(version: u8, data: &[u8]) -> [u8; 4] {
    let mut hasher = Sha256::new();
    hasher.update([version]);
    hasher.update(data);
    let first = hasher.finalize();
    let second = Sha256::digest(first);
    [second[0], second[1], second[2], second[3]]
}

/// Encode bytes as a big-endian base-32 number in the Crockford-style c32
/// alphabet. Every leading zero byte is kept as a leading `0` digit.
pub fn c32_encode(data: &[u8]) -> String {
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 8 / 5 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0;

    for &byte in data.iter().rev() {
        acc |= (byte as u32) << bits;
        bits += 8;
        while bits >= 5 {
            digits.push(C32_ALPHABET[(acc & 0x1f) as usize]);
            acc >>= 5;
            bits -= 5;
        }
    }
    if bits > 0 {
        digits.push(C32_ALPHABET[(acc & 0x1f) as usize]);
    }

    // digits are least significant first
    while digits.last() == Some(&b'0') {
        digits.pop();
    }
    let leading_zero_bytes = data.iter().take_while(|b| **b == 0).count();
    digits.extend(std::iter::repeat(b'0').take(leading_zero_bytes));

    digits.iter().rev().map(|d| *d as char).collect()
}

fn c32_digit(c: char) -> Result<u8, AuthError> {
    let normalized = match c.to_ascii_uppercase() {
        'O' => '0',
        'I' | 'L' => '1',
        other => other,
    };
    C32_ALPHABET
        .iter()
        .position(|d| *d as char == normalized)
        .map(|p| p as u8)
        .ok_or_else(|| AuthError::InvalidAddress(format!("invalid c32 character {c:?}")))
}

/// Inverse of [`c32_encode`]
pub fn c32_decode(input: &str) -> Result<Vec<u8>, AuthError> {
    let digits = input.chars().map(c32_digit).collect::<Result<Vec<u8>, _>>()?;

    let mut bytes: Vec<u8> = Vec::with_capacity(digits.len() * 5 / 8 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for &digit in digits.iter().rev() {
        acc |= (digit as u32) << bits;
        bits += 5;
        if bits >= 8 {
            bytes.push((acc & 0xff) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 && acc != 0 {
        bytes.push(acc as u8);
    }

    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    let leading_zero_digits = digits.iter().take_while(|d| **d == 0).count();
    bytes.extend(std::iter::repeat(0u8).take(leading_zero_digits));
    bytes.reverse();
    Ok(bytes)
}

/// Encode `data` with a version character and a 4-byte double-sha256 checksum
pub fn c32check_encode(version: u8, data: &[u8]) -> String {
    let mut payload = data.to_vec();
    payload.extend_from_slice(&checksum(version, data));
    format!("{}{}", C32_ALPHABET[(version & 0x1f) as usize] as char, c32_encode(&payload))
}

/// Decode a c32check string into its version and payload, verifying the checksum
pub fn c32check_decode(input: &str) -> Result<(u8, Vec<u8>), AuthError> {
    let mut chars = input.chars();
    let version_char = chars
        .next()
        .ok_or_else(|| AuthError::InvalidAddress("empty c32check string".to_string()))?;
    let version = c32_digit(version_char)?;

    let decoded = c32_decode(chars.as_str())?;
    if decoded.len() < 4 {
        return Err(AuthError::InvalidAddress("c32check payload too short".to_string()));
    }
    let (data, expected) = decoded.split_at(decoded.len() - 4);
    if checksum(version, data) != expected {
        return Err(AuthError::InvalidAddress("c32check checksum mismatch".to_string()));
    }
    Ok((version, data.to_vec()))
}
