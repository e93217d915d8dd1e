//! Clarity value consensus encoding, limited to the types that appear in
//! SIP-018 structured data domains and messages.

use sha2::{Digest, Sha256};

use crate::error::AuthError;

const TYPE_UINT: u8 = 0x01;
const TYPE_TUPLE: u8 = 0x0c;
const TYPE_STRING_ASCII: u8 = 0x0d;

/// SIP-018 structured data prefix ("SIP018")
pub const STRUCTURED_DATA_PREFIX: [u8; 6] = *b"SIP018";

/// A Clarity value that can be consensus-serialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarityValue {
    UInt(u128),
    StringAscii(String),
    Tuple(Vec<(String, ClarityValue)>),
}

impl ClarityValue {
    /// Build a `string-ascii` value, rejecting non-ASCII input
    pub fn string_ascii(value: &str) -> Result<Self, AuthError> {
        if !value.is_ascii() {
            return Err(AuthError::MalformedInput(format!(
                "string-ascii value contains non-ASCII characters: {}",
                value
            )));
        }
        Ok(Self::StringAscii(value.to_string()))
    }

    /// Serialize the value using the Clarity consensus wire format
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Self::UInt(n) => {
                out.push(TYPE_UINT);
                out.extend_from_slice(&n.to_be_bytes());
            }
            Self::StringAscii(s) => {
                out.push(TYPE_STRING_ASCII);
                out.extend_from_slice(&(s.len() as u32).to_be_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            Self::Tuple(entries) => {
                // Tuple entries are serialized in lexicographic order of their names
                let mut sorted: Vec<&(String, ClarityValue)> = entries.iter().collect();
                sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

                out.push(TYPE_TUPLE);
                out.extend_from_slice(&(sorted.len() as u32).to_be_bytes());
                for (name, value) in sorted {
                    out.push(name.len() as u8);
                    out.extend_from_slice(name.as_bytes());
                    value.write_to(out);
                }
            }
        }
    }
}

/// Encode a SIP-018 structured data payload:
/// `"SIP018" || sha256(domain) || sha256(message)`
pub fn encode_structured_data(domain: &ClarityValue, message: &ClarityValue) -> Vec<u8> {
    let mut out = Vec::with_capacity(STRUCTURED_DATA_PREFIX.len() + 64);
    out.extend_from_slice(&STRUCTURED_DATA_PREFIX);
    out.extend_from_slice(&Sha256::digest(domain.serialize()));
    out.extend_from_slice(&Sha256::digest(message.serialize()));
    out
}
