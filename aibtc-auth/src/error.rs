use thiserror::Error;

/// Errors that can occur while verifying a signed challenge
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A required field is missing or cannot be parsed
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Cryptographic verification failed
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// The recovered public key did not produce a well-formed address
    #[error("Failed to derive address from public key: {0}")]
    AddressDerivationFailed(String),

    /// A c32check address string could not be decoded
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display() {
        let errors = vec![
            (AuthError::SignatureInvalid, "Signature verification failed"),
            (AuthError::MalformedInput("signature".to_string()), "Malformed input: signature"),
            (AuthError::InvalidAddress("SPX".to_string()), "Invalid address: SPX"),
            (
                AuthError::AddressDerivationFailed("wrong version".to_string()),
                "Failed to derive address from public key: wrong version",
            ),
        ];

        for (error, expected_message) in errors {
            assert_eq!(error.to_string(), expected_message);
        }
    }
}
