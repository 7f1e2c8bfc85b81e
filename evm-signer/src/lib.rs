//! EVM-style message signature library
//!
//! Provides recoverable secp256k1 signatures with EIP-191 personal-message
//! semantics, plus Keccak-256 address derivation with EIP-55 checksum
//! encoding.
//!
//! # Quick Start
//!
//! ```rust
//! use evm_signer::secp256k1::{recover_address, Secp256k1Signer};
//! use evm_signer::traits::Signer;
//!
//! // Generate keypair
//! let signer = Secp256k1Signer::random();
//!
//! // Sign message
//! let message = b"Validator report data";
//! let signature = signer.sign(message).unwrap();
//!
//! // Anyone can recover the signing address from (message, signature)
//! let recovered = recover_address(message, &signature).unwrap();
//! assert_eq!(recovered, signer.address());
//! ```

pub mod error;
pub mod secp256k1;
pub mod traits;

// Re-export commonly used types
pub use error::{Result, SignerError};
pub use secp256k1::Secp256k1Signer;
pub use traits::Signer;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secp256k1_integration() {
        let signer = Secp256k1Signer::random();

        let message = b"Integration test message";
        let signature = signer.sign(message).unwrap();
        let is_valid = signer.verify(message, &signature).unwrap();

        assert!(is_valid);
    }
}
