/// Unified interface for message signers
use crate::error::Result;

/// Signer trait
pub trait Signer {
    /// Sign message (personal-message semantics)
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;

    /// Verify a signature over `message` against this signer's address
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool>;

    /// Get uncompressed public key bytes (65 bytes, 0x04-prefixed)
    fn public_key(&self) -> Vec<u8>;

    /// Checksum address of the signing key
    fn address(&self) -> String;

    /// Algorithm name
    fn algorithm_name(&self) -> &str;
}
