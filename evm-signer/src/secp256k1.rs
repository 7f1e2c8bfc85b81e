//! secp256k1 personal-message signer
//!
//! Implements the classic EVM signing flow used for off-chain attestations:
//!
//! 1. The message is prefixed with `"\x19Ethereum Signed Message:\n" + len`
//!    and hashed with Keccak-256 (EIP-191 "personal message" semantics).
//! 2. The prehash is signed with recoverable ECDSA over secp256k1.
//! 3. Verifiers recover the public key from `(message, signature)` and
//!    compare the derived checksum address, so no trusted key registry is
//!    needed to validate a report.
//!
//! Signatures are 65 bytes: `r || s || v`, with `v = 27 + recovery_id` for
//! compatibility with other EVM tooling.
//!
//! # Example
//!
//! ```rust
//! use evm_signer::secp256k1::Secp256k1Signer;
//! use evm_signer::traits::Signer;
//!
//! let signer = Secp256k1Signer::random();
//! let message = b"uptime report";
//! let signature = signer.sign(message).unwrap();
//! assert!(signer.verify(message, &signature).unwrap());
//! ```

use crate::error::{Result, SignerError};
use crate::traits::Signer;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use tracing::debug;

/// Length of a recoverable signature: r (32) + s (32) + v (1)
pub const SIGNATURE_LENGTH: usize = 65;

/// Compute Keccak-256 of arbitrary bytes
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// EIP-191 personal-message hash: `keccak256("\x19Ethereum Signed Message:\n" + len + message)`
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut hasher = Keccak256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Encode a 20-byte account as an EIP-55 mixed-case checksum address
pub fn to_checksum_address(account: &[u8; 20]) -> String {
    let lower = hex::encode(account);
    let digest = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        // Nibble i of the digest decides the case of hex char i
        let nibble = if i % 2 == 0 {
            digest[i / 2] >> 4
        } else {
            digest[i / 2] & 0x0f
        };
        if nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Derive the checksum address from an uncompressed public key (65 bytes, 0x04-prefixed)
pub fn address_from_public_key(public_key: &[u8]) -> Result<String> {
    if public_key.len() != 65 || public_key[0] != 0x04 {
        return Err(SignerError::KeyFormat(format!(
            "Expected 65-byte uncompressed public key, got {} bytes",
            public_key.len()
        )));
    }

    let digest = keccak256(&public_key[1..]);
    let mut account = [0u8; 20];
    account.copy_from_slice(&digest[12..]);
    Ok(to_checksum_address(&account))
}

/// Derive the checksum address from a hex-encoded uncompressed public key
pub fn address_from_public_key_hex(public_key_hex: &str) -> Result<String> {
    let clean = public_key_hex.strip_prefix("0x").unwrap_or(public_key_hex);
    let bytes = hex::decode(clean)
        .map_err(|e| SignerError::EncodingError(format!("Invalid public key hex: {}", e)))?;
    address_from_public_key(&bytes)
}

/// Recover the signing address from `(message, signature)` using personal-message semantics
///
/// # Parameters
/// - `message`: the exact bytes that were signed (before prefixing)
/// - `signature`: 65-byte `r || s || v` signature
///
/// # Errors
/// - `EncodingError` if the signature is not 65 bytes
/// - `RecoveryError` if the signature does not yield a valid public key
pub fn recover_address(message: &[u8], signature: &[u8]) -> Result<String> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(SignerError::EncodingError(format!(
            "Expected {}-byte signature, got {}",
            SIGNATURE_LENGTH,
            signature.len()
        )));
    }

    let sig = Signature::from_slice(&signature[..64])
        .map_err(|e| SignerError::RecoveryError(format!("Malformed signature: {}", e)))?;

    // Accept both raw (0/1) and EVM-style (27/28) recovery bytes
    let v = signature[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(recovery_byte)
        .ok_or_else(|| SignerError::RecoveryError(format!("Invalid recovery byte: {}", v)))?;

    let digest = personal_message_hash(message);
    let verifying_key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|e| SignerError::RecoveryError(format!("Public key recovery failed: {}", e)))?;

    let point = verifying_key.to_encoded_point(false);
    address_from_public_key(point.as_bytes())
}

/// secp256k1 signer holding a private scalar
///
/// The wrapped `SigningKey` zeroizes its scalar on drop, so the private key
/// does not linger in memory after the signer is released.
pub struct Secp256k1Signer {
    signing_key: SigningKey,
}

impl Secp256k1Signer {
    /// Generate a signer with a fresh random private key
    pub fn random() -> Self {
        let signer = Self {
            signing_key: SigningKey::random(&mut rand::rngs::OsRng),
        };
        debug!(address = %Signer::address(&signer), "Generated fresh signing key");
        signer
    }

    /// Restore a signer from raw private-key bytes (32 bytes)
    ///
    /// # Errors
    /// - Returns `KeyFormat` if the bytes are not a valid non-zero scalar
    pub fn from_bytes(private_key: &[u8]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(private_key)
            .map_err(|e| SignerError::KeyFormat(format!("Invalid private key: {}", e)))?;
        Ok(Self { signing_key })
    }

    /// Restore a signer from a hex private key (with or without `0x` prefix)
    pub fn from_hex(private_key_hex: &str) -> Result<Self> {
        let clean = private_key_hex
            .strip_prefix("0x")
            .unwrap_or(private_key_hex);
        let bytes = hex::decode(clean)
            .map_err(|e| SignerError::KeyFormat(format!("Invalid private key hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(SignerError::KeyFormat(format!(
                "Private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Self::from_bytes(&bytes)
    }

    /// Raw private-key bytes (32 bytes). Handle with care.
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    /// Uncompressed public key (65 bytes, 0x04-prefixed)
    pub fn public_key_uncompressed(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Hex-encoded uncompressed public key with `0x` prefix
    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.public_key_uncompressed()))
    }
}

impl Signer for Secp256k1Signer {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        let digest = personal_message_hash(message);
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|e| SignerError::SigningError(e.to_string()))?;

        let mut out = Vec::with_capacity(SIGNATURE_LENGTH);
        out.extend_from_slice(&signature.to_bytes());
        out.push(27 + recovery_id.to_byte());
        Ok(out)
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<bool> {
        let recovered = recover_address(message, signature)?;
        Ok(recovered == self.address())
    }

    fn public_key(&self) -> Vec<u8> {
        self.public_key_uncompressed()
    }

    fn address(&self) -> String {
        // Derivation from our own key cannot produce a malformed point
        address_from_public_key(&self.public_key_uncompressed())
            .unwrap_or_else(|_| String::new())
    }

    fn algorithm_name(&self) -> &str {
        "secp256k1-personal"
    }
}
