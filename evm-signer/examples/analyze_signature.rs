//! Analyze the 65-byte recoverable signature format
use evm_signer::secp256k1::{personal_message_hash, recover_address, Secp256k1Signer, SIGNATURE_LENGTH};
use evm_signer::traits::Signer;

fn main() {
    println!("=== Recoverable Signature Format Analysis ===\n");

    let signer = Secp256k1Signer::random();
    let message = b"Test message";

    let signature = signer.sign(message).expect("signing failed");

    println!("Original message: {:?}", std::str::from_utf8(message).unwrap());
    println!("Original message length: {} bytes", message.len());
    println!("Signature total length: {} bytes", signature.len());
    println!("Expected length constant: {} bytes", SIGNATURE_LENGTH);
    println!();

    // Layout: r (32) || s (32) || v (1)
    let r = &signature[..32];
    let s = &signature[32..64];
    let v = signature[64];
    println!("Signature layout:");
    println!("  r: 0x{}", hex::encode(r));
    println!("  s: 0x{}", hex::encode(s));
    println!("  v: {} (27 + recovery id {})", v, v - 27);
    println!();

    // The signed digest is the prefixed personal-message hash, not the raw message
    let digest = personal_message_hash(message);
    println!("Personal-message digest: 0x{}", hex::encode(digest));
    println!();

    // Attempt recovery
    match recover_address(message, &signature) {
        Ok(recovered) => {
            println!("✓ Recovery successful!");
            println!("  Recovered address: {}", recovered);
            println!("  Address matches:   {}", recovered == signer.address());
        }
        Err(e) => {
            println!("✗ Recovery failed: {}", e);
        }
    }
}
