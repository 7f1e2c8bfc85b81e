//! Walkthrough of the sign-then-recover flow

use evm_signer::secp256k1::{recover_address, Secp256k1Signer};
use evm_signer::traits::Signer;

fn main() {
    println!("=== secp256k1 Sign / Recover Walkthrough ===\n");

    // Generate keypair
    let signer = Secp256k1Signer::random();
    println!("Signer address: {}", signer.address());
    println!("Public key:     {}\n", signer.public_key_hex());

    // Sign a message
    let message = b"validator heartbeat";
    let signature = signer.sign(message).expect("signing failed");
    println!("Message:   {:?}", std::str::from_utf8(message).unwrap());
    println!("Signature: 0x{} ({} bytes)\n", hex::encode(&signature), signature.len());

    // Recover the address from (message, signature) alone
    let recovered = recover_address(message, &signature).expect("recovery failed");
    println!("Recovered address: {}", recovered);
    println!("Matches signer:    {}\n", recovered == signer.address());

    // A tampered message recovers a different (or no) address
    match recover_address(b"validator heartbeat!", &signature) {
        Ok(other) => {
            println!("Tampered message recovers: {}", other);
            println!("Matches signer:            {}", other == signer.address());
        }
        Err(e) => println!("Tampered message recovery failed: {}", e),
    }
}
