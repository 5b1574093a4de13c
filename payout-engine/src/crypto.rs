//! Transfer signing
//!
//! This module provides:
//! - The [`TransferSigner`] seam used by the processing loop
//! - An Ed25519 signer loaded from a 32-byte hex seed
//! - SHA-256 digests for logging signed payloads without the key

use crate::{
    chain::{SignedTransfer, Transfer},
    Error, Result,
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Turns an unsigned transfer into a broadcastable one
pub trait TransferSigner: Send + Sync {
    /// Sign `transfer`
    fn sign_transfer(&self, transfer: Transfer) -> Result<SignedTransfer>;
}

/// Ed25519 key pair for signing transfers
#[derive(Debug)]
pub struct Ed25519Signer {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl Ed25519Signer {
    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Parse a hex seed, with or without `0x`
    pub fn from_hex_seed(seed_hex: &str) -> Result<Self> {
        let trimmed = seed_hex.trim().trim_start_matches("0x");
        let bytes = hex::decode(trimmed)
            .map_err(|e| Error::Signing(format!("Key is not valid hex: {}", e)))?;
        let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            Error::Signing(format!("Key must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self::from_seed(&seed))
    }

    /// Get public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Verify a signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature = Signature::from_slice(signature)
            .map_err(|e| Error::Signing(format!("Malformed signature: {}", e)))?;
        self.verifying_key
            .verify(message, &signature)
            .map_err(|e| Error::Signing(format!("Verification failed: {}", e)))
    }
}

impl TransferSigner for Ed25519Signer {
    fn sign_transfer(&self, transfer: Transfer) -> Result<SignedTransfer> {
        let message = transfer.canonical_bytes();
        let signature = self.signing_key.sign(&message).to_bytes().to_vec();
        let public_key = self.public_key().to_vec();

        // Wire form: message || public key || signature
        let mut raw = Vec::with_capacity(message.len() + public_key.len() + signature.len());
        raw.extend_from_slice(&message);
        raw.extend_from_slice(&public_key);
        raw.extend_from_slice(&signature);

        Ok(SignedTransfer {
            transfer,
            signature,
            public_key,
            raw,
        })
    }
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SIMPLE_TRANSFER_GAS;
    use num_bigint::BigUint;

    fn transfer() -> Transfer {
        Transfer {
            chain_id: 1,
            nonce: 3,
            to: "0xdef".to_string(),
            amount: BigUint::from(10u32),
            fee_price: BigUint::from(1u32),
            gas_limit: SIMPLE_TRANSFER_GAS,
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = Ed25519Signer::from_seed(&rand::random::<[u8; 32]>());
        let signed = signer.sign_transfer(transfer()).unwrap();

        assert!(signer
            .verify(&signed.transfer.canonical_bytes(), &signed.signature)
            .is_ok());
        assert_eq!(signed.public_key, signer.public_key().to_vec());
        assert!(signed.raw.starts_with(&transfer().canonical_bytes()));
    }

    #[test]
    fn test_tampered_transfer_fails_verification() {
        let signer = Ed25519Signer::from_seed(&[7u8; 32]);
        let signed = signer.sign_transfer(transfer()).unwrap();

        let mut tampered = signed.transfer.clone();
        tampered.amount = BigUint::from(11u32);
        assert!(signer
            .verify(&tampered.canonical_bytes(), &signed.signature)
            .is_err());
    }

    #[test]
    fn test_from_hex_seed() {
        let seed = "0x".to_string() + &"11".repeat(32);
        let signer = Ed25519Signer::from_hex_seed(&seed).unwrap();
        assert_eq!(
            signer.public_key(),
            Ed25519Signer::from_seed(&[0x11u8; 32]).public_key()
        );
    }

    #[test]
    fn test_bad_key_material_is_signing_error() {
        assert!(matches!(
            Ed25519Signer::from_hex_seed("0x1234"),
            Err(Error::Signing(_))
        ));
        assert!(matches!(
            Ed25519Signer::from_hex_seed("not hex"),
            Err(Error::Signing(_))
        ));
    }

    #[test]
    fn test_hash_bytes() {
        assert_eq!(hash_bytes(b"payout"), hash_bytes(b"payout"));
        assert_ne!(hash_bytes(b"payout"), hash_bytes(b"payouts"));
    }
}
