// Path: crates/crypto/src/signer.rs
//! Recoverable secp256k1 signing.
//!
//! The wire signature is 65 bytes: `r ‖ s ‖ v`, where `v` is the k256
//! recovery id. Messages are pre-hashed with SHA-256; addresses are the
//! last 20 bytes of the Keccak-256 of the uncompressed public key (0x04
//! prefix stripped).

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use kiln_types::error::CryptoError;
use kiln_types::ids::{Address, ADDRESS_LEN, SIGNATURE_LEN};
use rand::rngs::OsRng;

use crate::hash::{keccak256, sha256};

/// A secp256k1 private key with signing capability.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::random(&mut OsRng),
        }
    }

    /// Rebuild a keypair from the 32 raw private-key bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        SigningKey::from_slice(bytes)
            .map(|signing| Self { signing })
            .map_err(|_| CryptoError::InvalidKey)
    }

    /// The 32 raw private-key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes().into()
    }

    /// The address this key signs for.
    pub fn address(&self) -> Address {
        address_of(self.signing.verifying_key())
    }

    /// Sign `message`, returning the 65-byte recoverable signature.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; SIGNATURE_LEN], CryptoError> {
        let digest = sha256(message);
        let (signature, recovery_id) = self
            .signing
            .sign_prehash_recoverable(&digest)
            .map_err(|_| CryptoError::InvalidKey)?;

        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = recovery_id.to_byte();
        Ok(out)
    }
}

/// Recover the signer address of `message` from a 65-byte signature.
pub fn recover(message: &[u8], sig: &[u8; SIGNATURE_LEN]) -> Result<Address, CryptoError> {
    let digest = sha256(message);
    let signature = Signature::from_slice(&sig[..64]).map_err(|_| CryptoError::InvalidSignature)?;
    let recovery_id = RecoveryId::from_byte(sig[64]).ok_or(CryptoError::InvalidSignature)?;
    let verifying = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(address_of(&verifying))
}

fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let digest = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; ADDRESS_LEN];
    address.copy_from_slice(&digest[12..]);
    Address(address)
}
