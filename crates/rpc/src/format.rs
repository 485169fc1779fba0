// Path: crates/rpc/src/format.rs
//! Checksummed base58 ("CB58"): payload followed by the last four bytes
//! of its SHA-256, base58-encoded.

use sha2::{Digest, Sha256};

const CHECKSUM_LEN: usize = 4;

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest: [u8; 32] = Sha256::digest(payload).into();
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[32 - CHECKSUM_LEN..]);
    out
}

pub fn cb58_encode(payload: &[u8]) -> String {
    let mut buf = payload.to_vec();
    buf.extend_from_slice(&checksum(payload));
    bs58::encode(buf).into_string()
}

pub fn cb58_decode(encoded: &str) -> Result<Vec<u8>, String> {
    let buf = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| format!("invalid base58: {e}"))?;
    if buf.len() < CHECKSUM_LEN {
        return Err("input shorter than its checksum".into());
    }
    let (payload, suffix) = buf.split_at(buf.len() - CHECKSUM_LEN);
    if suffix != checksum(payload) {
        return Err("checksum mismatch".into());
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for payload in [&b""[..], &b"kiln"[..], &[0u8; 32][..]] {
            let encoded = cb58_encode(payload);
            assert_eq!(cb58_decode(&encoded).unwrap(), payload);
        }
    }

    #[test]
    fn corruption_detected() {
        let mut encoded = cb58_encode(b"payload");
        // Flip a character (base58 alphabet excludes '0').
        encoded.replace_range(0..1, if &encoded[0..1] == "2" { "3" } else { "2" });
        assert!(cb58_decode(&encoded).is_err());
    }

    #[test]
    fn truncated_input_rejected() {
        assert!(cb58_decode("2g").is_err());
    }
}
