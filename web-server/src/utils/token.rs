// web-server/src/utils/token.rs
//! Unguessable identifiers handed to clients.
use alloy_primitives::Address;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Login challenge nonce: 128 random bits, lowercase hex
pub fn generate_nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Opaque session id for `address`: SHA-256 over 32 bytes of OS randomness
/// and the address, hex encoded
pub fn generate_session_id(address: &Address) -> String {
    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);

    let mut hasher = Sha256::new();
    hasher.update(seed);
    hasher.update(address.as_slice());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_nonce() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), 32);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(nonce, generate_nonce());
    }

    #[test]
    fn test_session_ids_are_unique_per_call() {
        let address = Address::repeat_byte(0x11);
        let first = generate_session_id(&address);

        assert_eq!(first.len(), 64);
        assert_ne!(first, generate_session_id(&address));
    }
}
