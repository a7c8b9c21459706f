// web-server/src/auth/verifier.rs
use alloy_primitives::{Address, Signature};
use async_trait::async_trait;

/// Confirms or rejects a wallet signature over a message.
///
/// Implementations never error: anything that does not prove `address`
/// signed exactly `message` is a rejection.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    async fn verify(&self, address: &Address, message: &str, signature: &str) -> bool;
}

/// EIP-191 `personal_sign` verification, as produced by browser wallets.
///
/// The wallet signs `"\x19Ethereum Signed Message:\n" + len(message) + message`;
/// the signer address is recovered from the 65-byte signature and compared.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalSignVerifier;

impl PersonalSignVerifier {
    fn decode_signature(signature: &str) -> Option<Signature> {
        let hex_sig = signature
            .trim()
            .strip_prefix("0x")
            .unwrap_or_else(|| signature.trim());
        if hex_sig.len() != 130 {
            tracing::debug!("Signature has {} hex chars, expected 130", hex_sig.len());
            return None;
        }

        let bytes = hex::decode(hex_sig).ok()?;
        Signature::try_from(bytes.as_slice()).ok()
    }

    /// Recover the signing address, if the signature is well-formed
    pub fn recover(message: &str, signature: &str) -> Option<Address> {
        let signature = Self::decode_signature(signature)?;
        signature.recover_address_from_msg(message.as_bytes()).ok()
    }
}

#[async_trait]
impl SignatureVerifier for PersonalSignVerifier {
    async fn verify(&self, address: &Address, message: &str, signature: &str) -> bool {
        match Self::recover(message, signature) {
            Some(recovered) if recovered == *address => true,
            Some(recovered) => {
                tracing::warn!("Signature recovered {} but login was for {}", recovered, address);
                false
            }
            None => {
                tracing::warn!("Malformed signature presented for {}", address);
                false
            }
        }
    }
}
