//! Account identity
//!
//! Derives the deterministic counterfactual address of a smart account from
//! its owner credential set. Pure computation, no network calls: callers
//! rely on the derived address to pre-fund an account before its first
//! on-chain action, so the derivation must be stable for a given owner set
//! and factory.

use crate::error::{EngineError, EngineResult};

use alloy_primitives::{keccak256, Address, B256};
use k256::ecdsa::VerifyingKey;

/// Fixed hash binding the derivation to the account implementation the
/// factory deploys. Changing this changes every derived address.
const ACCOUNT_INIT_CODE_HASH: B256 = B256::new([
    0x7c, 0x19, 0x64, 0xd2, 0x5a, 0x4f, 0x0e, 0x83, 0x1b, 0x0d, 0xf2, 0x6a, 0x9e, 0x51, 0x3c,
    0x88, 0x4a, 0x6f, 0x5e, 0x90, 0x12, 0xe7, 0x40, 0xbb, 0x26, 0xd1, 0x5f, 0xa3, 0x09, 0x78,
    0xce, 0x61,
]);

/// Validated owner credential set for a smart account.
#[derive(Debug, Clone)]
pub struct OwnerSet {
    keys: Vec<VerifyingKey>,
}

impl OwnerSet {
    /// Parse hex-encoded SEC1 secp256k1 verifying keys into an owner set.
    ///
    /// Fails with `InvalidCredential` if the set is empty or any key does
    /// not decode to a point on the curve. Compressed and uncompressed
    /// encodings are both accepted and normalize to the same owner.
    pub fn parse(encoded: &[String]) -> EngineResult<Self> {
        if encoded.is_empty() {
            return Err(EngineError::InvalidCredential(
                "owner set is empty".to_string(),
            ));
        }

        let mut keys = Vec::with_capacity(encoded.len());
        for (idx, entry) in encoded.iter().enumerate() {
            let stripped = entry.strip_prefix("0x").unwrap_or(entry);
            let bytes = hex::decode(stripped).map_err(|e| {
                EngineError::InvalidCredential(format!("owner {}: bad hex: {}", idx, e))
            })?;
            let key = VerifyingKey::from_sec1_bytes(&bytes).map_err(|e| {
                EngineError::InvalidCredential(format!("owner {}: not a secp256k1 key: {}", idx, e))
            })?;
            keys.push(key);
        }

        Ok(Self { keys })
    }

    /// Number of owners in the set
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Derive the counterfactual account address for this owner set.
    ///
    /// CREATE2-style: keccak256(0xff ++ factory ++ salt ++ init_code_hash),
    /// where the salt commits to the sorted uncompressed owner keys. Sorting
    /// makes the address independent of the order owners were supplied in.
    pub fn derive_address(&self, factory: Address) -> Address {
        let mut encoded: Vec<[u8; 65]> = self
            .keys
            .iter()
            .map(|k| {
                let point = k.to_encoded_point(false);
                let mut buf = [0u8; 65];
                buf.copy_from_slice(point.as_bytes());
                buf
            })
            .collect();
        encoded.sort_unstable();

        let mut salt_input = Vec::with_capacity(encoded.len() * 65);
        for key in &encoded {
            salt_input.extend_from_slice(key);
        }
        let salt = keccak256(&salt_input);

        let mut preimage = Vec::with_capacity(1 + 20 + 32 + 32);
        preimage.push(0xff);
        preimage.extend_from_slice(factory.as_slice());
        preimage.extend_from_slice(salt.as_slice());
        preimage.extend_from_slice(ACCOUNT_INIT_CODE_HASH.as_slice());

        Address::from_slice(&keccak256(&preimage)[12..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const FACTORY: Address = address!("000000000000000000000000000000000000f00d");

    // secp256k1 generator point, compressed and uncompressed
    const KEY_COMPRESSED: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const KEY_UNCOMPRESSED: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";
    // 2G, a second valid point
    const KEY_TWO: &str = "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5";

    #[test]
    fn test_derivation_is_deterministic() {
        let owners = OwnerSet::parse(&[KEY_COMPRESSED.to_string()]).unwrap();
        let first = owners.derive_address(FACTORY);
        let second = owners.derive_address(FACTORY);
        assert_eq!(first, second);
    }

    #[test]
    fn test_compressed_and_uncompressed_agree() {
        let compressed = OwnerSet::parse(&[KEY_COMPRESSED.to_string()]).unwrap();
        let uncompressed = OwnerSet::parse(&[KEY_UNCOMPRESSED.to_string()]).unwrap();
        assert_eq!(
            compressed.derive_address(FACTORY),
            uncompressed.derive_address(FACTORY)
        );
    }

    #[test]
    fn test_owner_order_does_not_matter() {
        let forward =
            OwnerSet::parse(&[KEY_COMPRESSED.to_string(), KEY_TWO.to_string()]).unwrap();
        let reversed =
            OwnerSet::parse(&[KEY_TWO.to_string(), KEY_COMPRESSED.to_string()]).unwrap();
        assert_eq!(
            forward.derive_address(FACTORY),
            reversed.derive_address(FACTORY)
        );
    }

    #[test]
    fn test_distinct_owners_distinct_addresses() {
        let one = OwnerSet::parse(&[KEY_COMPRESSED.to_string()]).unwrap();
        let two = OwnerSet::parse(&[KEY_TWO.to_string()]).unwrap();
        assert_ne!(one.derive_address(FACTORY), two.derive_address(FACTORY));
    }

    #[test]
    fn test_distinct_factories_distinct_addresses() {
        let owners = OwnerSet::parse(&[KEY_COMPRESSED.to_string()]).unwrap();
        let other_factory = address!("000000000000000000000000000000000000beef");
        assert_ne!(
            owners.derive_address(FACTORY),
            owners.derive_address(other_factory)
        );
    }

    #[test]
    fn test_empty_owner_set_rejected() {
        let err = OwnerSet::parse(&[]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidCredential(_)));
    }

    #[test]
    fn test_malformed_key_rejected() {
        for bad in ["zz", "0x00", "0279be667ef9dcbbac55a06295ce870b07"] {
            let err = OwnerSet::parse(&[bad.to_string()]).unwrap_err();
            assert!(matches!(err, EngineError::InvalidCredential(_)), "{}", bad);
        }
    }
}
