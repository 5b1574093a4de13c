//! Key and value encodings
//!
//! # Layout
//!
//! - Each record field lives under `<prefix><id>`, where `<id>` is the
//!   8-byte big-endian record id, so a prefix scan yields ascending ids.
//! - Numeric fields and counters are 8-byte big-endian unsigned integers.
//! - `amount-` holds the minimal big-endian magnitude (empty means zero).

use crate::error::{Error, Result};
use num_bigint::BigUint;
use num_traits::Zero;

/// Width of fixed-size integers and ids
pub const U64_WIDTH: usize = 8;

/// Field prefixes of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPrefix {
    /// Destination address (UTF-8)
    Address,
    /// Amount (minimal big-endian bytes)
    Amount,
    /// Nonce hint (u64)
    Nonce,
    /// Status code (u64)
    Status,
    /// Transaction id (UTF-8)
    Hash,
    /// Creation time (u64)
    Created,
    /// Modification time (u64)
    Modified,
}

impl FieldPrefix {
    /// Every field a complete record has
    pub const ALL: [FieldPrefix; 7] = [
        FieldPrefix::Address,
        FieldPrefix::Amount,
        FieldPrefix::Nonce,
        FieldPrefix::Status,
        FieldPrefix::Hash,
        FieldPrefix::Created,
        FieldPrefix::Modified,
    ];

    /// ASCII prefix bytes
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            FieldPrefix::Address => b"address-",
            FieldPrefix::Amount => b"amount-",
            FieldPrefix::Nonce => b"nonce-",
            FieldPrefix::Status => b"status-",
            FieldPrefix::Hash => b"hash-",
            FieldPrefix::Created => b"created-",
            FieldPrefix::Modified => b"modified-",
        }
    }
}

/// Encode a u64 as 8 big-endian bytes
pub fn encode_u64(value: u64) -> [u8; U64_WIDTH] {
    value.to_be_bytes()
}

/// Decode 8 big-endian bytes
pub fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let fixed: [u8; U64_WIDTH] = bytes.try_into().map_err(|_| {
        Error::Corrupt(format!(
            "expected {} bytes for u64, found {}",
            U64_WIDTH,
            bytes.len()
        ))
    })?;
    Ok(u64::from_be_bytes(fixed))
}

/// Encode an amount as its minimal big-endian magnitude
pub fn encode_amount(amount: &BigUint) -> Vec<u8> {
    if amount.is_zero() {
        Vec::new()
    } else {
        amount.to_bytes_be()
    }
}

/// Decode a big-endian magnitude (empty is zero)
pub fn decode_amount(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Key of one field of one record
pub fn field_key(prefix: FieldPrefix, id: u64) -> Vec<u8> {
    let prefix = prefix.as_bytes();
    let mut key = Vec::with_capacity(prefix.len() + U64_WIDTH);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&encode_u64(id));
    key
}

/// Extract the record id from a field key
pub fn parse_field_key(prefix: FieldPrefix, key: &[u8]) -> Result<u64> {
    let id_bytes = key.strip_prefix(prefix.as_bytes()).ok_or_else(|| {
        Error::Corrupt(format!(
            "key does not start with {}",
            String::from_utf8_lossy(prefix.as_bytes())
        ))
    })?;
    decode_u64(id_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_u64_is_big_endian() {
        assert_eq!(encode_u64(1), [0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(encode_u64(0x0102), [0, 0, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_decode_u64_rejects_wrong_width() {
        assert!(matches!(decode_u64(&[1, 2, 3]), Err(Error::Corrupt(_))));
        assert!(matches!(decode_u64(&[0u8; 9]), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_amount_encoding_is_minimal() {
        assert!(encode_amount(&BigUint::zero()).is_empty());
        assert_eq!(encode_amount(&BigUint::from(1u32)), vec![1]);
        assert_eq!(encode_amount(&BigUint::from(256u32)), vec![1, 0]);
        assert_eq!(decode_amount(&[]), BigUint::zero());
        // A tolerated leading zero still decodes to the same value
        assert_eq!(decode_amount(&[0, 1, 0]), BigUint::from(256u32));
    }

    #[test]
    fn test_field_key_layout() {
        let key = field_key(FieldPrefix::Status, 7);
        assert_eq!(&key[..7], b"status-");
        assert_eq!(&key[7..], &[0, 0, 0, 0, 0, 0, 0, 7]);
        assert_eq!(parse_field_key(FieldPrefix::Status, &key).unwrap(), 7);
        assert!(parse_field_key(FieldPrefix::Hash, &key).is_err());
    }

    proptest! {
        /// Key order follows numeric id order
        #[test]
        fn prop_field_keys_sort_like_ids(a in any::<u64>(), b in any::<u64>()) {
            let ka = field_key(FieldPrefix::Status, a);
            let kb = field_key(FieldPrefix::Status, b);
            prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
        }

        /// Encoded amounts never carry a leading zero byte
        #[test]
        fn prop_amount_has_no_leading_zero(bytes in proptest::collection::vec(any::<u8>(), 0..40)) {
            let amount = BigUint::from_bytes_be(&bytes);
            let encoded = encode_amount(&amount);
            prop_assert!(encoded.first() != Some(&0));
            prop_assert_eq!(decode_amount(&encoded), amount);
        }
    }
}
