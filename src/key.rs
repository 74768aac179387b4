//! MAPQUEUE - Key Codec
//! Converts a [`Key`] to and from its byte and display forms.
//!
//! ## Wire Format
//! ```text
//! [uuid: 16 bytes (LE)][-time: 8 bytes (signed LE)][kind: N bytes (UTF-8)]
//! ```
//!
//! ## Sortable Format
//! ```text
//! [uuid: 16 bytes (LE)][!(time ^ 2^63): 8 bytes (BE)][kind: N bytes (UTF-8)]
//! ```
//! Flipping the sign bit makes the time sort as unsigned; inverting it makes
//! larger times sort first. Unlike negation this covers all of `i64`.
//!
//! The wire format is what backends store for interoperability. Its
//! little-endian time does not compare correctly once a byte carries, so
//! engines that range-scan keys use the sortable format, in which the newest
//! version of an entity sorts first.

use uuid::Uuid;

use crate::error::{MapQueueError, Result};
use crate::types::{Key, Timestamp};

/// Length of the uuid portion of an encoded key.
pub const UUID_LEN: usize = 16;

/// Length of the uuid + time prefix shared by every encoded key.
pub const PREFIX_LEN: usize = UUID_LEN + 8;

const SIGN_BIAS: u64 = 1 << 63;

/// Stateless codec for composite identity keys.
pub struct KeyCodec;

impl KeyCodec {
    /// Encode a key in wire format.
    pub fn encode(key: &Key) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PREFIX_LEN + key.kind.len());
        buf.extend_from_slice(&key.uuid.to_bytes_le());
        buf.extend_from_slice(&key.time.wrapping_neg().to_le_bytes());
        buf.extend_from_slice(key.kind.as_bytes());
        buf
    }

    /// Decode a wire-format key.
    pub fn decode(bytes: &[u8]) -> Result<Key> {
        let (uuid, time_bytes, kind) = Self::split(bytes)?;
        let time = i64::from_le_bytes(time_bytes).wrapping_neg();
        Ok(Key { uuid, time, kind })
    }

    /// Encode a key in the order-preserving format.
    pub fn encode_sortable(key: &Key) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PREFIX_LEN + key.kind.len());
        buf.extend_from_slice(&Self::scan_key(&key.uuid, key.time));
        buf.extend_from_slice(key.kind.as_bytes());
        buf
    }

    /// Decode an order-preserving key.
    pub fn decode_sortable(bytes: &[u8]) -> Result<Key> {
        let (uuid, time_bytes, kind) = Self::split(bytes)?;
        let time = (!u64::from_be_bytes(time_bytes) ^ SIGN_BIAS) as i64;
        Ok(Key { uuid, time, kind })
    }

    /// The sortable prefix for `(uuid, time)`.
    ///
    /// Every sortable key of `uuid` with a version time `<= time` compares
    /// greater than or equal to this prefix, so a forward range scan starting
    /// here lands on the newest qualifying version.
    pub fn scan_key(uuid: &Uuid, time: Timestamp) -> [u8; PREFIX_LEN] {
        let mut buf = [0u8; PREFIX_LEN];
        buf[..UUID_LEN].copy_from_slice(&uuid.to_bytes_le());
        let biased = !((time as u64) ^ SIGN_BIAS);
        buf[UUID_LEN..].copy_from_slice(&biased.to_be_bytes());
        buf
    }

    /// Display form: `uuid.hex || -time || kind`.
    pub fn encode_str(key: &Key) -> String {
        format!("{}{}{}", key.uuid.simple(), key.time.wrapping_neg(), key.kind)
    }

    /// Best-effort parse of the display form.
    ///
    /// The negated time is read greedily as an optionally signed integer, so
    /// a kind that begins with a digit cannot be recovered.
    pub fn decode_str(s: &str) -> Result<Key> {
        let hex = s
            .get(..32)
            .ok_or_else(|| MapQueueError::MalformedKey(format!("display key too short: {:?}", s)))?;
        let uuid = Uuid::try_parse(hex)
            .map_err(|e| MapQueueError::MalformedKey(format!("invalid uuid {:?}: {}", hex, e)))?;

        let rest = &s[32..];
        let sign = usize::from(rest.starts_with('-'));
        let digits = rest[sign..]
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len() - sign);
        let (number, kind) = rest.split_at(sign + digits);
        let neg_time: i64 = number
            .parse()
            .map_err(|e| MapQueueError::MalformedKey(format!("invalid time {:?}: {}", number, e)))?;

        Ok(Key {
            uuid,
            time: neg_time.wrapping_neg(),
            kind: kind.to_string(),
        })
    }

    fn split(bytes: &[u8]) -> Result<(Uuid, [u8; 8], String)> {
        if bytes.len() < PREFIX_LEN {
            return Err(MapQueueError::MalformedKey(format!(
                "expected at least {} bytes, got {}",
                PREFIX_LEN,
                bytes.len()
            )));
        }
        let mut uuid_bytes = [0u8; UUID_LEN];
        uuid_bytes.copy_from_slice(&bytes[..UUID_LEN]);
        let mut time_bytes = [0u8; 8];
        time_bytes.copy_from_slice(&bytes[UUID_LEN..PREFIX_LEN]);
        let kind = String::from_utf8(bytes[PREFIX_LEN..].to_vec())
            .map_err(|e| MapQueueError::MalformedKey(format!("kind is not UTF-8: {}", e)))?;
        Ok((Uuid::from_bytes_le(uuid_bytes), time_bytes, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Key {
        Key::new(Uuid::new_v4(), 1_000, "hello")
    }

    #[test]
    fn test_wire_layout() {
        let key = sample();
        let bytes = KeyCodec::encode(&key);
        assert_eq!(bytes.len(), PREFIX_LEN + 5);
        assert_eq!(&bytes[..16], &key.uuid.to_bytes_le());
        assert_eq!(&bytes[16..24], &(-1_000i64).to_le_bytes());
        assert_eq!(&bytes[24..], b"hello");
    }

    #[test]
    fn test_roundtrip() {
        let key = sample();
        assert_eq!(KeyCodec::decode(&KeyCodec::encode(&key)).unwrap(), key);
        assert_eq!(
            KeyCodec::decode_sortable(&KeyCodec::encode_sortable(&key)).unwrap(),
            key
        );
    }

    #[test]
    fn test_short_input_is_malformed() {
        let err = KeyCodec::decode(&[0u8; 23]).unwrap_err();
        assert!(matches!(err, MapQueueError::MalformedKey(_)));
    }

    #[test]
    fn test_invalid_utf8_kind_is_malformed() {
        let mut bytes = KeyCodec::encode(&Key::new(Uuid::new_v4(), 5, ""));
        bytes.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(
            KeyCodec::decode(&bytes),
            Err(MapQueueError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_newer_sorts_first_in_wire_format_for_nearby_times() {
        let uuid = Uuid::new_v4();
        let newer = KeyCodec::encode(&Key::new(uuid, 1_000, "hello"));
        let older = KeyCodec::encode(&Key::new(uuid, 990, "hello"));
        assert!(newer < older);
    }

    #[test]
    fn test_sortable_order_at_extremes() {
        let uuid = Uuid::new_v4();
        let max = KeyCodec::scan_key(&uuid, i64::MAX);
        let zero = KeyCodec::scan_key(&uuid, 0);
        let min = KeyCodec::scan_key(&uuid, i64::MIN);
        assert!(max < zero && zero < min);

        let key = Key::new(uuid, i64::MIN, "origin");
        assert_eq!(
            KeyCodec::decode_sortable(&KeyCodec::encode_sortable(&key)).unwrap(),
            key
        );
    }

    #[test]
    fn test_display_form() {
        let uuid = Uuid::new_v4();
        let key = Key::new(uuid, 1_700_000_000_000, "hello");
        let s = KeyCodec::encode_str(&key);
        assert_eq!(s, format!("{}-1700000000000hello", uuid.simple()));
        assert_eq!(KeyCodec::decode_str(&s).unwrap(), key);
    }

    #[test]
    fn test_display_form_negative_time() {
        let key = Key::new(Uuid::new_v4(), -42, "deleted");
        let s = KeyCodec::encode_str(&key);
        assert_eq!(KeyCodec::decode_str(&s).unwrap(), key);
    }

    #[test]
    fn test_display_form_malformed() {
        assert!(KeyCodec::decode_str("abc").is_err());
        let bad_uuid = format!("{}-5kind", "z".repeat(32));
        assert!(KeyCodec::decode_str(&bad_uuid).is_err());
        let no_time = format!("{}kind", Uuid::new_v4().simple());
        assert!(KeyCodec::decode_str(&no_time).is_err());
    }

    proptest! {
        #[test]
        fn prop_roundtrip(raw in any::<u128>(), time in any::<i64>(), kind in "[a-z]{0,12}") {
            let key = Key::new(Uuid::from_u128(raw), time, kind);
            prop_assert_eq!(KeyCodec::decode(&KeyCodec::encode(&key)).unwrap(), key.clone());
            prop_assert_eq!(KeyCodec::decode_sortable(&KeyCodec::encode_sortable(&key)).unwrap(), key);
        }

        #[test]
        fn prop_sortable_newest_first(
            raw in any::<u128>(),
            a in any::<i64>(),
            b in any::<i64>(),
        ) {
            prop_assume!(a != b);
            let uuid = Uuid::from_u128(raw);
            let (newer, older) = if a > b { (a, b) } else { (b, a) };
            let newer = KeyCodec::encode_sortable(&Key::new(uuid, newer, "k"));
            let older = KeyCodec::encode_sortable(&Key::new(uuid, older, "k"));
            prop_assert!(newer < older);
        }
    }
}
