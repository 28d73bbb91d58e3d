use crate::errors::{ErrorKind, ShellError, ShellResult};
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use std::fmt::{Debug, Display};
use std::sync::atomic::{AtomicU32, Ordering};

static PROCESS_UNIQUE: Lazy<[u8; 5]> = Lazy::new(|| {
    let mut bytes = [0u8; 5];
    OsRng.fill_bytes(&mut bytes);
    bytes
});

static COUNTER: Lazy<AtomicU32> = Lazy::new(|| AtomicU32::new(OsRng.gen_range(0..0x00FF_FFFF)));

/// A 12-byte document identifier as used by document databases for `_id`.
///
/// The layout is a 4-byte big-endian timestamp in seconds, 5 bytes unique
/// to the process, and a 3-byte big-endian counter. Ids generated by one
/// process therefore sort roughly by creation time.
///
/// # Examples
///
/// ```rust
/// use docshell::collection::ObjectId;
///
/// let id = ObjectId::from_hex("5f1d7f3e9d3b2a1c0b0a0908")?;
/// assert_eq!(id.to_hex(), "5f1d7f3e9d3b2a1c0b0a0908");
/// # Ok::<(), docshell::errors::ShellError>(())
/// ```
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy)]
pub struct ObjectId {
    bytes: [u8; 12],
}

impl ObjectId {
    /// Generates a new id from the current time, the process-unique bytes
    /// and the next counter value.
    pub fn new() -> Self {
        let seconds = Utc::now().timestamp() as u32;
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst) & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        bytes[9..12].copy_from_slice(&counter.to_be_bytes()[1..4]);
        ObjectId { bytes }
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId { bytes }
    }

    /// Parses a 24 character hexadecimal string.
    pub fn from_hex(hex: &str) -> ShellResult<Self> {
        if hex.len() != 24 || !hex.is_ascii() {
            log::error!("Invalid ObjectId hex string {:?}", hex);
            return Err(ShellError::new(
                &format!("ObjectId must be 24 hexadecimal characters, found {:?}", hex),
                ErrorKind::EncodingError,
            ));
        }

        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)?;
        }
        Ok(ObjectId { bytes })
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.bytes
    }

    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// The creation time encoded in the first four bytes.
    pub fn timestamp(&self) -> DateTime<Utc> {
        let mut seconds = [0u8; 4];
        seconds.copy_from_slice(&self.bytes[0..4]);
        Utc.timestamp_opt(u32::from_be_bytes(seconds) as i64, 0)
            .single()
            .unwrap_or_default()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId(\"{}\")", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_unique() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_new_ids_share_process_bytes() {
        let a = ObjectId::new().bytes();
        let b = ObjectId::new().bytes();
        assert_eq!(a[4..9], b[4..9]);
    }

    #[test]
    fn test_hex_round_trip() {
        let id = ObjectId::new();
        let parsed = ObjectId::from_hex(&id.to_hex()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_from_hex_rejects_bad_length() {
        let err = ObjectId::from_hex("abc").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EncodingError);
    }

    #[test]
    fn test_from_hex_rejects_non_hex() {
        assert!(ObjectId::from_hex("zz1d7f3e9d3b2a1c0b0a0908").is_err());
    }

    #[test]
    fn test_timestamp() {
        let id = ObjectId::from_hex("000000010000000000000000").unwrap();
        assert_eq!(id.timestamp().timestamp(), 1);
    }

    #[test]
    fn test_display_and_debug() {
        let id = ObjectId::from_hex("5f1d7f3e9d3b2a1c0b0a0908").unwrap();
        assert_eq!(format!("{}", id), "5f1d7f3e9d3b2a1c0b0a0908");
        assert_eq!(format!("{:?}", id), "ObjectId(\"5f1d7f3e9d3b2a1c0b0a0908\")");
    }
}
