use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// 12-byte document id: seconds since epoch, per-process random, counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("expected 24 hex characters, got {0:?}")]
pub struct ParseObjectIdError(String);

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

impl ObjectId {
    pub fn new() -> Self {
        let secs = OffsetDateTime::now_utc().unix_timestamp() as u32;
        let process = PROCESS_UNIQUE.get_or_init(|| {
            let mut bytes = [0u8; 5];
            bytes.copy_from_slice(&Uuid::new_v4().as_bytes()[..5]);
            bytes
        });
        let counter = COUNTER
            .get_or_init(|| {
                let seed = Uuid::new_v4().into_bytes();
                AtomicU32::new(u32::from_be_bytes([seed[0], seed[1], seed[2], seed[3]]))
            })
            .fetch_add(1, Ordering::Relaxed);

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(process);
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ParseObjectIdError(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ParseObjectIdError(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_lowercase_hex() {
        let id = ObjectId::new();
        let hex = id.to_string();
        assert_eq!(hex.len(), 24);
        assert!(hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
        assert_eq!(hex.parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn accepts_upper_case() {
        let id: ObjectId = "65A1B2C3D4E5F60718293A4B".parse().unwrap();
        assert_eq!(id.to_string(), "65a1b2c3d4e5f60718293a4b");
        assert_eq!(id.0[..4], [0x65, 0xa1, 0xb2, 0xc3]);
    }

    #[test]
    fn rejects_malformed() {
        assert!("".parse::<ObjectId>().is_err());
        assert!("abc".parse::<ObjectId>().is_err());
        assert!("zza1b2c3d4e5f60718293a4b".parse::<ObjectId>().is_err());
        assert!("65a1b2c3d4e5f60718293a4b00".parse::<ObjectId>().is_err());
        // multibyte chars must not slice mid-codepoint
        assert!("é5a1b2c3d4e5f60718293a4".parse::<ObjectId>().is_err());
    }

    #[test]
    fn consecutive_ids_differ() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_eq!(a.0[4..9], b.0[4..9]);
    }
}
