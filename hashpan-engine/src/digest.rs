//! SHA1 digests of candidate card numbers and their text encodings.
//!
//! Leaked hash lists come either as standard base64 (28 characters, the
//! canonical form used for reporting) or as hexadecimal (40 characters).

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha1::{Digest, Sha1};

use crate::error::Error;

/// The length of a SHA1 digest in bytes.
pub const DIGEST_LEN: usize = 20;

/// Length of the base64 encoding of a digest, including padding.
pub const BASE64_LEN: usize = 28;

/// Length of the hex encoding of a digest.
pub const HEX_LEN: usize = 40;

/// Hex lookup table for encoding.
pub const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// A raw 20 byte SHA1 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sha1Digest(pub [u8; DIGEST_LEN]);

impl Sha1Digest {
    /// One-shot digest of `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        Sha1Digest(Sha1::digest(bytes).into())
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Copies a digest out of a raw byte slice, which must be exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let raw: [u8; DIGEST_LEN] =
            bytes.try_into().map_err(|_| Error::InvalidDigestLength { len: bytes.len() })?;
        Ok(Sha1Digest(raw))
    }

    /// Parses a base64 or hex encoded digest, ignoring surrounding whitespace.
    pub fn parse(encoded: &str) -> Result<Self, Error> {
        let trimmed = encoded.trim();
        let invalid = || Error::InvalidDigestEncoding { value: trimmed.to_string() };

        match trimmed.len() {
            BASE64_LEN => {
                let raw = BASE64.decode(trimmed).map_err(|_| invalid())?;
                Self::from_slice(&raw)
            }
            HEX_LEN => {
                let mut raw = [0u8; DIGEST_LEN];
                for (out, pair) in raw.iter_mut().zip(trimmed.as_bytes().chunks_exact(2)) {
                    let hi = hex_to_nibble(pair[0]).ok_or_else(invalid)?;
                    let lo = hex_to_nibble(pair[1]).ok_or_else(invalid)?;
                    *out = (hi << 4) | lo;
                }
                Ok(Sha1Digest(raw))
            }
            _ => Err(invalid()),
        }
    }

    /// Canonical encoding used when reporting matches.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(HEX_LEN);
        for &b in &self.0 {
            out.push(HEX_CHARS[(b >> 4) as usize] as char);
            out.push(HEX_CHARS[(b & 0x0f) as usize] as char);
        }
        out
    }

    /// Big-endian 16 bit value of bytes `i` and `i + 1`.
    #[inline(always)]
    pub fn pair(&self, i: usize) -> u16 {
        u16::from_be_bytes([self.0[i], self.0[i + 1]])
    }
}

impl FromStr for Sha1Digest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&[u8]> for Sha1Digest {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(bytes)
    }
}

impl fmt::Display for Sha1Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for Sha1Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha1Digest({})", self.to_hex())
    }
}

/// Convert hex ASCII character to nibble value (0-15)
#[inline]
pub fn hex_to_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Hasher state owned by a single worker and reset after every digest, so
/// nothing carries over between candidates.
#[derive(Default, Clone)]
pub struct Digester {
    hasher: Sha1,
}

impl Digester {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn digest(&mut self, bytes: &[u8]) -> Sha1Digest {
        self.hasher.update(bytes);
        Sha1Digest(self.hasher.finalize_reset().into())
    }
}
