//! Prefixes and the candidate card numbers generated from them.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::Error;
use crate::luhn::{self, PAN_LEN, PAYLOAD_LEN};

/// Length of an issuer identification number.
pub const PREFIX_LEN: usize = 6;

/// Length of the zero padded account number between prefix and check digit.
pub const SUFFIX_LEN: usize = 9;

/// Number of account suffixes per prefix (000000000-999999999).
pub const SUFFIX_COUNT: u32 = 1_000_000_000;

/// A validated 6 digit issuer identification number.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix([u8; PREFIX_LEN]);

impl Prefix {
    /// Parses exactly 6 ASCII digits.
    pub fn parse(value: &str) -> Result<Self, Error> {
        luhn::parse_digits::<PREFIX_LEN>(value)
            .map(Prefix)
            .map_err(|_| Error::InvalidPrefix { prefix: value.to_string() })
    }

    pub fn as_bytes(&self) -> &[u8; PREFIX_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: only constructed from ASCII digits
        unsafe { std::str::from_utf8_unchecked(&self.0) }
    }
}

impl FromStr for Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prefix({})", self.as_str())
    }
}

/// A complete, Luhn-valid 16 digit card number.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Candidate([u8; PAN_LEN]);

impl Candidate {
    /// Builds the candidate for one account suffix directly.
    ///
    /// `suffix` must be below [`SUFFIX_COUNT`].
    pub fn new(prefix: &Prefix, suffix: u32) -> Self {
        debug_assert!(suffix < SUFFIX_COUNT);
        let mut buf = [0u8; PAN_LEN];
        buf[..PREFIX_LEN].copy_from_slice(prefix.as_bytes());
        write_suffix(&mut buf, suffix);
        let sum = luhn::weighted_sum(&buf[..PAYLOAD_LEN], 0);
        buf[PAYLOAD_LEN] = b'0' + luhn::check_digit_for_sum(sum);
        Candidate(buf)
    }

    /// Parses a complete 16 digit number, which must pass the Luhn check.
    pub fn parse(value: &str) -> Result<Self, Error> {
        let digits = luhn::parse_digits::<PAN_LEN>(value)?;
        if !luhn::is_valid(&digits) {
            return Err(Error::InvalidCheckDigit { pan: value.to_string() });
        }
        Ok(Candidate(digits))
    }

    pub fn as_bytes(&self) -> &[u8; PAN_LEN] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: only constructed from ASCII digits
        unsafe { std::str::from_utf8_unchecked(&self.0) }
    }

    /// The account number between prefix and check digit.
    pub fn suffix(&self) -> u32 {
        self.0[PREFIX_LEN..PAYLOAD_LEN]
            .iter()
            .fold(0u32, |acc, &c| acc * 10 + (c - b'0') as u32)
    }
}

impl From<&[u8; PAN_LEN]> for Candidate {
    fn from(bytes: &[u8; PAN_LEN]) -> Self {
        debug_assert!(luhn::is_valid(bytes));
        Candidate(*bytes)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Candidate({})", self.as_str())
    }
}

/// Walks every account suffix of a prefix in ascending order.
///
/// All candidates are written into one 16 byte buffer: moving to the next
/// suffix is a decimal increment of positions 6-14 followed by a fresh check
/// digit. The Luhn contribution of the prefix is computed once up front.
///
/// [`next_candidate`](Self::next_candidate) lends the buffer out without
/// copying; the `Iterator` impl copies each candidate out by value.
#[derive(Clone)]
pub struct CandidateGenerator {
    buf: [u8; PAN_LEN],
    prefix_sum: u32,
    start: u32,
    next: u32,
    end: u32,
}

impl CandidateGenerator {
    /// Covers the full 000000000-999999999 range.
    pub fn new(prefix: Prefix) -> Self {
        Self::with_range(prefix, 0..SUFFIX_COUNT)
    }

    /// Covers `range`, clamped to the valid suffix space.
    pub fn with_range(prefix: Prefix, range: Range<u32>) -> Self {
        let end = range.end.min(SUFFIX_COUNT);
        let start = range.start.min(end);
        let mut buf = [b'0'; PAN_LEN];
        buf[..PREFIX_LEN].copy_from_slice(prefix.as_bytes());

        Self {
            buf,
            prefix_sum: luhn::weighted_sum(prefix.as_bytes(), 0),
            start,
            next: start,
            end,
        }
    }

    /// Produces the next candidate in place, or `None` once the range is done.
    #[inline(always)]
    pub fn next_candidate(&mut self) -> Option<&[u8; PAN_LEN]> {
        if self.next >= self.end {
            return None;
        }

        if self.next == self.start {
            write_suffix(&mut self.buf, self.next);
        } else {
            increment_suffix(&mut self.buf);
        }

        let sum = self.prefix_sum + luhn::weighted_sum(&self.buf[PREFIX_LEN..PAYLOAD_LEN], PREFIX_LEN);
        self.buf[PAYLOAD_LEN] = b'0' + luhn::check_digit_for_sum(sum);
        self.next += 1;

        Some(&self.buf)
    }

    /// The suffix the next call will produce (equal to the range end once
    /// exhausted).
    pub fn next_suffix(&self) -> u32 {
        self.next
    }

    pub fn remaining(&self) -> u32 {
        self.end - self.next
    }

    /// Rewinds to the start of the range.
    pub fn restart(&mut self) {
        self.next = self.start;
    }
}

impl Iterator for CandidateGenerator {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_candidate().map(Candidate::from)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for CandidateGenerator {}

/// Writes `suffix` zero padded into positions 6-14.
#[inline]
fn write_suffix(buf: &mut [u8; PAN_LEN], mut suffix: u32) {
    for slot in buf[PREFIX_LEN..PAYLOAD_LEN].iter_mut().rev() {
        *slot = b'0' + (suffix % 10) as u8;
        suffix /= 10;
    }
}

/// Adds one to the decimal number in positions 6-14.
#[inline(always)]
fn increment_suffix(buf: &mut [u8; PAN_LEN]) {
    for slot in buf[PREFIX_LEN..PAYLOAD_LEN].iter_mut().rev() {
        if *slot == b'9' {
            *slot = b'0';
        } else {
            *slot += 1;
            return;
        }
    }
}
