//! Luhn (mod 10) check digits for 16 digit card numbers.
//!
//! Positions are counted from the left, starting at 0. For a 16 digit number
//! the check digit sits at position 15, so every even position (0, 2, .., 14)
//! is doubled and every odd position is summed as is.

use crate::error::Error;

/// Number of digits covered by the check digit.
pub const PAYLOAD_LEN: usize = 15;

/// Length of a complete card number including the check digit.
pub const PAN_LEN: usize = 16;

/// `d -> (2 * d) % 10 + (2 * d) / 10`, indexed by digit value.
const DOUBLED: [u8; 10] = [0, 2, 4, 6, 8, 1, 3, 5, 7, 9];

/// Luhn weighted sum of ASCII digits, where `digits[0]` sits at absolute
/// position `start` of the card number.
///
/// Splitting the sum this way lets the generator compute the prefix part once
/// and only redo the account part per candidate.
#[inline(always)]
pub fn weighted_sum(digits: &[u8], start: usize) -> u32 {
    let mut sum = 0u32;
    for (i, &c) in digits.iter().enumerate() {
        debug_assert!(c.is_ascii_digit());
        let d = c - b'0';
        sum += if (start + i) % 2 == 0 { DOUBLED[d as usize] } else { d } as u32;
    }
    sum
}

/// Check digit value (0-9) completing a payload whose weighted sum is `sum`.
#[inline(always)]
pub fn check_digit_for_sum(sum: u32) -> u8 {
    ((10 - (sum % 10)) % 10) as u8
}

/// Check digit value (0-9) for a 15 digit ASCII payload.
#[inline]
pub fn check_digit(payload: &[u8; PAYLOAD_LEN]) -> u8 {
    check_digit_for_sum(weighted_sum(payload, 0))
}

/// Returns true if the 16 digit ASCII number carries a correct check digit.
#[inline]
pub fn is_valid(pan: &[u8; PAN_LEN]) -> bool {
    weighted_sum(pan, 0) % 10 == 0
}

/// Checked entry point for untrusted text: the check digit for a 15 digit
/// string.
pub fn check_digit_str(payload: &str) -> Result<u8, Error> {
    Ok(check_digit(&parse_digits::<PAYLOAD_LEN>(payload)?))
}

/// Checked entry point for untrusted text: whether a 16 digit string is a
/// valid card number.
pub fn is_valid_str(pan: &str) -> Result<bool, Error> {
    Ok(is_valid(&parse_digits::<PAN_LEN>(pan)?))
}

/// Copies exactly `N` ASCII digits out of `value`.
pub fn parse_digits<const N: usize>(value: &str) -> Result<[u8; N], Error> {
    let bytes = value.as_bytes();
    if bytes.len() != N || !bytes.iter().all(u8::is_ascii_digit) {
        return Err(Error::InvalidDigits { expected: N, value: value.to_string() });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}
