//! Fixed-width arithmetic helpers for instruction execution.

use crate::state::Word;

/// Largest shift distance that still changes a 64-bit value.
pub const MAX_SHIFT: i128 = 64;

/// Result of folding a raw value into the configured bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capped {
    /// Wrapped signed value.
    pub value: Word,
    /// Raw value was negative or at least `2^bits`.
    pub carry: bool,
    /// Raw value was outside the signed range.
    pub overflow: bool,
}

/// Signed range `[min, max]` for `bits`.
#[must_use]
pub const fn signed_range(bits: u32) -> (i128, i128) {
    let half = 1_i128 << (bits - 1);
    (-half, half - 1)
}

/// Caps `raw` to `bits` (2..=63).
///
/// Carry and overflow are computed independently from the same raw value.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn cap(raw: i128, bits: u32) -> Capped {
    let modulus = 1_i128 << bits;
    let (min, max) = signed_range(bits);
    let carry = raw >= modulus || raw < 0;
    if raw >= min && raw <= max {
        return Capped {
            value: raw as Word,
            carry,
            overflow: false,
        };
    }
    let mut wrapped = raw.rem_euclid(modulus);
    if wrapped > max {
        wrapped -= modulus;
    }
    Capped {
        value: wrapped as Word,
        carry,
        overflow: true,
    }
}

/// Quotient rounded toward negative infinity. `None` for a zero divisor.
#[must_use]
pub const fn floor_div(a: i128, b: i128) -> Option<i128> {
    if b == 0 {
        return None;
    }
    let quotient = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        Some(quotient - 1)
    } else {
        Some(quotient)
    }
}

/// Remainder carrying the divisor's sign. `None` for a zero divisor.
#[must_use]
pub const fn floor_mod(a: i128, b: i128) -> Option<i128> {
    if b == 0 {
        return None;
    }
    let remainder = a % b;
    if remainder != 0 && ((remainder < 0) != (b < 0)) {
        Some(remainder + b)
    } else {
        Some(remainder)
    }
}

/// Left shift of a word by a distance clamped to `[0, 64]`.
#[must_use]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub const fn shift_left(value: Word, amount: Word) -> i128 {
    let amount = clamp_shift(amount);
    (value as i128) << amount
}

/// Arithmetic right shift of a word by a distance clamped to `[0, 64]`.
#[must_use]
#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
pub const fn shift_right(value: Word, amount: Word) -> i128 {
    let amount = clamp_shift(amount);
    (value as i128) >> amount
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
const fn clamp_shift(amount: Word) -> u32 {
    let wide = amount as i128;
    if wide < 0 {
        0
    } else if wide > MAX_SHIFT {
        MAX_SHIFT as u32
    } else {
        wide as u32
    }
}
