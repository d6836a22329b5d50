//! Fixed-width amount arithmetic.
//!
//! Proportional conversions (principal <-> shares <-> assets) are `a * b / d`
//! rounded down unless a caller needs the covering amount ([`mul_div_ceil`]).
//! The intermediate product is computed natively when it fits in `u128` and
//! through `num-bigint` otherwise, so amounts with 18 decimals never overflow
//! mid-computation.

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::error::{DomainError, DomainResult};

/// Amount in the smallest indivisible unit of a value unit or share.
pub type Amount = u128;

/// Compute `a * b / d`, rounding down.
///
/// Returns `Degenerate` when `d == 0` and `Overflow` when the quotient does not fit
/// into an [`Amount`].
pub fn mul_div(a: Amount, b: Amount, d: Amount) -> DomainResult<Amount> {
    if d == 0 {
        return Err(DomainError::degenerate("division by zero"));
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product / d);
    }
    let wide = BigUint::from(a) * BigUint::from(b) / BigUint::from(d);
    wide.to_u128()
        .ok_or_else(|| DomainError::overflow(format!("{a} * {b} / {d} exceeds u128")))
}

/// Compute `a * b / d`, rounding up.
pub fn mul_div_ceil(a: Amount, b: Amount, d: Amount) -> DomainResult<Amount> {
    if d == 0 {
        return Err(DomainError::degenerate("division by zero"));
    }
    if let Some(product) = a.checked_mul(b) {
        return Ok(product.div_ceil(d));
    }
    let product = BigUint::from(a) * BigUint::from(b);
    let divisor = BigUint::from(d);
    let wide = (product + &divisor - 1u32) / divisor;
    wide.to_u128()
        .ok_or_else(|| DomainError::overflow(format!("{a} * {b} / {d} exceeds u128")))
}

/// Checked addition with a descriptive overflow error.
pub fn checked_add(a: Amount, b: Amount, what: &str) -> DomainResult<Amount> {
    a.checked_add(b)
        .ok_or_else(|| DomainError::overflow(format!("{what} overflow")))
}

/// Checked subtraction; underflow means an invariant was broken.
pub fn checked_sub(a: Amount, b: Amount, what: &str) -> DomainResult<Amount> {
    a.checked_sub(b)
        .ok_or_else(|| DomainError::invariant(format!("{what} underflow ({a} - {b})")))
}
