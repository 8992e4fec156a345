//! Fixed-point products through 256-bit intermediates.
//!
//! `shares * acc_per_share` and `emission * SCALE` leave the 128-bit range
//! well before the values they produce do, so both products are formed in a
//! [`U256`] and only the quotient is narrowed back.

use primitive_types::U256;

use accrue_types::{Amount, SCALE};

use crate::{LedgerError, Result};

/// [`SCALE`] as a fraction denominator. 1e18 fits in a `u64`.
pub const SCALE_U64: u64 = SCALE as u64;

fn narrow(value: U256) -> Result<Amount> {
    if value.bits() > 128 {
        return Err(LedgerError::Overflow);
    }
    Ok(value.low_u128())
}

/// `a * b / divisor`, rounded down.
pub fn mul_div(a: Amount, b: Amount, divisor: Amount) -> Result<Amount> {
    if divisor == 0 {
        return Err(LedgerError::AccountingInvariantViolation(
            "fixed-point division by zero".to_string(),
        ));
    }
    narrow(U256::from(a) * U256::from(b) / U256::from(divisor))
}

/// Split `a * b` into whole units and a remainder of [`SCALE`], so that
/// `a * b == whole * SCALE + fraction`.
pub fn mul_scaled(a: Amount, b: Amount) -> Result<(Amount, u64)> {
    let (whole, fraction) = (U256::from(a) * U256::from(b)).div_mod(U256::from(SCALE));
    Ok((narrow(whole)?, fraction.low_u64()))
}
