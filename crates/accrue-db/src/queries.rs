//! Database query functions organized by table.

pub mod accounts;
pub mod events;
pub mod pools;

use crate::{DbError, Result};

/// Parse a decimal TEXT column into a 128-bit amount.
pub(crate) fn parse_u128(column: &'static str, text: &str) -> Result<u128> {
    text.parse().map_err(|e: std::num::ParseIntError| DbError::InvalidColumn {
        column,
        reason: e.to_string(),
    })
}

/// Parse a decimal TEXT column into a signed 128-bit value.
pub(crate) fn parse_i128(column: &'static str, text: &str) -> Result<i128> {
    text.parse().map_err(|e: std::num::ParseIntError| DbError::InvalidColumn {
        column,
        reason: e.to_string(),
    })
}
