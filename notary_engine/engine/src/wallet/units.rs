//! Ether ↔ wei conversions and hex quantities.

use crate::error::ParseError;

pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;
const DECIMALS: usize = 18;

/// Parse a decimal ether amount (`"0.0012"`) into wei.
pub fn parse_ether(amount: &str) -> Result<u128, ParseError> {
    let invalid = || ParseError::InvalidAmount(amount.to_string());
    let trimmed = amount.trim();

    let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > DECIMALS {
        return Err(invalid());
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let frac: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = DECIMALS);
        padded.parse().map_err(|_| invalid())?
    };

    whole
        .checked_mul(WEI_PER_ETHER)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(invalid)
}

/// Render wei as ether, always with at least one fractional digit (`"1.0"`).
pub fn format_ether(wei: u128) -> String {
    let whole = wei / WEI_PER_ETHER;
    let frac = wei % WEI_PER_ETHER;

    let frac = format!("{frac:0>width$}", width = DECIMALS);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{frac}")
    }
}

/// `0x`-prefixed lowercase hex quantity, as sent in `value` of a transaction.
pub fn to_quantity_hex(value: u128) -> String {
    format!("0x{value:x}")
}

pub fn parse_quantity_hex(value: &str) -> Result<u128, ParseError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ParseError::InvalidAmount(value.to_string()))?;
    u128::from_str_radix(digits, 16).map_err(|_| ParseError::InvalidAmount(value.to_string()))
}
