use std::str::FromStr;

use ethers::types::U256;
use rust_decimal::{Decimal, prelude::ToPrimitive};

/// Parse a prompted value as a decimal number. Missing, blank and
/// non-numeric input all yield `None`.
pub fn parse_number(raw: Option<&str>) -> Option<Decimal> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// Amount for a bill payment: any positive number, truncated toward zero.
/// Values that truncate to zero are refused since nothing would be paid.
pub fn bill_amount(raw: Option<&str>) -> Option<U256> {
    let value = parse_number(raw)?;
    if value.is_sign_negative() {
        return None;
    }
    whole_units(value).filter(|amount| !amount.is_zero())
}

/// Amount for a top-up: at least one whole unit.
pub fn topup_amount(raw: Option<&str>) -> Option<U256> {
    let value = parse_number(raw)?;
    if value < Decimal::ONE {
        return None;
    }
    whole_units(value)
}

fn whole_units(value: Decimal) -> Option<U256> {
    value.trunc().to_u128().map(U256::from)
}
