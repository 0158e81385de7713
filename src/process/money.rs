use rust_decimal::{prelude::FromPrimitive, Decimal};
use std::str::FromStr;

use super::sheet::RawCell;

/// Decimal places kept for monetary values.
pub const MONEY_SCALE: u32 = 2;

/// Result of a parse-or-default coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coerced<T> {
    pub value: T,
    /// True when the input could not be parsed and the default was used.
    pub defaulted: bool,
}

impl<T> Coerced<T> {
    fn parsed(value: T) -> Self {
        Self {
            value,
            defaulted: false,
        }
    }

    fn default_to(value: T) -> Self {
        Self {
            value,
            defaulted: true,
        }
    }
}

fn to_scale(mut d: Decimal) -> Decimal {
    d = d.round_dp(MONEY_SCALE);
    d.rescale(MONEY_SCALE);
    d
}

/// Exactly `0.00`.
pub fn zero_amount() -> Decimal {
    Decimal::new(0, MONEY_SCALE)
}

/// Parse a monetary text value. Accepts thousands separators and a trailing
/// minus sign (`1,200.50-`).
pub fn parse_money_text(s: &str) -> Option<Decimal> {
    let compact: String = s
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if compact.is_empty() {
        return None;
    }
    let (digits, negate) = match compact.strip_suffix('-') {
        Some(rest) if !rest.starts_with('-') => (rest, true),
        Some(_) => return None,
        None => (compact.as_str(), false),
    };
    let d = Decimal::from_str(digits).ok()?;
    Some(if negate { -d } else { d })
}

/// Coerce a cell to a two-decimal amount; anything unparseable is `0.00`.
pub fn coerce_money(cell: &RawCell) -> Coerced<Decimal> {
    let parsed = match cell {
        RawCell::Number(n) if n.is_finite() => Decimal::from_f64(*n),
        RawCell::Text(s) => parse_money_text(s),
        _ => None,
    };
    match parsed {
        Some(d) => Coerced::parsed(to_scale(d)),
        None => Coerced::default_to(zero_amount()),
    }
}
