//! Client-side aggregation
//!
//! Primary key lookups fold aggregates here with the same numeric rules the
//! generated script applies server-side, so both strategies agree.

use crate::script::Operation;

/// Converts text to a number the way the script's `tonumber` does.
///
/// Decimal (with exponent, `inf`, `nan`) and `0x` hexadecimal integers are
/// accepted, surrounding whitespace is ignored, anything else is `None`.
pub fn lua_tonumber(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negative, unsigned) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        let value = u64::from_str_radix(hex, 16).ok()? as f64;
        return Some(if negative { -value } else { value });
    }

    trimmed.parse::<f64>().ok()
}

/// Running state of one aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    operation: Operation,
    total: f64,
    rows: u64,
    extreme: Option<f64>,
}

impl Fold {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            total: 0.0,
            rows: 0,
            extreme: None,
        }
    }

    /// Adds one matching row's value (`None` when the field is absent)
    pub fn push(&mut self, value: Option<&str>) {
        let number = value.and_then(lua_tonumber);
        self.rows += 1;
        match self.operation {
            Operation::Sum | Operation::Average => self.total += number.unwrap_or(0.0),
            Operation::Min => {
                if let Some(x) = number {
                    if self.extreme.map_or(true, |v| x < v) {
                        self.extreme = Some(x);
                    }
                }
            }
            Operation::Max => {
                if let Some(x) = number {
                    if self.extreme.map_or(true, |v| x > v) {
                        self.extreme = Some(x);
                    }
                }
            }
            _ => {}
        }
    }

    /// Final value: sum is never `None`; average is `None` over zero rows;
    /// min/max are `None` when no row had a numeric value.
    pub fn finish(&self) -> Option<f64> {
        match self.operation {
            Operation::Sum => Some(self.total),
            Operation::Average if self.rows == 0 => None,
            Operation::Average => Some(self.total / self.rows as f64),
            Operation::Min | Operation::Max => self.extreme,
            _ => None,
        }
    }
}
