//! Primary-key normalization
//!
//! Records are stored under `<prefix>:a:<pk>` where `<pk>` is derived from
//! the primary-key values:
//!
//! - one column: numeric or short alphanumeric values are used as is,
//!   anything else is replaced by its MD5 hex digest;
//! - several columns (sorted by name): all numeric → joined with `-`,
//!   otherwise the MD5 of the JSON object of the values, numeric strings
//!   encoded as JSON numbers.

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value as Json};

const MAX_VERBATIM_LEN: usize = 32;

/// Normalizes a single-column key value
pub fn normalize_value(value: &str) -> String {
    if is_numeric(value)
        || (value.len() <= MAX_VERBATIM_LEN
            && !value.is_empty()
            && value.bytes().all(|b| b.is_ascii_alphanumeric()))
    {
        value.to_string()
    } else {
        md5_hex(value.as_bytes())
    }
}

/// Normalizes a key given as column → value. A single entry collapses to
/// [`normalize_value`].
pub fn normalize_key(values: &BTreeMap<String, String>) -> String {
    if values.len() == 1 {
        if let Some(value) = values.values().next() {
            return normalize_value(value);
        }
    }

    if values.values().all(|v| is_numeric(v)) {
        return values
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("-");
    }

    // BTreeMap iteration keeps the object keys sorted
    let object: Map<String, Json> = values
        .iter()
        .map(|(k, v)| (k.clone(), numeric_json(v)))
        .collect();
    md5_hex(Json::Object(object).to_string().as_bytes())
}

fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

fn numeric_json(value: &str) -> Json {
    if !is_numeric(value) {
        return Json::String(value.to_string());
    }
    let trimmed = value.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Json::Number(n.into());
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Json::Number)
        .unwrap_or_else(|| Json::String(value.to_string()))
}

/// Decimal number syntax: optional sign, digits with an optional fraction,
/// optional exponent. Surrounding whitespace is allowed.
pub fn is_numeric(value: &str) -> bool {
    let s = value.trim();
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(at) => (&s[..at], Some(&s[at + 1..])),
        None => (s, None),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !frac_part.map_or(true, all_digits) {
        return false;
    }
    if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
        return false;
    }

    match exponent {
        None => true,
        Some(exp) => {
            let exp = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp.is_empty() && all_digits(exp)
        }
    }
}
