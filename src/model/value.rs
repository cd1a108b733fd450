//! Loose coercions over property values.
//!
//! Attribute and style values arrive as whatever the markup or configuration
//! held: numbers, numeric strings like `"12pt"`, booleans or null. Numeric
//! reads take the longest leading number of a string and ignore the rest.

use serde_json::Value;

/// Parse the longest numeric prefix of `s`, after leading whitespace.
///
/// `"12pt"` → 12, `" -1.5e2x"` → -150, `"abc"` → `None`.
pub fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    if s[end..].starts_with("Infinity") {
        let inf = f64::INFINITY;
        return Some(if bytes[0] == b'-' { -inf } else { inf });
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - digits_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }

    // Exponent only counts when at least one digit follows it.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Numeric reading of a property value. Booleans, null, arrays and objects are not numbers.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float(s),
        _ => None,
    }
}

/// Numeric reading of an optional value, falling back to `default`.
pub fn number_or(value: Option<&Value>, default: f64) -> f64 {
    value.and_then(number).unwrap_or(default)
}

/// Truthiness of a property value: `false`, `0`, `""` and null are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form of a scalar value. Null and containers have none.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerce a raw markup attribute: numeric strings become numbers,
/// `"true"`/`"false"` become booleans, anything else stays a string.
pub fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    let trimmed = raw.trim();
    let numeric = !trimmed.is_empty()
        && trimmed
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'));
    if numeric {
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::from(i);
        }
        if let Some(n) = trimmed
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}
