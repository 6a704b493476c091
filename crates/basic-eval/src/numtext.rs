//! Number ⇄ text conversions shared by `STR$`, `VAL`, `PRINT` and `READ`.
//!
//! BBC BASIC prints floats with up to nine significant digits and switches
//! to exponential form outside `1e-2..1e8`; integers print as plain
//! decimal. This isn't specified byte-for-byte anywhere in the core spec
//! (formatting is a `PRINT`/host-surface concern), so the constants here
//! are the classic interpreter's defaults, not a literal requirement.

/// Render a float the way `STR$`/`PRINT` would, switching to `E` notation
/// outside the "normal" range.
#[must_use]
pub fn format_float(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    if !f.is_finite() {
        return if f.is_nan() { "NaN".to_string() } else if f > 0.0 { "+INF".to_string() } else { "-INF".to_string() };
    }
    let mag = f.abs();
    if (1e-2..1e8).contains(&mag) {
        format_fixed(f)
    } else {
        format_exponential(f)
    }
}

fn format_fixed(f: f64) -> String {
    let mut s = format!("{f:.9e}");
    // Re-derive a plain decimal form at 9 significant digits, then trim
    // trailing zeros (and a trailing '.') the way classic `STR$` does.
    let sig = significant_digits(f, 9);
    s = sig;
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

fn significant_digits(f: f64, digits: u32) -> String {
    let exp = f.abs().log10().floor() as i32;
    let scale = 10f64.powi(digits as i32 - 1 - exp);
    let rounded = (f * scale).round() / scale;
    let decimals = (digits as i32 - 1 - exp).max(0) as usize;
    format!("{rounded:.decimals$}")
}

fn format_exponential(f: f64) -> String {
    let s = format!("{f:.8e}");
    let (mantissa, exp) = s.split_once('e').unwrap_or((&s, "0"));
    let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
    let exp: i32 = exp.parse().unwrap_or(0);
    format!("{mantissa}E{}{:02}", if exp >= 0 { "+" } else { "-" }, exp.abs())
}

/// Parse the numeric prefix of `text` the way `VAL` and `READ` do: leading
/// whitespace is skipped, the rest is parsed as far as a valid number
/// extends (hex via `&`, otherwise decimal/float), with `0` returned for
/// text that isn't numeric at all rather than an error (`VAL` never
/// raises).
#[must_use]
pub fn parse_numeric_prefix(text: &str) -> basic_core::Value {
    let trimmed = text.trim_start();
    if let Some(hex) = trimmed.strip_prefix('&') {
        let digits: String = hex.chars().take_while(char::is_ascii_hexdigit).collect();
        return basic_core::Value::Int(i64::from_str_radix(&digits, 16).unwrap_or(0));
    }
    let mut end = 0;
    let bytes = trimmed.as_bytes();
    let mut seen_dot = false;
    let mut seen_digit = false;
    if end < bytes.len() && matches!(bytes[end], b'+' | b'-') {
        end += 1;
    }
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => {
                seen_digit = true;
                end += 1;
            }
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    if end < bytes.len() && seen_digit && matches!(bytes[end], b'E' | b'e') {
        let mut e_end = end + 1;
        if e_end < bytes.len() && matches!(bytes[e_end], b'+' | b'-') {
            e_end += 1;
        }
        let exp_start = e_end;
        while e_end < bytes.len() && bytes[e_end].is_ascii_digit() {
            e_end += 1;
        }
        if e_end > exp_start {
            end = e_end;
        }
    }
    if !seen_digit {
        return basic_core::Value::Int(0);
    }
    let slice = &trimmed[..end];
    if seen_dot || slice.contains(['e', 'E']) {
        basic_core::Value::Float(slice.parse().unwrap_or(0.0))
    } else {
        slice
            .parse::<i64>()
            .map_or_else(|_| basic_core::Value::Float(slice.parse().unwrap_or(0.0)), basic_core::Value::Int)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basic_core::Value;

    #[test]
    fn formats_whole_numbers_without_a_decimal_point() {
        assert_eq!(format_float(42.0), "42");
    }

    #[test]
    fn formats_fractions_trimmed() {
        assert_eq!(format_float(3.5), "3.5");
    }

    #[test]
    fn switches_to_exponential_outside_normal_range() {
        let s = format_float(1.5e10);
        assert!(s.contains('E'), "expected exponential form, got {s}");
    }

    #[test]
    fn val_parses_a_leading_number_and_ignores_the_rest() {
        assert_eq!(parse_numeric_prefix("123abc"), Value::Int(123));
        assert_eq!(parse_numeric_prefix("  -4.5xyz"), Value::Float(-4.5));
    }

    #[test]
    fn val_of_nonsense_is_zero() {
        assert_eq!(parse_numeric_prefix("hello"), Value::Int(0));
    }

    #[test]
    fn val_parses_hex_literal() {
        assert_eq!(parse_numeric_prefix("&FF"), Value::Int(255));
    }
}
