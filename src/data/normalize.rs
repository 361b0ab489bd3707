//! Price text normalization
//!
//! Upstream pages print prices in Vietnamese notation (`1.250.000`, with
//! periods grouping thousands and a comma before decimals) but the same
//! numbers occasionally show up comma-grouped. These helpers turn either
//! into whole numbers and format numbers back into the grouped notation.

/// Normalizes scraped price text into a whole number
///
/// Every character other than digits, commas and periods is dropped and
/// periods are treated as thousands separators. A single remaining comma
/// is the decimal separator; several commas can only be grouping and are
/// removed. The result is rounded to the nearest integer.
///
/// Returns `None` when nothing parseable remains. Callers treat that as a
/// missing price, not as a fatal error.
pub fn normalize_price(text: &str) -> Option<i64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .filter(|c| *c != '.')
        .collect();

    let decimal = if cleaned.matches(',').count() > 1 {
        cleaned.replace(',', "")
    } else {
        cleaned.replacen(',', ".", 1)
    };

    let value: f64 = decimal.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.round() as i64)
}

/// Formats a number with period thousands separators and no decimals
pub fn format_grouped(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        grouped.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    grouped
}
