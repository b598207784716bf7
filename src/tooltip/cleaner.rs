use chrono::NaiveDate;

// ── Field text ────────────────────────────────────────────────────────────────

/// Digits with optional sign, thousands separators, decimal point or percent.
/// "1,234" | "-12.5" | "3.4%" → true, "Jan 1, 2021" → false
pub fn is_numeric_looking(s: &str) -> bool {
    let s = s.trim();
    let body = s.strip_prefix(['-', '+']).unwrap_or(s);
    let body = body.strip_suffix('%').unwrap_or(body);
    !body.is_empty()
        && body.chars().any(|c| c.is_ascii_digit())
        && body.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.')
        && !body.starts_with([',', '.'])
        && body.matches('.').count() <= 1
}

/// Trim, collapse inner whitespace, strip thousands separators from numbers.
/// " 1,050 " → "1050" | "Lab  Report\nDate" → "Lab Report Date"
pub fn clean_field(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if is_numeric_looking(&collapsed) {
        collapsed.replace(',', "")
    } else {
        collapsed
    }
}

// ── Dates ─────────────────────────────────────────────────────────────────────

/// Parse a tooltip date with the first matching chrono format.
/// Two-digit-year formats must come before four-digit ones.
pub fn parse_date<S: AsRef<str>>(s: &str, formats: &[S]) -> Option<NaiveDate> {
    let s = s.trim();
    formats
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f.as_ref()).ok())
}
