use std::sync::OnceLock;

use regex::Regex;

/// Offset between the Republic of China calendar and AD years.
pub const ROC_OFFSET: i32 = 1911;

pub fn roc_to_ad(roc_year: i32) -> i32 {
    roc_year + ROC_OFFSET
}

/// Normalize a cell for keyword matching: trims and drops newlines, tabs,
/// ASCII spaces and the full-width space (U+3000).
pub fn clean_str(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r' | '\t' | ' ' | '\u{3000}'))
        .collect()
}

/// Parse an amount cell. Never fails: anything that does not look like a
/// number is 0. Parenthesized values are negative, fractions are truncated.
pub fn clean_number(raw: &str) -> i64 {
    let s = clean_str(raw).replace(',', "");
    if matches!(s.as_str(), "" | "-" | "nan" | "None") {
        return 0;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return -parse_truncated(inner);
    }
    parse_truncated(&s)
}

fn parse_truncated(s: &str) -> i64 {
    match s.parse::<f64>() {
        Ok(f) if f.is_finite() => f.trunc() as i64,
        _ => 0,
    }
}

fn code_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.?(.*)$").expect("valid regex"))
}

fn code_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\s*(\D.*)$").expect("valid regex"))
}

/// Split a level marker like `"1.稅課收入"` into `("1", "稅課收入")`.
/// Text without a leading number comes back as `("", text)`.
pub fn extract_code_name(raw: &str) -> (String, String) {
    let s = clean_str(raw);
    if s.is_empty() {
        return (String::new(), String::new());
    }
    match code_name_re().captures(&s) {
        Some(caps) => (caps[1].to_string(), caps[2].trim().to_string()),
        None => (String::new(), s),
    }
}

/// Drop a leading numeric code from an explicit name cell,
/// e.g. `"0101000000 稅課收入"` becomes `"稅課收入"`.
pub fn strip_code_prefix(raw: &str) -> String {
    let s = raw.trim();
    match code_prefix_re().captures(s) {
        Some(caps) => caps[2].trim().to_string(),
        None => s.to_string(),
    }
}

/// Fixed-width code segment used to build hierarchical ids.
pub fn pad_code(code: &str, width: usize) -> String {
    if code.is_empty() {
        return "0".repeat(width);
    }
    if code.chars().all(|c| c.is_ascii_digit()) {
        return format!("{code:0>width$}");
    }
    code.chars()
        .chain(std::iter::repeat('0'))
        .take(width)
        .collect()
}

pub fn code_to_int(code: &str) -> i64 {
    code.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roc_to_ad() {
        assert_eq!(roc_to_ad(97), 2008);
        assert_eq!(roc_to_ad(114), 2025);
    }

    #[test]
    fn test_clean_str_removes_whitespace_variants() {
        assert_eq!(clean_str("  本年度\n預算數 "), "本年度預算數");
        assert_eq!(clean_str("歲　入"), "歲入");
        assert_eq!(clean_str(""), "");
    }

    #[test]
    fn test_clean_number() {
        assert_eq!(clean_number("15,676,552"), 15_676_552);
        assert_eq!(clean_number(" - "), 0);
        assert_eq!(clean_number("nan"), 0);
        assert_eq!(clean_number("1234.9"), 1234);
        assert_eq!(clean_number("(1,000)"), -1000);
        assert_eq!(clean_number("-42"), -42);
        assert_eq!(clean_number("n/a"), 0);
    }

    #[test]
    fn test_extract_code_name() {
        assert_eq!(extract_code_name("1.稅課收入"), ("1".to_string(), "稅課收入".to_string()));
        assert_eq!(extract_code_name("12"), ("12".to_string(), String::new()));
        assert_eq!(extract_code_name("總統府"), (String::new(), "總統府".to_string()));
        assert_eq!(extract_code_name("  "), (String::new(), String::new()));
    }

    #[test]
    fn test_strip_code_prefix() {
        assert_eq!(strip_code_prefix("0101000000 稅課收入"), "稅課收入");
        assert_eq!(strip_code_prefix("3200000000國務支出"), "國務支出");
        assert_eq!(strip_code_prefix("行政院"), "行政院");
        // a bare number has no name part to keep
        assert_eq!(strip_code_prefix("2024"), "2024");
    }

    #[test]
    fn test_pad_code() {
        assert_eq!(pad_code("", 2), "00");
        assert_eq!(pad_code("3", 2), "03");
        assert_eq!(pad_code("12", 4), "0012");
        assert_eq!(pad_code("A", 2), "A0");
        assert_eq!(pad_code("ABCDE", 4), "ABCD");
    }

    #[test]
    fn test_code_to_int() {
        assert_eq!(code_to_int("07"), 7);
        assert_eq!(code_to_int(""), 0);
        assert_eq!(code_to_int("甲"), 0);
    }
}
