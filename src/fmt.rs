fn with_commas(digits: &str) -> String {
    let mut out = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out.chars().rev().collect()
}

/// Format an integer amount with thousands separators: 1,234,567
pub fn amount(val: i64) -> String {
    let digits = val.unsigned_abs().to_string();
    if val < 0 {
        format!("-{}", with_commas(&digits))
    } else {
        with_commas(&digits)
    }
}

/// Format a thousand-NTD amount in billions with two decimals: 2,345.68
pub fn billions(val: i64) -> String {
    let scaled = format!("{:.2}", crate::aggregator::scale_billions(val).abs());
    let (int_part, dec_part) = scaled.split_once('.').unwrap_or((scaled.as_str(), "00"));
    let sign = if val < 0 && scaled != "0.00" { "-" } else { "" };
    format!("{sign}{}.{dec_part}", with_commas(int_part))
}
