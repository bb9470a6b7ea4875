/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use history_core::formatting::format_number;
///
/// assert_eq!(format_number(1512.0, 0), "1,512");
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Nudge by a half ULP at the target precision so exact midpoints round up.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();

    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        // "0.50" -> ".50"
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative && result.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("-{}", result)
    } else {
        result
    }
}

/// Render a win rate as a percentage with one decimal, `n/a` when undefined.
///
/// # Examples
///
/// ```
/// use history_core::formatting::format_win_rate;
///
/// assert_eq!(format_win_rate(Some(0.5)), "50.0%");
/// assert_eq!(format_win_rate(None), "n/a");
/// ```
pub fn format_win_rate(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{}%", format_number(r * 100.0, 1)),
        None => "n/a".to_string(),
    }
}

/// Render a rating change with an explicit sign; whole numbers drop the
/// decimals.
///
/// ```
/// use history_core::formatting::format_rating_change;
///
/// assert_eq!(format_rating_change(12.0), "+12");
/// assert_eq!(format_rating_change(-8.0), "-8");
/// assert_eq!(format_rating_change(0.0), "0");
/// ```
pub fn format_rating_change(change: f64) -> String {
    let decimals = if change.fract() == 0.0 { 0 } else { 1 };
    let body = format_number(change.abs(), decimals);
    if body.chars().all(|c| c == '0' || c == '.') {
        body
    } else if change > 0.0 {
        format!("+{}", body)
    } else {
        format!("-{}", body)
    }
}

fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}
