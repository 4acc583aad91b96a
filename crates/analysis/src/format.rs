//! Human readable numbers for reports.

const BYTE_UNITS: [&str; 5] = ["Bytes", "KB", "MB", "GB", "TB"];

/// Binary (1024) units, at most two decimals with trailing zeros dropped:
/// `1536` -> `1.5 KB`, `0` -> `0 Bytes`.
pub fn format_bytes(bytes: f64) -> String {
    if !bytes.is_finite() || bytes <= 0.0 {
        return "0 Bytes".to_string();
    }
    let mut scaled = bytes;
    let mut unit = 0;
    while scaled >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }
    format!("{} {}", trim_decimals(scaled), BYTE_UNITS[unit])
}

/// Fraction as a percentage with two decimals: `0.1234` -> `12.34%`
pub fn format_percentage(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Milliseconds as seconds with two decimals: `1500` -> `1.50s`
pub fn format_seconds(millis: f64) -> String {
    format!("{:.2}s", millis / 1000.0)
}

fn trim_decimals(value: f64) -> String {
    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}
