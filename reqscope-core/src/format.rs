//! Formatting helpers shared by the API and the CLI.

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count with binary units (e.g., "1.50 KB").
///
/// Divides by 1024 until the value drops below 1024, falling through to PB.
pub fn format_bytes(bytes: f64) -> String {
    let mut value = bytes;
    for unit in BYTE_UNITS {
        if value < 1024.0 {
            return format!("{:.2} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.2} PB", value)
}

/// Format an optional millisecond duration, or an em dash if missing.
pub fn format_millis_opt(ms: Option<f64>) -> String {
    match ms {
        Some(ms) => format!("{:.2} ms", ms),
        None => "\u{2014}".to_string(),
    }
}
