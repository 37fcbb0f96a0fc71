//! Human-readable byte counts.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
const STEP: f64 = 1024.0;

/// Formats a byte count in the largest fitting unit with two decimals.
///
/// Units step by 1024 and stop at TB, so very large values stay in TB.
///
/// # Examples
///
/// ```
/// use teradl_core::format_size;
///
/// assert_eq!(format_size(0), "0.00 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= STEP && unit < UNITS.len() - 1 {
        value /= STEP;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
