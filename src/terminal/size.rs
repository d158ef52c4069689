//! Human-readable byte sizes.

use crate::error::{Error, Result};

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Format a byte count for display, e.g. `48.8 KB`.
pub fn format_size(bytes: u64) -> String {
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Parse a byte count with an optional binary suffix: `500`, `1000K`, `2M`,
/// `1G`. A trailing `B` (`10KB`) is accepted; suffixes are case-insensitive.
pub fn parse_size(input: &str) -> Result<u64> {
    let invalid = |reason: &str| Error::InvalidArgument {
        argument: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    let upper = trimmed.to_ascii_uppercase();
    let body = upper.strip_suffix('B').unwrap_or(&upper);

    let (digits, multiplier) = match body.chars().last() {
        Some('K') => (&body[..body.len() - 1], KB),
        Some('M') => (&body[..body.len() - 1], MB),
        Some('G') => (&body[..body.len() - 1], GB),
        Some(_) => (body, 1),
        None => return Err(invalid("size is empty")),
    };

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| invalid("expected a whole number with an optional K, M or G suffix"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| invalid("size is too large"))
}
