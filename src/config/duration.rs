//! Duration parsing utilities.

use anyhow::Context;
use std::time::Duration;

/// Parse a duration string like "1h", "30m", "300s", "250ms" or "300".
/// Plain numbers are seconds.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    // "ms" must be tried before "m" and "s".
    let (number, unit_millis) = if let Some(num_str) = s.strip_suffix("ms") {
        (num_str, 1)
    } else if let Some(num_str) = s.strip_suffix('h') {
        (num_str, 3_600_000)
    } else if let Some(num_str) = s.strip_suffix('m') {
        (num_str, 60_000)
    } else if let Some(num_str) = s.strip_suffix('s') {
        (num_str, 1_000)
    } else {
        (s, 1_000)
    };

    let value: u64 = number
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration value: {s}"))?;
    let millis = value
        .checked_mul(unit_millis)
        .with_context(|| format!("Duration out of range: {s}"))?;
    Ok(Duration::from_millis(millis))
}
