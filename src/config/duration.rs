//! Duration strings: an integer followed by `ms`, `s`, `m` or `h`.

use std::time::Duration;

use super::ConfigError;

/// Parse `500ms`, `30s`, `5m` or `1h` (case-insensitive, surrounding
/// whitespace ignored).
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let trimmed = raw.trim().to_ascii_lowercase();
    let invalid = || ConfigError::InvalidDuration(raw.to_string());

    let (number, unit_millis) = if let Some(n) = trimmed.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = trimmed.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = trimmed.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = trimmed.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        return Err(invalid());
    };

    let value: u64 = number.parse().map_err(|_| invalid())?;
    value
        .checked_mul(unit_millis)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}
