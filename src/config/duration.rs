//! # Duration Parsing
//!
//! Handles parsing Kubernetes duration strings used for poll frequencies.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<number>\d+)(?P<unit>[smhd])$")
        .expect("duration regex is a valid literal")
});

/// Parse Kubernetes duration string into std::time::Duration
/// Supports formats: "30s", "1m", "5m", "1h", "2h", "1d"
/// Returns Duration or error if format is invalid
pub fn parse_kubernetes_duration(duration_str: &str) -> Result<Duration> {
    let duration_trimmed = duration_str.trim();

    if duration_trimmed.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    // Match against trimmed, lowercase version
    let interval_lower = duration_trimmed.to_lowercase();

    let captures = DURATION_REGEX.captures(&interval_lower).ok_or_else(|| {
        anyhow::anyhow!(
            "Invalid duration format '{}'. Expected format: <number><unit> (e.g., '30s', '1m', '1h')",
            duration_trimmed
        )
    })?;

    let number: u64 = captures["number"].parse().map_err(|e| {
        anyhow::anyhow!(
            "Invalid duration number '{}' in '{}': {}",
            &captures["number"],
            duration_trimmed,
            e
        )
    })?;

    if number == 0 {
        return Err(anyhow::anyhow!(
            "Duration number must be greater than 0, got '{}'",
            duration_trimmed
        ));
    }

    let multiplier = match &captures["unit"] {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        unit => {
            return Err(anyhow::anyhow!(
                "Invalid unit '{}' in duration '{}'. Expected: s, m, h, or d",
                unit,
                duration_trimmed
            ));
        }
    };

    let seconds = number
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("Duration '{}' is too large", duration_trimmed))?;

    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_kubernetes_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_kubernetes_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_kubernetes_duration(" 2H ").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_kubernetes_duration("1d").unwrap(), Duration::from_secs(86400));
    }

    #[test]
    fn test_parse_rejects_invalid() {
        for input in ["", "0m", "5", "m", "1.5m", "10w", "-1s"] {
            assert!(
                parse_kubernetes_duration(input).is_err(),
                "'{input}' should be rejected"
            );
        }
    }
}
