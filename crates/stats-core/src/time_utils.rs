use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::error::{Result, StatsError};

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Uses the `iana-time-zone` crate directly – no subprocess calls.
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── Bucketing timezone resolution ─────────────────────────────────────────────

/// Resolve the timezone used for month, hour and weekday buckets.
///
/// * `"auto"` → the system timezone, or UTC when it is not a known IANA name.
/// * any other value must be a valid IANA identifier (`"UTC"`, `"Europe/Madrid"`).
pub fn resolve_timezone(name: &str) -> Result<Tz> {
    if name.eq_ignore_ascii_case("auto") {
        let detected = get_system_timezone();
        return Ok(detected.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "detected system timezone \"{}\" is not recognised, using UTC",
                detected
            );
            Tz::UTC
        }));
    }

    let tz = name
        .parse::<Tz>()
        .map_err(|_| StatsError::InvalidTimezone(name.to_string()))?;
    debug!("bucketing timestamps in {}", tz);
    Ok(tz)
}

/// Validate that `tz_name` is a recognised IANA timezone identifier.
pub fn validate_timezone(tz_name: &str) -> bool {
    tz_name.parse::<Tz>().is_ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_utc() {
        assert_eq!(resolve_timezone("UTC").unwrap(), Tz::UTC);
    }

    #[test]
    fn test_resolve_named_zone() {
        let tz = resolve_timezone("Europe/Madrid").unwrap();
        assert_eq!(tz, Tz::Europe__Madrid);
    }

    #[test]
    fn test_resolve_invalid_zone_is_error() {
        let err = resolve_timezone("Not/AZone").unwrap_err();
        assert!(matches!(err, StatsError::InvalidTimezone(ref n) if n == "Not/AZone"));
    }

    #[test]
    fn test_resolve_auto_never_fails() {
        assert!(resolve_timezone("auto").is_ok());
        assert!(resolve_timezone("AUTO").is_ok());
    }

    #[test]
    fn test_get_system_timezone_non_empty() {
        assert!(!get_system_timezone().is_empty());
    }

    #[test]
    fn test_validate_timezone() {
        assert!(validate_timezone("America/New_York"));
        assert!(!validate_timezone("Invalid/Zone"));
    }
}
