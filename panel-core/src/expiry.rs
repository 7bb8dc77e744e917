//! Expiration presets.
//!
//! Month and year presets use calendar arithmetic that clamps to the last
//! valid day of the target month: Jan 31 + 1 month is Feb 28 (Feb 29 in a
//! leap year), and Feb 29 + 1 year is Feb 28. Time of day is preserved.

use crate::error::ValidationError;
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, Utc};

/// A named expiration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPreset {
    /// `7d`
    SevenDays,
    /// `1m`
    OneMonth,
    /// `3m`
    ThreeMonths,
    /// `6m`
    SixMonths,
    /// `1y`
    OneYear,
    /// `never`, also used for unrecognized names.
    Never,
    /// `custom`, requires an explicit instant.
    Custom,
}

impl ExpiryPreset {
    /// Parse a preset name. Unknown names mean [`ExpiryPreset::Never`].
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "7d" => ExpiryPreset::SevenDays,
            "1m" => ExpiryPreset::OneMonth,
            "3m" => ExpiryPreset::ThreeMonths,
            "6m" => ExpiryPreset::SixMonths,
            "1y" => ExpiryPreset::OneYear,
            "custom" => ExpiryPreset::Custom,
            _ => ExpiryPreset::Never,
        }
    }

    fn months(&self) -> Option<u32> {
        match self {
            ExpiryPreset::OneMonth => Some(1),
            ExpiryPreset::ThreeMonths => Some(3),
            ExpiryPreset::SixMonths => Some(6),
            ExpiryPreset::OneYear => Some(12),
            _ => None,
        }
    }
}

/// Compute the absolute expiration instant for a preset, `None` = never.
///
/// `custom_expires_at` is only used by [`ExpiryPreset::Custom`], which fails
/// when the instant is missing, unparseable or not strictly after `now`.
pub fn compute_expires_at(
    preset: ExpiryPreset,
    custom_expires_at: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    if let Some(months) = preset.months() {
        return now
            .checked_add_months(Months::new(months))
            .map(Some)
            .ok_or(ValidationError::ExpiryOutOfRange);
    }

    match preset {
        ExpiryPreset::SevenDays => now
            .checked_add_signed(Duration::days(7))
            .map(Some)
            .ok_or(ValidationError::ExpiryOutOfRange),
        ExpiryPreset::Custom => {
            let raw = custom_expires_at
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(ValidationError::MissingCustomExpiry)?;
            let instant = parse_instant(raw)
                .ok_or_else(|| ValidationError::InvalidCustomExpiry(raw.to_string()))?;
            if instant <= now {
                return Err(ValidationError::ExpiryNotInFuture);
            }
            Ok(Some(instant))
        }
        _ => Ok(None),
    }
}

/// Parse an RFC 3339 instant, or a naive `datetime-local` / date value as UTC.
fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// A client is expired iff it has an expiry at or before `now`.
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|at| at <= now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 30, 0).unwrap()
    }

    #[test]
    fn preset_names() {
        assert_eq!(ExpiryPreset::parse("7d"), ExpiryPreset::SevenDays);
        assert_eq!(ExpiryPreset::parse("1m"), ExpiryPreset::OneMonth);
        assert_eq!(ExpiryPreset::parse("3m"), ExpiryPreset::ThreeMonths);
        assert_eq!(ExpiryPreset::parse("6m"), ExpiryPreset::SixMonths);
        assert_eq!(ExpiryPreset::parse("1y"), ExpiryPreset::OneYear);
        assert_eq!(ExpiryPreset::parse("custom"), ExpiryPreset::Custom);
        assert_eq!(ExpiryPreset::parse("never"), ExpiryPreset::Never);
        assert_eq!(ExpiryPreset::parse("forever-ish"), ExpiryPreset::Never);
    }

    #[test]
    fn seven_days() {
        let now = at(2025, 3, 1);
        let expires = compute_expires_at(ExpiryPreset::SevenDays, None, now).unwrap();
        assert_eq!(expires, Some(at(2025, 3, 8)));
    }

    #[test]
    fn months_are_calendar_relative() {
        let now = at(2025, 1, 15);
        let one = compute_expires_at(ExpiryPreset::OneMonth, None, now).unwrap();
        let three = compute_expires_at(ExpiryPreset::ThreeMonths, None, now).unwrap();
        let six = compute_expires_at(ExpiryPreset::SixMonths, None, now).unwrap();
        let year = compute_expires_at(ExpiryPreset::OneYear, None, now).unwrap();
        assert_eq!(one, Some(at(2025, 2, 15)));
        assert_eq!(three, Some(at(2025, 4, 15)));
        assert_eq!(six, Some(at(2025, 7, 15)));
        assert_eq!(year, Some(at(2026, 1, 15)));
    }

    #[test]
    fn month_end_clamps() {
        let expires = compute_expires_at(ExpiryPreset::OneMonth, None, at(2025, 1, 31)).unwrap();
        assert_eq!(expires, Some(at(2025, 2, 28)));

        let expires = compute_expires_at(ExpiryPreset::OneMonth, None, at(2024, 1, 31)).unwrap();
        assert_eq!(expires, Some(at(2024, 2, 29)));

        let expires = compute_expires_at(ExpiryPreset::OneYear, None, at(2024, 2, 29)).unwrap();
        assert_eq!(expires, Some(at(2025, 2, 28)));
    }

    #[test]
    fn never_has_no_expiry() {
        let now = at(2025, 1, 1);
        assert_eq!(compute_expires_at(ExpiryPreset::Never, None, now).unwrap(), None);
        // the custom instant is ignored by non-custom presets
        assert_eq!(
            compute_expires_at(ExpiryPreset::Never, Some("garbage"), now).unwrap(),
            None
        );
    }

    #[test]
    fn custom_requires_instant() {
        let now = at(2025, 1, 1);
        assert_eq!(
            compute_expires_at(ExpiryPreset::Custom, None, now).unwrap_err(),
            ValidationError::MissingCustomExpiry
        );
        assert_eq!(
            compute_expires_at(ExpiryPreset::Custom, Some("  "), now).unwrap_err(),
            ValidationError::MissingCustomExpiry
        );
    }

    #[test]
    fn custom_rejects_garbage() {
        let err = compute_expires_at(ExpiryPreset::Custom, Some("next tuesday"), at(2025, 1, 1))
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidCustomExpiry("next tuesday".into()));
    }

    #[test]
    fn custom_past_fails_future_succeeds() {
        let now = at(2025, 6, 1);
        assert_eq!(
            compute_expires_at(ExpiryPreset::Custom, Some("2025-05-01T00:00:00Z"), now)
                .unwrap_err(),
            ValidationError::ExpiryNotInFuture
        );
        // exactly now is not in the future
        assert_eq!(
            compute_expires_at(ExpiryPreset::Custom, Some(&now.to_rfc3339()), now).unwrap_err(),
            ValidationError::ExpiryNotInFuture
        );

        let expires =
            compute_expires_at(ExpiryPreset::Custom, Some("2030-01-02T03:04:05+02:00"), now)
                .unwrap();
        assert_eq!(
            expires,
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 1, 4, 5).unwrap())
        );
    }

    #[test]
    fn custom_accepts_naive_forms_as_utc() {
        let now = at(2025, 6, 1);
        let expected = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 0).unwrap();
        assert_eq!(
            compute_expires_at(ExpiryPreset::Custom, Some("2030-01-02T03:04"), now).unwrap(),
            Some(expected)
        );
        assert_eq!(
            compute_expires_at(ExpiryPreset::Custom, Some("2030-01-02T03:04:00"), now).unwrap(),
            Some(expected)
        );
        assert_eq!(
            compute_expires_at(ExpiryPreset::Custom, Some("2030-01-02"), now).unwrap(),
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn expiry_test_boundaries() {
        let now = at(2025, 1, 1);
        assert!(!is_expired(None, now));
        assert!(is_expired(Some(now), now));
        assert!(is_expired(Some(now - Duration::seconds(1)), now));
        assert!(!is_expired(Some(now + Duration::seconds(1)), now));
    }
}
