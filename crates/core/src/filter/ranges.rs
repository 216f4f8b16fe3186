use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::storage::DateRangeError;
use crate::value::AttrValue;

/// Format dates are stored in; lexicographic order matches date order.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A date range with inclusive start and end dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new date range, validating that start <= end.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    /// Half-open store bounds `[start, end + 1 day)`.
    ///
    /// The end date is inclusive at day granularity, so the upper bound is
    /// the first day after it.
    pub fn bounds(&self) -> (AttrValue, AttrValue) {
        // NaiveDate::MAX has no next day; the range then ends at MAX exclusive.
        let exclusive_end = self.end.checked_add_days(Days::new(1)).unwrap_or(self.end);
        (format_date(self.start), format_date(exclusive_end))
    }
}

/// A time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::InvalidRange);
        }
        Ok(Self { start, end })
    }

    /// Half-open store bounds, RFC 3339 encoded.
    pub fn bounds(&self) -> (AttrValue, AttrValue) {
        (
            AttrValue::S(self.start.to_rfc3339()),
            AttrValue::S(self.end.to_rfc3339()),
        )
    }
}

/// A numeric range with independently inclusive or exclusive bounds.
///
/// `min`/`max` are inclusive and take precedence over the exclusive
/// `lower`/`upper` on the same side.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumberRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl NumberRange {
    /// `attribute >= min`
    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            ..Default::default()
        }
    }

    /// `attribute > lower`
    pub fn above(lower: f64) -> Self {
        Self {
            lower: Some(lower),
            ..Default::default()
        }
    }

    /// `min <= attribute <= max`
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Default::default()
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.lower.is_none() && self.upper.is_none()
    }
}

fn format_date(date: NaiveDate) -> AttrValue {
    AttrValue::S(date.format(DATE_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_valid_range_construction() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        let range = DateRange::new(start, end).unwrap();

        assert_eq!(range.start, start);
        assert_eq!(range.end, end);
    }

    #[test]
    fn test_invalid_range_returns_error() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        assert_eq!(DateRange::new(start, end), Err(DateRangeError::InvalidRange));
    }

    #[test]
    fn test_date_bounds_widen_end_by_one_day() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 31).unwrap(),
        )
        .unwrap();

        let (start, end) = range.bounds();

        assert_eq!(start, AttrValue::from("2023-01-01"));
        assert_eq!(end, AttrValue::from("2023-02-01"));
    }

    #[test]
    fn test_date_bounds_cross_year() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        )
        .unwrap();
        let (_, end) = range.bounds();
        assert_eq!(end, AttrValue::from("2024-01-01"));
    }

    #[test]
    fn test_date_bounds_at_max_date_are_not_widened() {
        let range = DateRange::new(NaiveDate::MAX, NaiveDate::MAX).unwrap();
        let (start, end) = range.bounds();
        assert_eq!(start, end);
    }

    #[test]
    fn test_time_bounds_are_not_widened() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 17, 30, 0).unwrap();
        let range = TimeRange::new(start, end).unwrap();

        let (lo, hi) = range.bounds();

        assert_eq!(lo, AttrValue::from("2024-05-01T08:00:00+00:00"));
        assert_eq!(hi, AttrValue::from("2024-05-01T17:30:00+00:00"));
    }

    #[test]
    fn test_number_range_unbounded() {
        assert!(NumberRange::default().is_unbounded());
        assert!(!NumberRange::above(1.0).is_unbounded());
    }
}
