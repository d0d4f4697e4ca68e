//! Date Windows
//!
//! The inclusive calendar range a refresh measures returns over, and the
//! lenient request parameters it is derived from.
//!
//! # Resolution
//!
//! - Explicit year and month: the window starts at `year-month-(day or 1)`
//!   and ends one month later minus one day.
//! - Anything else: the previous calendar month, first through last day.
//!
//! Out-of-range or non-numeric parameters are dropped, never rejected.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

// =============================================================================
// Date Window
// =============================================================================

/// Inclusive `[start, end]` date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Create a window from explicit bounds.
    ///
    /// # Errors
    ///
    /// Returns error if `end` is before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if end < start {
            return Err(DomainError::InvalidValue {
                field: "window".to_string(),
                message: format!("end {end} is before start {start}"),
            });
        }
        Ok(Self { start, end })
    }

    /// Window starting at `year-month-day` and spanning one month.
    ///
    /// A day past the end of the month is clamped to the month's last day.
    /// Returns `None` when the date cannot be represented.
    #[must_use]
    pub fn starting_at(year: i32, month: u32, day: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let last = last_day_of_month(first)?;
        let start = first.with_day(day.clamp(1, last.day()))?;
        let end = start
            .checked_add_months(Months::new(1))?
            .checked_sub_days(Days::new(1))?;
        Some(Self { start, end: end.max(start) })
    }

    /// The calendar month before the one containing `today`.
    #[must_use]
    pub fn previous_month(today: NaiveDate) -> Self {
        let end = today
            .with_day(1)
            .and_then(|first| first.pred_opt())
            .unwrap_or(today);
        let start = end.with_day(1).unwrap_or(end);
        Self { start, end }
    }

    /// First day of the window.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the window (inclusive).
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `date` falls inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

fn last_day_of_month(first: NaiveDate) -> Option<NaiveDate> {
    first.checked_add_months(Months::new(1))?.pred_opt()
}

// =============================================================================
// Refresh Parameters
// =============================================================================

/// Optional window selectors supplied with a refresh request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshParams {
    /// Year, kept only when positive.
    pub year: Option<i32>,
    /// Month, kept only when in `1..=12`.
    pub month: Option<u32>,
    /// Day, kept only when in `1..=31`.
    pub day: Option<u32>,
}

impl RefreshParams {
    /// Build parameters from raw query strings, dropping anything invalid.
    #[must_use]
    pub fn from_raw(year: Option<&str>, month: Option<&str>, day: Option<&str>) -> Self {
        Self {
            year: year
                .and_then(|v| v.trim().parse::<i32>().ok())
                .filter(|y| *y > 0),
            month: month
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|m| (1..=12).contains(m)),
            day: day
                .and_then(|v| v.trim().parse::<u32>().ok())
                .filter(|d| (1..=31).contains(d)),
        }
    }

    /// Resolve the window these parameters select, relative to `today`.
    #[must_use]
    pub fn resolve(&self, today: NaiveDate) -> DateWindow {
        match (self.year, self.month) {
            (Some(year), Some(month)) => {
                DateWindow::starting_at(year, month, self.day.unwrap_or(1))
                    .unwrap_or_else(|| DateWindow::previous_month(today))
            }
            _ => DateWindow::previous_month(today),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn explicit_leap_february() {
        let params = RefreshParams {
            year: Some(2024),
            month: Some(2),
            day: Some(1),
        };
        let window = params.resolve(date(2025, 6, 15));
        assert_eq!(window.start(), date(2024, 2, 1));
        assert_eq!(window.end(), date(2024, 2, 29));
    }

    #[test]
    fn explicit_month_without_day_starts_on_first() {
        let params = RefreshParams {
            year: Some(2023),
            month: Some(4),
            day: None,
        };
        let window = params.resolve(date(2025, 1, 1));
        assert_eq!(window.start(), date(2023, 4, 1));
        assert_eq!(window.end(), date(2023, 4, 30));
    }

    #[test]
    fn mid_month_start_spans_one_month() {
        let window = DateWindow::starting_at(2024, 3, 15).unwrap();
        assert_eq!(window.start(), date(2024, 3, 15));
        assert_eq!(window.end(), date(2024, 4, 14));
    }

    #[test]
    fn day_past_month_end_is_clamped() {
        let window = DateWindow::starting_at(2023, 2, 31).unwrap();
        assert_eq!(window.start(), date(2023, 2, 28));
        assert_eq!(window.end(), date(2023, 3, 27));
    }

    #[test]
    fn default_is_previous_calendar_month() {
        let window = RefreshParams::default().resolve(date(2024, 3, 18));
        assert_eq!(window.start(), date(2024, 2, 1));
        assert_eq!(window.end(), date(2024, 2, 29));
    }

    #[test]
    fn default_in_january_wraps_year() {
        let window = DateWindow::previous_month(date(2025, 1, 5));
        assert_eq!(window.start(), date(2024, 12, 1));
        assert_eq!(window.end(), date(2024, 12, 31));
    }

    #[test]
    fn year_without_month_uses_default() {
        let params = RefreshParams {
            year: Some(2020),
            month: None,
            day: None,
        };
        assert_eq!(
            params.resolve(date(2024, 7, 2)),
            DateWindow::previous_month(date(2024, 7, 2))
        );
    }

    #[test_case(Some("2024"), Some("2"), Some("1"), Some(2024), Some(2), Some(1) ; "all valid")]
    #[test_case(Some("0"), Some("2"), None, None, Some(2), None ; "zero year dropped")]
    #[test_case(Some("-5"), None, None, None, None, None ; "negative year dropped")]
    #[test_case(Some("2024"), Some("13"), None, Some(2024), None, None ; "month above range dropped")]
    #[test_case(Some("2024"), Some("0"), None, Some(2024), None, None ; "month zero dropped")]
    #[test_case(None, Some("6"), Some("32"), None, Some(6), None ; "day above range dropped")]
    #[test_case(Some("abc"), Some("x"), Some(""), None, None, None ; "non numeric dropped")]
    #[test_case(Some(" 2021 "), Some(" 7"), None, Some(2021), Some(7), None ; "whitespace tolerated")]
    fn lenient_parsing(
        year: Option<&str>,
        month: Option<&str>,
        day: Option<&str>,
        want_year: Option<i32>,
        want_month: Option<u32>,
        want_day: Option<u32>,
    ) {
        let params = RefreshParams::from_raw(year, month, day);
        assert_eq!(params.year, want_year);
        assert_eq!(params.month, want_month);
        assert_eq!(params.day, want_day);
    }

    #[test]
    fn unrepresentable_year_falls_back_to_default() {
        let params = RefreshParams {
            year: Some(i32::MAX),
            month: Some(1),
            day: None,
        };
        let today = date(2024, 5, 10);
        assert_eq!(params.resolve(today), DateWindow::previous_month(today));
    }

    #[test]
    fn new_rejects_inverted_bounds() {
        assert!(DateWindow::new(date(2024, 2, 2), date(2024, 2, 1)).is_err());
        assert!(DateWindow::new(date(2024, 2, 1), date(2024, 2, 1)).is_ok());
    }

    #[test]
    fn contains_is_inclusive() {
        let window = DateWindow::starting_at(2024, 2, 1).unwrap();
        assert!(window.contains(date(2024, 2, 1)));
        assert!(window.contains(date(2024, 2, 29)));
        assert!(!window.contains(date(2024, 3, 1)));
    }

    #[test]
    fn display_format() {
        let window = DateWindow::starting_at(2024, 2, 1).unwrap();
        assert_eq!(window.to_string(), "2024-02-01 to 2024-02-29");
    }
}
