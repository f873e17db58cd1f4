//! UCAT score validation and the derived dashboard statistics. Aggregates are
//! recomputed from the current records on every request and never stored.

use chrono::{Datelike, NaiveDate};

use portal_types::api::{PortfolioActivityInput, UcatMockInput};
use portal_types::models::UcatMock;

use crate::PortalError;

pub const SUBTEST_MIN: u16 = 300;
pub const SUBTEST_MAX: u16 = 900;
pub const TOTAL_MAX: u16 = 2700;

/// Checks subtest bounds and the SJT band, returning the total.
pub fn validate_mock(mock: &UcatMockInput) -> Result<u16, PortalError> {
    if mock.mock_name.trim().is_empty() {
        return Err(PortalError::validation("mock name is required"));
    }

    let subtests = [
        ("verbal reasoning", mock.verbal_reasoning),
        ("decision making", mock.decision_making),
        ("quantitative reasoning", mock.quantitative_reasoning),
    ];
    let out_of_range: Vec<&str> = subtests
        .iter()
        .filter(|(_, score)| !(SUBTEST_MIN..=SUBTEST_MAX).contains(score))
        .map(|(name, _)| *name)
        .collect();
    if !out_of_range.is_empty() {
        return Err(PortalError::validation(format!(
            "{} must be between {} and {}",
            out_of_range.join(", "),
            SUBTEST_MIN,
            SUBTEST_MAX
        )));
    }

    let total: u16 = subtests.iter().map(|(_, score)| score).sum();
    if total > TOTAL_MAX {
        return Err(PortalError::validation(format!("total score exceeds {}", TOTAL_MAX)));
    }

    if let Some(band) = mock.sjt_band {
        if !(1..=4).contains(&band) {
            return Err(PortalError::validation("SJT band must be between 1 and 4"));
        }
    }

    Ok(total)
}

pub fn validate_activity(activity: &PortfolioActivityInput) -> Result<(), PortalError> {
    if activity.title.trim().is_empty() {
        return Err(PortalError::validation("activity title is required"));
    }
    if activity.hours.is_some_and(|h| !h.is_finite() || h < 0.0) {
        return Err(PortalError::validation("hours must be a non-negative number"));
    }
    if let (Some(start), Some(end)) = (activity.start_date, activity.end_date) {
        if end < start {
            return Err(PortalError::validation("end date is before start date"));
        }
    }
    Ok(())
}

pub fn highest_total(mocks: &[UcatMock]) -> Option<u16> {
    mocks.iter().map(|m| m.total).max()
}

/// Mean total of the last `window` mocks, taking `mocks` in chronological order.
pub fn recent_average(mocks: &[UcatMock], window: usize) -> Option<f64> {
    if window == 0 || mocks.is_empty() {
        return None;
    }
    let recent = &mocks[mocks.len().saturating_sub(window)..];
    let sum: u32 = recent.iter().map(|m| u32::from(m.total)).sum();
    Some(f64::from(sum) / recent.len() as f64)
}

/// Percentage of the portfolio target reached, capped at 100.
pub fn portfolio_completeness(count: usize, target: usize) -> f64 {
    if target == 0 {
        return 100.0;
    }
    (count as f64 / target as f64 * 100.0).min(100.0)
}

/// Sorts by test date, falling back to the creation date for undated mocks.
pub fn chronological(mocks: &mut [UcatMock]) {
    mocks.sort_by_key(|m| (m.test_date.unwrap_or_else(|| m.created_at.date_naive()), m.created_at));
}

/// A fixed yearly date such as an application deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    /// 15 October, the early UCAS deadline for medicine, dentistry and veterinary courses.
    pub const EARLY_UCAS_DEADLINE: MonthDay = MonthDay { month: 10, day: 15 };

    /// Rejects impossible dates and 02-29.
    pub fn new(month: u32, day: u32) -> Result<Self, PortalError> {
        // 2025 is not a leap year.
        NaiveDate::from_ymd_opt(2025, month, day)
            .map(|_| Self { month, day })
            .ok_or_else(|| PortalError::validation(format!("invalid month/day {:02}-{:02}", month, day)))
    }

    pub fn in_year(&self, year: i32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
    }
}

impl std::str::FromStr for MonthDay {
    type Err = PortalError;

    /// Parses `MM-DD`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (month, day) = s
            .split_once('-')
            .ok_or_else(|| PortalError::validation(format!("expected MM-DD, got '{}'", s)))?;
        let month = month
            .trim()
            .parse()
            .map_err(|_| PortalError::validation(format!("bad month in '{}'", s)))?;
        let day = day
            .trim()
            .parse()
            .map_err(|_| PortalError::validation(format!("bad day in '{}'", s)))?;
        Self::new(month, day)
    }
}

/// Calendar days from `today` to the next occurrence of `deadline`; zero on
/// the day itself, rolling to next year once passed.
pub fn days_until(today: NaiveDate, deadline: MonthDay) -> i64 {
    let this_year = deadline.in_year(today.year());
    let next = match this_year {
        Some(date) if date >= today => Some(date),
        _ => deadline.in_year(today.year() + 1),
    };
    next.map(|date| (date - today).num_days()).unwrap_or(0)
}
