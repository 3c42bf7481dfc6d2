//! Date tokens, date ranges and day iteration.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{DateRangeError, Frequency};

/// The date component of an archive name.
///
/// Daily archives carry `YYYY-MM-DD`, monthly archives carry `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DateToken {
    /// A single calendar day.
    Day(NaiveDate),
    /// A calendar month.
    Month {
        /// Year.
        year: i32,
        /// Month of the year, 1-based.
        month: u32,
    },
}

impl DateToken {
    /// Creates a month token, returning None for an out-of-range month.
    #[must_use]
    pub fn month(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self::Month { year, month })
    }

    /// Returns the month token containing the given day.
    #[must_use]
    pub fn month_of(date: NaiveDate) -> Self {
        Self::Month {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parses `YYYY-MM-DD` or `YYYY-MM`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.len() {
            10 => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Self::Day),
            7 => {
                let (year, month) = s.split_once('-')?;
                if year.len() != 4 || month.len() != 2 {
                    return None;
                }
                Self::month(year.parse().ok()?, month.parse().ok()?)
            }
            _ => None,
        }
    }

    /// Returns the frequency whose archives carry this token granularity.
    #[must_use]
    pub const fn frequency(&self) -> Frequency {
        match self {
            Self::Day(_) => Frequency::Daily,
            Self::Month { .. } => Frequency::Monthly,
        }
    }

    /// Returns the first day covered by this token.
    #[must_use]
    pub fn first_day(&self) -> NaiveDate {
        match *self {
            Self::Day(date) => date,
            Self::Month { year, month } => {
                NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
            }
        }
    }

    /// Returns the last day covered by this token.
    #[must_use]
    pub fn last_day(&self) -> NaiveDate {
        match *self {
            Self::Day(date) => date,
            Self::Month { .. } => self
                .first_day()
                .checked_add_months(Months::new(1))
                .and_then(|next| next.pred_opt())
                .unwrap_or(NaiveDate::MAX),
        }
    }

    /// Returns true if the token covers the given day.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first_day() && date <= self.last_day()
    }
}

impl Ord for DateToken {
    fn cmp(&self, other: &Self) -> Ordering {
        self.first_day()
            .cmp(&other.first_day())
            .then_with(|| self.last_day().cmp(&other.last_day()))
    }
}

impl PartialOrd for DateToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for DateToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Month { year, month } => write!(f, "{year:04}-{month:02}"),
        }
    }
}

impl From<DateToken> for String {
    fn from(token: DateToken) -> Self {
        token.to_string()
    }
}

impl TryFrom<String> for DateToken {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid date token '{value}'"))
    }
}

/// A range of dates for data retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// Start date (inclusive).
    pub start: NaiveDate,
    /// End date (inclusive).
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new date range, validating that start <= end.
    ///
    /// # Errors
    ///
    /// Returns an error if start > end.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Creates a date range for a single day.
    #[must_use]
    pub const fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Returns an iterator over all days in the range.
    pub const fn days(&self) -> DayIterator {
        DayIterator {
            current: Some(self.start),
            end: self.end,
        }
    }

    /// Returns the month tokens touched by the range, in order.
    #[must_use]
    pub fn months(&self) -> Vec<DateToken> {
        let mut months = Vec::new();
        let mut current = DateToken::month_of(self.start);
        let last = DateToken::month_of(self.end);
        while current <= last {
            months.push(current);
            match current.first_day().checked_add_months(Months::new(1)) {
                Some(next) => current = DateToken::month_of(next),
                None => break,
            }
        }
        months
    }

    /// Returns the date tokens of the given frequency covering the range.
    #[must_use]
    pub fn tokens(&self, frequency: Frequency) -> Vec<DateToken> {
        match frequency {
            Frequency::Daily => self.days().map(DateToken::Day).collect(),
            Frequency::Monthly => self.months(),
        }
    }

    /// Returns the total number of days in the range.
    #[must_use]
    pub fn total_days(&self) -> usize {
        ((self.end - self.start).num_days() + 1) as usize
    }

    /// Returns true if the range contains the given date.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Returns true if any day covered by the token falls inside the range.
    #[must_use]
    pub fn overlaps(&self, token: &DateToken) -> bool {
        token.first_day() <= self.end && token.last_day() >= self.start
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Iterator over all days in a date range.
#[derive(Debug, Clone)]
pub struct DayIterator {
    current: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DayIterator {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.filter(|day| *day <= self.end)?;
        self.current = current.succ_opt();
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.current {
            Some(day) if day <= self.end => (self.end - day).num_days() as usize + 1,
            _ => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DayIterator {}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_new() {
        let range = DateRange::new(day(2024, 1, 1), day(2024, 1, 31)).unwrap();
        assert_eq!(range.start, day(2024, 1, 1));
        assert_eq!(range.end, day(2024, 1, 31));
        assert_eq!(range.total_days(), 31);
    }

    #[test]
    fn test_date_range_invalid() {
        assert!(DateRange::new(day(2024, 1, 31), day(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_day_iterator() {
        let range = DateRange::new(day(2024, 2, 27), day(2024, 3, 1)).unwrap();
        let days: Vec<_> = range.days().collect();

        assert_eq!(range.days().len(), 4);
        assert_eq!(days.len(), 4);
        assert_eq!(days[2], day(2024, 2, 29));
        assert_eq!(days[3], day(2024, 3, 1));
    }

    #[test]
    fn test_months_span_year() {
        let range = DateRange::new(day(2023, 11, 15), day(2024, 2, 3)).unwrap();
        let months: Vec<String> = range.months().iter().map(ToString::to_string).collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn test_token_parse_and_display() {
        let daily = DateToken::parse("2023-01-02").unwrap();
        assert_eq!(daily, DateToken::Day(day(2023, 1, 2)));
        assert_eq!(daily.to_string(), "2023-01-02");
        assert_eq!(daily.frequency(), Frequency::Daily);

        let monthly = DateToken::parse("2023-02").unwrap();
        assert_eq!(monthly.to_string(), "2023-02");
        assert_eq!(monthly.frequency(), Frequency::Monthly);
        assert_eq!(monthly.last_day(), day(2023, 2, 28));

        assert!(DateToken::parse("2023-13").is_none());
        assert!(DateToken::parse("2023-1-2").is_none());
        assert!(DateToken::parse("latest").is_none());
    }

    #[test]
    fn test_token_ordering() {
        let mut tokens = vec![
            DateToken::parse("2023-01-03").unwrap(),
            DateToken::parse("2022-12-31").unwrap(),
            DateToken::parse("2023-01-01").unwrap(),
        ];
        tokens.sort();
        let rendered: Vec<_> = tokens.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["2022-12-31", "2023-01-01", "2023-01-03"]);
    }

    #[test]
    fn test_overlaps() {
        let range = DateRange::new(day(2023, 1, 20), day(2023, 2, 5)).unwrap();
        assert!(range.overlaps(&DateToken::parse("2023-01").unwrap()));
        assert!(range.overlaps(&DateToken::parse("2023-02").unwrap()));
        assert!(!range.overlaps(&DateToken::parse("2023-03").unwrap()));
        assert!(!range.overlaps(&DateToken::parse("2023-01-19").unwrap()));
    }
}
