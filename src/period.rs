//! Time coverage of a simulation, derived from per-file period tokens.
//!
//! A period token is the start and end date of one file written back to back
//! (`200601210012`, `19500101-20051231`, `1850-2014`). Both halves have the
//! same width; a `-` between them is tolerated.

use std::fmt;

use chrono::{Datelike, Months, NaiveDate};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeriodInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodInterval {
    pub fn parse(token: &str) -> Option<Self> {
        let digits: String = token.chars().filter(|c| *c != '-').collect();
        if digits.is_empty() || digits.len() % 2 != 0 || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }

        let (start, end) = digits.split_at(digits.len() / 2);
        let start = parse_date(start, Bound::Start)?;
        let end = parse_date(end, Bound::End)?;

        (start <= end).then_some(PeriodInterval { start, end })
    }
}

impl fmt::Display for PeriodInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_date(self.start), format_date(self.end))
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn parse_date(s: &str, bound: Bound) -> Option<NaiveDate> {
    let year: i32 = s.get(0..4)?.parse().ok()?;
    match s.len() {
        4 => match bound {
            Bound::Start => NaiveDate::from_ymd_opt(year, 1, 1),
            Bound::End => NaiveDate::from_ymd_opt(year, 12, 31),
        },
        6 => {
            let month: u32 = s[4..6].parse().ok()?;
            let first = NaiveDate::from_ymd_opt(year, month, 1)?;
            match bound {
                Bound::Start => Some(first),
                Bound::End => first.checked_add_months(Months::new(1))?.pred_opt(),
            }
        }
        // sub-daily tokens carry hours and minutes we do not need
        8 | 10 | 12 | 14 => NaiveDate::parse_from_str(&s[0..8], "%Y%m%d").ok(),
        _ => None,
    }
}

/// Formats a date the way period tokens and exports spell it.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Nominal reporting frequency, used to decide what "the next step" is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    SubDaily,
    Daily,
    Monthly,
    Yearly,
    Fixed,
}

impl Frequency {
    /// Maps a `time_frequency`/`frequency` facet value. Unknown values are daily.
    pub fn from_facet(value: &str) -> Self {
        match value {
            "fx" => Frequency::Fixed,
            "yr" | "yrPt" | "dec" => Frequency::Yearly,
            v if v.starts_with("mon") => Frequency::Monthly,
            v if v.contains("hr") => Frequency::SubDaily,
            _ => Frequency::Daily,
        }
    }

    fn follows(&self, prev_end: NaiveDate, next_start: NaiveDate) -> bool {
        match self {
            Frequency::Yearly => next_start.year() == prev_end.year() + 1,
            Frequency::Monthly => {
                let expected = prev_end
                    .with_day(1)
                    .and_then(|d| d.checked_add_months(Months::new(1)));
                expected.is_some_and(|e| {
                    e.year() == next_start.year() && e.month() == next_start.month()
                })
            }
            Frequency::SubDaily | Frequency::Daily | Frequency::Fixed => {
                prev_end.succ_opt() == Some(next_start)
            }
        }
    }
}

/// Converts raw period tokens, skipping missing ones, sorted by start date.
pub fn convert<S: AsRef<str>>(tokens: &[Option<S>]) -> Vec<PeriodInterval> {
    let mut intervals: Vec<PeriodInterval> = tokens
        .iter()
        .flatten()
        .filter_map(|token| {
            let token = token.as_ref();
            let interval = PeriodInterval::parse(token);
            if interval.is_none() {
                warn!(token, "skipping unparseable period token");
            }
            interval
        })
        .collect();
    intervals.sort_by_key(|i| i.start);

    intervals
}

/// Earliest start and latest end across all intervals.
pub fn get_range(intervals: &[PeriodInterval]) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let first = intervals.iter().map(|i| i.start).min();
    let last = intervals.iter().map(|i| i.end).max();

    (first, last)
}

/// True if the intervals form one unbroken axis from `first` to `last`.
pub fn time_axis(
    intervals: &[PeriodInterval],
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
    frequency: Frequency,
) -> bool {
    let mut sorted = intervals.to_vec();
    sorted.sort_by_key(|i| i.start);

    let (Some(head), Some(tail)) = (sorted.first(), sorted.last()) else {
        return false;
    };
    if Some(head.start) != first || Some(tail.end) != last {
        return false;
    }

    sorted
        .windows(2)
        .all(|pair| frequency.follows(pair[0].end, pair[1].start))
}

// -- Tests -------------------------------------------------------------------
