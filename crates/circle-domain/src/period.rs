//! Period keys and the series shapes produced by the period aggregator.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bucketing granularity for period series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    /// Maps a calendar date to its bucket key: `YYYY-MM-DD` for days, the Monday of the
    /// ISO week for weeks, and `YYYY-MM` for months.
    pub fn bucket_key(self, date: NaiveDate) -> String {
        match self {
            Granularity::Daily => date.format("%Y-%m-%d").to_string(),
            Granularity::Weekly => week_start(date).format("%Y-%m-%d").to_string(),
            Granularity::Monthly => YearMonth::from_date(date).to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
        };
        f.write_str(label)
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(Granularity::Daily),
            "weekly" | "week" | "w" => Ok(Granularity::Weekly),
            "monthly" | "month" | "m" => Ok(Granularity::Monthly),
            other => Err(format!("unknown granularity `{other}`")),
        }
    }
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let delta = date.weekday().num_days_from_monday() as i64;
    date - Duration::days(delta)
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (year, month) = trimmed
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got `{trimmed}`"))?;
        let year = year
            .parse::<i32>()
            .map_err(|err| format!("invalid year in `{trimmed}`: {err}"))?;
        let month = month
            .parse::<u32>()
            .map_err(|err| format!("invalid month in `{trimmed}`: {err}"))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month out of range in `{trimmed}`"))
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

/// One value of a single-series period chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodPoint {
    pub bucket_key: String,
    pub value: i64,
}

/// Debit total for one tag within one bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagPoint {
    pub bucket_key: String,
    pub tag: String,
    pub value: i64,
}

/// One bucket of a multi-series chart: `{bucketKey, <series>: value, ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MultiSeriesPoint {
    pub bucket_key: String,
    #[serde(flatten)]
    pub series: BTreeMap<String, i64>,
}

/// Output of the period aggregator, shaped by the aggregation mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PeriodSeries {
    Balance(Vec<PeriodPoint>),
    TagExpense(Vec<TagPoint>),
}

impl PeriodSeries {
    pub fn len(&self) -> usize {
        match self {
            PeriodSeries::Balance(points) => points.len(),
            PeriodSeries::TagExpense(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Write-time cache of a circle's debit totals for one month.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlyAggregate {
    pub circle_id: Uuid,
    pub month: YearMonth,
    pub total_debits: i64,
    pub debit_count: u64,
}

impl MonthlyAggregate {
    pub fn empty(circle_id: Uuid, month: YearMonth) -> Self {
        Self {
            circle_id,
            month,
            total_debits: 0,
            debit_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.debit_count == 0 && self.total_debits == 0
    }
}
