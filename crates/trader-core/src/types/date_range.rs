//! 날짜 구간.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 반개구간 `[start, end)` 날짜 범위.
///
/// `end`는 포함되지 않습니다. 시각 비교는 UTC 자정 기준입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// 시작일 (포함)
    pub start: NaiveDate,
    /// 종료일 (미포함)
    pub end: NaiveDate,
}

impl DateRange {
    /// 새 날짜 구간을 생성합니다.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// 시작일과 일수로 구간을 생성합니다.
    pub fn from_days(start: NaiveDate, days: i64) -> Self {
        Self {
            start,
            end: start + Duration::days(days),
        }
    }

    /// 구간이 비어 있는지 확인합니다 (`end <= start`).
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// 구간의 일수. 비어 있으면 0.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days().max(0)
    }

    /// 시작 시각 (UTC 자정).
    pub fn start_datetime(&self) -> DateTime<Utc> {
        self.start.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// 종료 시각 (UTC 자정, 미포함).
    pub fn end_datetime(&self) -> DateTime<Utc> {
        self.end.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// 주어진 시각이 구간에 포함되는지 확인합니다.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start_datetime() && ts < self.end_datetime()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
