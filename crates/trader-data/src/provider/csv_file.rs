//! CSV 파일 기반 봉 데이터 제공자.
//!
//! 파일 위치: `<dir>/<종목코드>_<타임프레임>.csv` (예: `data/005930_1d.csv`)
//!
//! 형식:
//! ```text
//! timestamp,open,high,low,close,volume
//! 2024-01-02,78200,79800,78200,79600,17142847
//! 2024-01-03T00:00:00Z,78500,78800,77000,77000,21753644
//! ```
//!
//! `timestamp`는 RFC3339, `YYYY-MM-DD`(UTC 자정), 밀리초 유닉스 시간을 허용합니다.
//! 한 번 읽은 파일은 메모리에 캐시되어 최적화 루프에서 재사용됩니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};
use trader_core::{DateRange, Kline, Symbol, Timeframe};

use super::BarDataProvider;
use crate::error::{DataError, Result};

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
}

/// 디렉토리의 CSV 파일을 읽는 제공자.
#[derive(Debug)]
pub struct CsvBarProvider {
    dir: PathBuf,
    cache: RwLock<HashMap<PathBuf, Arc<Vec<Kline>>>>,
}

impl CsvBarProvider {
    /// 새 제공자를 생성합니다.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// 데이터 디렉토리.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 심볼·타임프레임에 해당하는 파일 경로.
    pub fn file_path(&self, symbol: &Symbol, timeframe: Timeframe) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", symbol.code(), timeframe.as_str()))
    }

    /// 파일 전체를 읽어 시간 오름차순 캔들로 반환합니다.
    pub fn load_file(
        path: &Path,
        symbol: &Symbol,
        timeframe: Timeframe,
    ) -> Result<Vec<Kline>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let tf_duration =
            Duration::from_std(timeframe.duration()).unwrap_or_else(|_| Duration::days(1));
        let mut klines = Vec::new();

        for (idx, result) in reader.deserialize::<CsvRow>().enumerate() {
            let row_no = idx + 1;
            let row = result?;

            let open_time = parse_timestamp(&row.timestamp).ok_or_else(|| DataError::Parse {
                row: row_no,
                message: format!("invalid timestamp '{}'", row.timestamp),
            })?;

            let field = |name: &str, value: &str| {
                Decimal::from_str(value).map_err(|e| DataError::Parse {
                    row: row_no,
                    message: format!("invalid {} '{}': {}", name, value, e),
                })
            };

            let kline = Kline::new(
                symbol.clone(),
                timeframe,
                open_time,
                field("open", &row.open)?,
                field("high", &row.high)?,
                field("low", &row.low)?,
                field("close", &row.close)?,
                field("volume", &row.volume)?,
                open_time + tf_duration,
            );

            if !kline.is_consistent() {
                return Err(DataError::InvalidData(format!(
                    "{} row {}: inconsistent OHLCV",
                    path.display(),
                    row_no
                )));
            }

            klines.push(kline);
        }

        klines.sort_by_key(|k| k.open_time);
        let before = klines.len();
        klines.dedup_by_key(|k| k.open_time);
        if klines.len() != before {
            warn!(
                path = %path.display(),
                dropped = before - klines.len(),
                "Duplicate timestamps dropped"
            );
        }

        Ok(klines)
    }

    fn cached_series(&self, symbol: &Symbol, timeframe: Timeframe) -> Result<Arc<Vec<Kline>>> {
        let path = self.file_path(symbol, timeframe);

        if let Ok(cache) = self.cache.read() {
            if let Some(series) = cache.get(&path) {
                return Ok(Arc::clone(series));
            }
        }

        let series = if path.exists() {
            let klines = Self::load_file(&path, symbol, timeframe)?;
            debug!(path = %path.display(), bars = klines.len(), "CSV loaded");
            Arc::new(klines)
        } else {
            warn!(path = %path.display(), "CSV file not found, treating as no data");
            Arc::new(Vec::new())
        };

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(path, Arc::clone(&series));
        }

        Ok(series)
    }
}

impl BarDataProvider for CsvBarProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn get_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        range: &DateRange,
    ) -> Result<Vec<Kline>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }

        let series = self.cached_series(symbol, timeframe)?;
        let start = range.start_datetime();
        let end = range.end_datetime();

        // 정렬되어 있으므로 이진 탐색으로 구간 경계를 찾는다
        let lo = series.partition_point(|k| k.open_time < start);
        let hi = series.partition_point(|k| k.open_time < end);

        Ok(series[lo..hi.max(lo)].to_vec())
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)
}
