//! 메모리 기반 봉 데이터 제공자.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use trader_core::{DateRange, Kline, Symbol, Timeframe};

use super::BarDataProvider;
use crate::error::Result;

/// 심볼·타임프레임별로 캔들을 보관하는 제공자.
///
/// 같은 `open_time`의 캔들을 다시 적재하면 덮어씁니다.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBarProvider {
    /// 타임스탬프 순서 접근을 위한 BTreeMap
    data: HashMap<(Symbol, Timeframe), BTreeMap<DateTime<Utc>, Kline>>,
}

impl InMemoryBarProvider {
    /// 빈 제공자를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 캔들을 적재합니다. 캔들의 `symbol`/`timeframe` 필드로 분류됩니다.
    pub fn insert(&mut self, klines: impl IntoIterator<Item = Kline>) {
        for kline in klines {
            self.data
                .entry((kline.symbol.clone(), kline.timeframe))
                .or_default()
                .insert(kline.open_time, kline);
        }
    }

    /// 빌더 형태의 적재.
    pub fn with_klines(mut self, klines: impl IntoIterator<Item = Kline>) -> Self {
        self.insert(klines);
        self
    }

    /// 적재된 캔들 수.
    pub fn len(&self, symbol: &Symbol, timeframe: Timeframe) -> usize {
        self.data
            .get(&(symbol.clone(), timeframe))
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// 적재된 심볼 목록.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.data.keys().map(|(s, _)| s.clone()).collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

impl BarDataProvider for InMemoryBarProvider {
    fn name(&self) -> &str {
        "memory"
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

        let Some(series) = self.data.get(&(symbol.clone(), timeframe)) else {
            return Ok(Vec::new());
        };

        Ok(series
            .range(range.start_datetime()..range.end_datetime())
            .map(|(_, k)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::generate_klines;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_range_filter_is_half_open() {
        let symbol = Symbol::kr_stock("005930");
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let klines = generate_klines(&symbol, Timeframe::D1, start, 10, dec!(70000), 0.02, 1);
        let provider = InMemoryBarProvider::new().with_klines(klines);

        let bars = provider
            .get_bars(
                &symbol,
                Timeframe::D1,
                &DateRange::new(date(2024, 1, 3), date(2024, 1, 6)),
            )
            .unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].open_time.date_naive(), date(2024, 1, 3));
        assert_eq!(bars[2].open_time.date_naive(), date(2024, 1, 5));
    }

    #[test]
    fn test_missing_symbol_is_empty_not_error() {
        let provider = InMemoryBarProvider::new();
        let bars = provider
            .get_bars(
                &Symbol::kr_stock("000660"),
                Timeframe::D1,
                &DateRange::new(date(2024, 1, 1), date(2024, 2, 1)),
            )
            .unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn test_insert_keeps_ascending_order() {
        let symbol = Symbol::kr_stock("005930");
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut klines = generate_klines(&symbol, Timeframe::D1, start, 5, dec!(100), 0.01, 7);
        klines.reverse();

        let provider = InMemoryBarProvider::new().with_klines(klines);
        let bars = provider
            .get_bars(
                &symbol,
                Timeframe::D1,
                &DateRange::new(date(2024, 1, 1), date(2024, 2, 1)),
            )
            .unwrap();

        assert_eq!(provider.len(&symbol, Timeframe::D1), 5);
        assert!(bars.windows(2).all(|w| w[0].open_time < w[1].open_time));
    }
}
