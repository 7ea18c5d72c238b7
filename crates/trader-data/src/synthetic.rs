//! 시드 기반 합성 캔들 생성.
//!
//! 테스트와 데모에서 재현 가능한 가격 경로가 필요할 때 사용합니다.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use trader_core::{Kline, Symbol, Timeframe};

/// 랜덤 워크 캔들을 생성합니다.
///
/// 같은 `seed`는 항상 같은 시퀀스를 만듭니다. 가격은 소수점 2자리로 반올림되며
/// 항상 양수로 유지됩니다.
pub fn generate_klines(
    symbol: &Symbol,
    timeframe: Timeframe,
    start: DateTime<Utc>,
    count: usize,
    start_price: Decimal,
    volatility: f64,
    seed: u64,
) -> Vec<Kline> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut klines = Vec::with_capacity(count);
    let tf_duration =
        Duration::from_std(timeframe.duration()).unwrap_or_else(|_| Duration::days(1));
    let floor = Decimal::new(1, 2);

    let mut current_price = start_price.round_dp(2).max(floor);
    let mut current_time = start;

    for _ in 0..count {
        let change_pct = (rng.gen::<f64>() - 0.5) * 2.0 * volatility;
        let change = current_price * Decimal::from_f64(change_pct).unwrap_or_default();

        let open = current_price;
        let close = (current_price + change).round_dp(2).max(floor);

        let wick = |rng: &mut StdRng| {
            open * Decimal::from_f64(rng.gen::<f64>() * volatility / 2.0).unwrap_or_default()
        };
        let high_extra = wick(&mut rng);
        let low_extra = wick(&mut rng);

        let high = (open.max(close) + high_extra).round_dp(2);
        let low = (open.min(close) - low_extra).round_dp(2).max(floor);

        let volume = Decimal::from(rng.gen_range(1_000u32..100_000u32));

        klines.push(Kline::new(
            symbol.clone(),
            timeframe,
            current_time,
            open,
            high,
            low.min(open.min(close)),
            close,
            volume,
            current_time + tf_duration,
        ));

        current_price = close;
        current_time += tf_duration;
    }

    klines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_same_seed_same_series() {
        let symbol = Symbol::kr_stock("005930");
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let a = generate_klines(&symbol, Timeframe::D1, start, 50, dec!(70000), 0.03, 42);
        let b = generate_klines(&symbol, Timeframe::D1, start, 50, dec!(70000), 0.03, 42);
        let c = generate_klines(&symbol, Timeframe::D1, start, 50, dec!(70000), 0.03, 43);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_generated_bars_are_consistent() {
        let symbol = Symbol::kr_stock("035720");
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let klines = generate_klines(&symbol, Timeframe::D1, start, 200, dec!(50), 0.1, 3);

        assert_eq!(klines.len(), 200);
        assert!(klines.iter().all(|k| k.is_consistent()));
        assert!(klines.windows(2).all(|w| w[1].open_time - w[0].open_time == Duration::days(1)));
    }
}
