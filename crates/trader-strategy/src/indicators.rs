//! 내장 전략이 사용하는 기술 지표.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trader_core::Kline;

/// 종가 목록을 추출합니다.
pub fn closes(window: &[Kline]) -> Vec<Decimal> {
    window.iter().map(|k| k.close).collect()
}

/// SMA (Simple Moving Average) 계산.
///
/// 마지막 `period`개 가격의 평균. 데이터 부족 시 None.
pub fn calculate_sma(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: Decimal = prices[prices.len() - period..].iter().sum();
    Some(sum / Decimal::from(period))
}

/// RSI (Relative Strength Index) 계산.
///
/// 첫 `period`개 변화량의 단순 평균 후 Wilder 평활. 하락이 전혀 없으면 100.
pub fn calculate_rsi(prices: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let mut gains = dec!(0);
    let mut losses = dec!(0);

    // 초기 평균 계산
    for i in 1..=period {
        let change = prices[i] - prices[i - 1];
        if change > dec!(0) {
            gains += change;
        } else {
            losses += change.abs();
        }
    }

    let n = Decimal::from(period);
    let n_1 = Decimal::from(period - 1);
    let mut avg_gain = gains / n;
    let mut avg_loss = losses / n;

    for i in (period + 1)..prices.len() {
        let change = prices[i] - prices[i - 1];
        let (gain, loss) = if change > dec!(0) {
            (change, dec!(0))
        } else {
            (dec!(0), change.abs())
        };
        avg_gain = (avg_gain * n_1 + gain) / n;
        avg_loss = (avg_loss * n_1 + loss) / n;
    }

    if avg_loss == dec!(0) {
        return Some(dec!(100));
    }

    let rs = avg_gain / avg_loss;
    Some(dec!(100) - (dec!(100) / (dec!(1) + rs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_sma() {
        let prices = vec![dec!(10), dec!(11), dec!(12), dec!(13), dec!(14)];
        assert_eq!(calculate_sma(&prices, 3), Some(dec!(13))); // (12 + 13 + 14) / 3
        assert_eq!(calculate_sma(&prices, 6), None);
        assert_eq!(calculate_sma(&prices, 0), None);
    }

    #[test]
    fn test_calculate_rsi_bounds() {
        let prices = vec![
            dec!(44.34),
            dec!(44.09),
            dec!(44.15),
            dec!(43.61),
            dec!(44.33),
            dec!(44.83),
            dec!(45.10),
            dec!(45.42),
            dec!(45.84),
            dec!(46.08),
            dec!(45.89),
            dec!(46.03),
            dec!(45.61),
            dec!(46.28),
            dec!(46.28),
        ];

        let rsi = calculate_rsi(&prices, 14).unwrap();
        assert!(rsi >= dec!(0) && rsi <= dec!(100));
        assert!(rsi > dec!(50)); // 상승 우위
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let prices: Vec<Decimal> = (0..20).map(Decimal::from).collect();
        assert_eq!(calculate_rsi(&prices, 14), Some(dec!(100)));
    }

    #[test]
    fn test_rsi_all_losses_is_0() {
        let prices: Vec<Decimal> = (0..20).rev().map(|i| Decimal::from(i + 1)).collect();
        assert_eq!(calculate_rsi(&prices, 14), Some(dec!(0)));
    }
}
