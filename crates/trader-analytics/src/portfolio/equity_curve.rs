//! 자산 곡선 합성.
//!
//! 심볼별로 따로 실행한 자산 곡선을 하나의 포트폴리오 곡선으로 합칩니다.
//! 모든 곡선의 타임스탬프 합집합 위에서, 값이 없는 시점은 직전 값으로 채웁니다 (forward fill).
//! 첫 점 이전 시점에는 그 곡선의 초기 자본을 씁니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::backtest::EquityPoint;

/// 합성 대상 곡선 하나.
#[derive(Debug, Clone, Copy)]
pub struct CurveInput<'a> {
    /// 곡선 시작 전 값 (배분 자본)
    pub initial: Decimal,
    /// 시간순 자산 곡선
    pub points: &'a [EquityPoint],
}

/// 여러 자산 곡선을 타임스탬프 합집합 위에서 합산합니다.
///
/// 같은 곡선 안에서 같은 시각의 점이 여러 개면 마지막 값을 씁니다.
pub fn merge_equity_curves(curves: &[CurveInput<'_>]) -> Vec<EquityPoint> {
    let mut timestamps: Vec<DateTime<Utc>> = curves
        .iter()
        .flat_map(|c| c.points.iter().map(|p| p.timestamp))
        .collect();
    timestamps.sort();
    timestamps.dedup();

    let mut cursors = vec![0usize; curves.len()];
    let mut last: Vec<Decimal> = curves.iter().map(|c| c.initial).collect();

    timestamps
        .into_iter()
        .map(|ts| {
            for (i, curve) in curves.iter().enumerate() {
                while let Some(point) = curve.points.get(cursors[i]) {
                    if point.timestamp > ts {
                        break;
                    }
                    last[i] = point.equity;
                    cursors[i] += 1;
                }
            }
            EquityPoint {
                timestamp: ts,
                equity: last.iter().copied().sum(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn point(day: i64, equity: Decimal) -> EquityPoint {
        EquityPoint {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day),
            equity,
        }
    }

    #[test]
    fn test_merge_forward_fills() {
        let a = vec![point(0, dec!(100)), point(1, dec!(110)), point(3, dec!(120))];
        let b = vec![point(1, dec!(50)), point(2, dec!(55))];

        let merged = merge_equity_curves(&[
            CurveInput {
                initial: dec!(100),
                points: &a,
            },
            CurveInput {
                initial: dec!(50),
                points: &b,
            },
        ]);

        let values: Vec<Decimal> = merged.iter().map(|p| p.equity).collect();
        // day0: 100 + 50(초기), day1: 110 + 50, day2: 110 + 55, day3: 120 + 55
        assert_eq!(values, vec![dec!(150), dec!(160), dec!(165), dec!(175)]);
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_equity_curves(&[]).is_empty());
    }
}
