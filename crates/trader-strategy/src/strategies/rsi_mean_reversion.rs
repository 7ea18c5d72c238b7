//! RSI 평균 회귀 전략.
//!
//! RSI가 과매도선을 하향 돌파하면 매수, 과매수선을 상향 돌파하면 매도합니다.
//!
//! Wilder 평활은 시작점에 따라 값이 달라지므로 RSI는 항상 윈도우 끝의
//! 고정 길이(`period × 5 + 1`) 구간에서 계산합니다. 결과는 최근 봉에만 의존합니다.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use trader_core::Kline;

use crate::error::{StrategyError, StrategyResult};
use crate::indicators::{calculate_rsi, closes};
use crate::params::{ParamSpec, StrategyParams};
use crate::traits::{Decision, Strategy};

/// RSI 계산 구간 배수.
const LOOKBACK_MULTIPLIER: usize = 5;

/// RSI 평균 회귀 전략.
#[derive(Debug, Default, Clone, Copy)]
pub struct RsiMeanReversionStrategy;

struct RsiParams {
    period: usize,
    oversold: Decimal,
    overbought: Decimal,
}

impl RsiMeanReversionStrategy {
    /// 새 RSI 전략 생성.
    pub fn new() -> Self {
        Self
    }

    fn read(params: &StrategyParams) -> StrategyResult<RsiParams> {
        let level = |name: &str| -> StrategyResult<Decimal> {
            let v = params.get_float(name)?;
            Decimal::from_f64(v).ok_or_else(|| StrategyError::invalid(name, "표현할 수 없는 값"))
        };
        Ok(RsiParams {
            period: params.get_usize("period")?,
            oversold: level("oversold")?,
            overbought: level("overbought")?,
        })
    }

    fn rsi_at_end(prices: &[Decimal], period: usize) -> Option<Decimal> {
        let lookback = (period * LOOKBACK_MULTIPLIER + 1).min(prices.len());
        calculate_rsi(&prices[prices.len() - lookback..], period)
    }
}

impl Strategy for RsiMeanReversionStrategy {
    fn id(&self) -> &str {
        "rsi_mean_reversion"
    }

    fn name(&self) -> &str {
        "RSI 평균 회귀"
    }

    fn description(&self) -> &str {
        "RSI 과매도 진입 시 매수, 과매수 진입 시 매도."
    }

    fn schema(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("period", 14, 2, 100, "RSI 기간"),
            ParamSpec::float("oversold", 30.0, 0.0, 100.0, "과매도 기준"),
            ParamSpec::float("overbought", 70.0, 0.0, 100.0, "과매수 기준"),
        ]
    }

    fn min_bars(&self, params: &StrategyParams) -> usize {
        // 현재 RSI와 직전 RSI 모두 계산 가능해야 함
        params
            .get_usize("period")
            .map(|p| p + 2)
            .unwrap_or(usize::MAX)
    }

    fn validate(&self, params: &StrategyParams) -> StrategyResult<()> {
        let p = Self::read(params)?;
        if p.oversold >= p.overbought {
            return Err(StrategyError::invalid(
                "oversold",
                format!(
                    "과매도({})는 과매수({})보다 작아야 합니다",
                    p.oversold, p.overbought
                ),
            ));
        }
        Ok(())
    }

    fn evaluate(&self, window: &[Kline], params: &StrategyParams) -> StrategyResult<Decision> {
        let p = Self::read(params)?;
        if window.len() < p.period + 2 {
            return Ok(Decision::hold());
        }

        let prices = closes(window);
        let (Some(current), Some(previous)) = (
            Self::rsi_at_end(&prices, p.period),
            Self::rsi_at_end(&prices[..prices.len() - 1], p.period),
        ) else {
            return Ok(Decision::hold());
        };

        if previous >= p.oversold && current < p.oversold {
            return Ok(Decision::buy());
        }
        if previous <= p.overbought && current > p.overbought {
            return Ok(Decision::sell());
        }

        Ok(Decision::hold())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::SignalAction;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;
    use trader_core::{Symbol, Timeframe};

    fn klines_from_closes(closes: &[i64]) -> Vec<Kline> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let t = start + Duration::days(i as i64);
                let p = Decimal::from(c);
                Kline::new(
                    Symbol::kr_stock("005930"),
                    Timeframe::D1,
                    t,
                    p,
                    p,
                    p,
                    p,
                    Decimal::from(1000),
                    t + Duration::days(1),
                )
            })
            .collect()
    }

    fn default_params() -> StrategyParams {
        RsiMeanReversionStrategy
            .resolve_params(&BTreeMap::new())
            .unwrap()
    }

    #[test]
    fn test_sell_when_crossing_overbought() {
        // 등락 반복 후 연속 상승으로 RSI가 70을 넘는 순간
        let mut closes = vec![100, 102, 100, 102, 100, 102, 100, 102, 100, 102, 100, 102, 100, 102, 100];
        let params = default_params();
        let mut action = SignalAction::Hold;
        let mut price = 100;
        for _ in 0..10 {
            price += 2;
            closes.push(price);
            let window = klines_from_closes(&closes);
            action = RsiMeanReversionStrategy.evaluate(&window, &params).unwrap().action;
            if action != SignalAction::Hold {
                break;
            }
        }
        assert_eq!(action, SignalAction::Sell);
    }

    #[test]
    fn test_buy_when_crossing_oversold() {
        let mut closes = vec![100, 102, 100, 102, 100, 102, 100, 102, 100, 102, 100, 102, 100, 102, 100];
        let params = default_params();
        let mut action = SignalAction::Hold;
        let mut price = 100;
        for _ in 0..10 {
            price -= 2;
            closes.push(price);
            let window = klines_from_closes(&closes);
            action = RsiMeanReversionStrategy.evaluate(&window, &params).unwrap().action;
            if action != SignalAction::Hold {
                break;
            }
        }
        assert_eq!(action, SignalAction::Buy);
    }

    #[test]
    fn test_min_bars_and_validation() {
        assert_eq!(RsiMeanReversionStrategy.min_bars(&default_params()), 16);

        let mut overrides = BTreeMap::new();
        overrides.insert("oversold".to_string(), crate::ParamValue::Float(80.0));
        assert!(RsiMeanReversionStrategy.resolve_params(&overrides).is_err());
    }
}
