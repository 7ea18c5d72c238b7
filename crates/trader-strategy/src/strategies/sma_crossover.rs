//! 단순 이동평균 크로스오버 전략.
//!
//! 단기 이동평균이 장기 이동평균을 상향 돌파하면 매수,
//! 하향 돌파하면 매도하는 클래식한 추세 추종 전략입니다.
//!
//! # 전략 로직
//! - 골든 크로스 (직전 봉 단기 ≤ 장기, 현재 봉 단기 > 장기): 매수
//! - 데드 크로스 (직전 봉 단기 ≥ 장기, 현재 봉 단기 < 장기): 매도
//!
//! 직전 봉의 이동평균은 윈도우에서 마지막 봉을 뺀 구간으로 다시 계산하므로
//! 전략 인스턴스에 상태가 없습니다.

use trader_core::Kline;

use crate::error::{StrategyError, StrategyResult};
use crate::indicators::{calculate_sma, closes};
use crate::params::{ParamSpec, StrategyParams};
use crate::traits::{Decision, Strategy};

/// SMA 크로스오버 전략.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmaCrossoverStrategy;

impl SmaCrossoverStrategy {
    /// 새 SMA 전략 생성.
    pub fn new() -> Self {
        Self
    }

    fn periods(params: &StrategyParams) -> StrategyResult<(usize, usize)> {
        Ok((
            params.get_usize("short_period")?,
            params.get_usize("long_period")?,
        ))
    }
}

impl Strategy for SmaCrossoverStrategy {
    fn id(&self) -> &str {
        "sma_crossover"
    }

    fn name(&self) -> &str {
        "SMA 크로스오버"
    }

    fn description(&self) -> &str {
        "단기/장기 단순 이동평균 교차. 골든 크로스 매수, 데드 크로스 매도."
    }

    fn schema(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("short_period", 10, 1, 500, "단기 이동평균 기간"),
            ParamSpec::int("long_period", 20, 2, 1000, "장기 이동평균 기간"),
        ]
    }

    fn min_bars(&self, params: &StrategyParams) -> usize {
        Self::periods(params)
            .map(|(_, long)| long + 1)
            .unwrap_or(usize::MAX)
    }

    fn validate(&self, params: &StrategyParams) -> StrategyResult<()> {
        let (short, long) = Self::periods(params)?;
        if short >= long {
            return Err(StrategyError::invalid(
                "short_period",
                format!("단기({})는 장기({})보다 작아야 합니다", short, long),
            ));
        }
        Ok(())
    }

    fn evaluate(&self, window: &[Kline], params: &StrategyParams) -> StrategyResult<Decision> {
        let (short, long) = Self::periods(params)?;
        if window.len() < long + 1 {
            return Ok(Decision::hold());
        }

        let prices = closes(&window[window.len() - (long + 1)..]);
        let previous = &prices[..long];

        let (Some(short_sma), Some(long_sma), Some(prev_short), Some(prev_long)) = (
            calculate_sma(&prices, short),
            calculate_sma(&prices, long),
            calculate_sma(previous, short),
            calculate_sma(previous, long),
        ) else {
            return Ok(Decision::hold());
        };

        // 골든 크로스: 단기가 장기를 상향 돌파
        if prev_short <= prev_long && short_sma > long_sma {
            return Ok(Decision::buy());
        }
        // 데드 크로스: 단기가 장기를 하향 돌파
        if prev_short >= prev_long && short_sma < long_sma {
            return Ok(Decision::sell());
        }

        Ok(Decision::hold())
    }
}
