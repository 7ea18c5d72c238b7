//! 매수 후 보유 전략.
//!
//! 첫 평가 가능한 봉에서 한 번 매수하고 이후에는 관망합니다.
//! 구간 끝의 강제 청산으로 거래가 확정되므로 벤치마크 용도로 씁니다.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use trader_core::Kline;

use crate::error::{StrategyError, StrategyResult};
use crate::params::{ParamSpec, StrategyParams};
use crate::traits::{Decision, Strategy};

/// 매수 후 보유 전략.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuyAndHoldStrategy;

impl BuyAndHoldStrategy {
    /// 새 전략 생성.
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for BuyAndHoldStrategy {
    fn id(&self) -> &str {
        "buy_and_hold"
    }

    fn name(&self) -> &str {
        "매수 후 보유"
    }

    fn description(&self) -> &str {
        "첫 봉에서 매수 후 기간 끝까지 보유."
    }

    fn schema(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::float(
            "weight",
            1.0,
            0.01,
            1.0,
            "진입 시 자산 대비 투입 비중",
        )]
    }

    fn min_bars(&self, _params: &StrategyParams) -> usize {
        1
    }

    fn evaluate(&self, window: &[Kline], params: &StrategyParams) -> StrategyResult<Decision> {
        if window.len() != 1 {
            return Ok(Decision::hold());
        }

        let weight = params.get_float("weight")?;
        let weight = Decimal::from_f64(weight)
            .ok_or_else(|| StrategyError::invalid("weight", "표현할 수 없는 값"))?;

        Ok(Decision::buy().with_weight(weight))
    }
}
