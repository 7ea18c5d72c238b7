//! Strategy trait 정의.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::Kline;

use crate::error::StrategyResult;
use crate::params::{ParamSpec, ParamValue, StrategyParams};

/// 매매 결정 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    /// 매수
    Buy,
    /// 매도
    Sell,
    /// 관망
    Hold,
}

/// 전략이 한 봉에서 내린 결정.
///
/// `quantity`가 있으면 그 수량을, 없고 `weight`가 있으면 자산 대비 비중을
/// 사용합니다. 둘 다 없으면 엔진의 기본 포지션 크기 규칙을 따릅니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// 방향
    pub action: SignalAction,
    /// 목표 수량 (주)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,
    /// 목표 비중 (0~1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Decimal>,
}

impl Decision {
    /// 매수 결정.
    pub fn buy() -> Self {
        Self::new(SignalAction::Buy)
    }

    /// 매도 결정.
    pub fn sell() -> Self {
        Self::new(SignalAction::Sell)
    }

    /// 관망.
    pub fn hold() -> Self {
        Self::new(SignalAction::Hold)
    }

    fn new(action: SignalAction) -> Self {
        Self {
            action,
            quantity: None,
            weight: None,
        }
    }

    /// 목표 수량을 지정합니다.
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// 목표 비중을 지정합니다.
    pub fn with_weight(mut self, weight: Decimal) -> Self {
        self.weight = Some(weight);
        self
    }

    /// 관망인지 확인합니다.
    pub fn is_hold(&self) -> bool {
        self.action == SignalAction::Hold
    }
}

/// 전략 평가 기능.
///
/// 전략은 상태가 없습니다. 같은 윈도우와 파라미터에는 항상 같은 결정을
/// 돌려주어야 하며, 그래서 한 인스턴스를 여러 작업이 동시에 공유할 수 있습니다.
pub trait Strategy: Send + Sync {
    /// 전략 ID (영문, snake_case).
    fn id(&self) -> &str;

    /// 전략 이름 (한글).
    fn name(&self) -> &str;

    /// 전략 설명.
    fn description(&self) -> &str;

    /// 파라미터 스키마.
    fn schema(&self) -> Vec<ParamSpec>;

    /// 첫 평가에 필요한 최소 봉 개수.
    fn min_bars(&self, params: &StrategyParams) -> usize;

    /// 파라미터 간 제약을 검사합니다 (예: 단기 < 장기).
    fn validate(&self, _params: &StrategyParams) -> StrategyResult<()> {
        Ok(())
    }

    /// 현재 봉에서 결정을 내립니다.
    ///
    /// `window`의 마지막 원소가 현재 봉이며 그 이후의 봉은 포함되지 않습니다.
    fn evaluate(&self, window: &[Kline], params: &StrategyParams) -> StrategyResult<Decision>;

    /// 오버라이드 맵을 스키마로 검증해 확정된 파라미터를 만듭니다.
    fn resolve_params(
        &self,
        overrides: &BTreeMap<String, ParamValue>,
    ) -> StrategyResult<StrategyParams> {
        let params = StrategyParams::resolve(self.id(), &self.schema(), overrides)?;
        self.validate(&params)?;
        Ok(params)
    }
}
