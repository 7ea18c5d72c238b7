//! 백테스트 설정.
//!
//! 한 번의 시뮬레이션 실행을 정의합니다. 생성 후에는 변경하지 않으며,
//! 최적화기와 워크포워드 분석기는 기간이나 파라미터만 바꾼 복사본을 만들어 씁니다.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::{BacktestDefaults, DateRange, Symbol, Timeframe};
use trader_strategy::ParamValue;
use uuid::Uuid;

use crate::error::{BacktestError, BacktestResult};

/// 백테스트 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// 실행 ID
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// 전략 ID 또는 별칭
    pub strategy_id: String,

    /// 대상 심볼 목록 (`"005930"`, `"AAPL/USD"` 형식 문자열로 직렬화)
    #[serde(with = "symbol_list")]
    pub symbols: Vec<Symbol>,

    /// 백테스트 기간 `[start, end)`
    pub range: DateRange,

    /// 봉 주기
    #[serde(default = "default_timeframe")]
    pub timeframe: Timeframe,

    /// 초기 자본금
    #[serde(default = "default_initial_capital")]
    pub initial_capital: Decimal,

    /// 거래 수수료율 (0.00015 = 0.015%)
    #[serde(default = "default_commission_rate")]
    pub commission_rate: Decimal,

    /// 슬리피지율 (0.0005 = 0.05%)
    #[serde(default = "default_slippage_rate")]
    pub slippage_rate: Decimal,

    /// 신규 진입 시 가용 현금 대비 투입 비율 (미보유 심볼 수로 균등 분할)
    #[serde(default = "default_position_size_pct")]
    pub position_size_pct: Decimal,

    /// 소수점 수량 허용 여부 (기본: 정수 주)
    #[serde(default)]
    pub fractional_shares: bool,

    /// 전략 파라미터 (스키마에 없는 키는 실행 전에 거부됨)
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,

    /// 데이터 소스 이름 (없으면 엔진 기본 제공자)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
}

fn default_timeframe() -> Timeframe {
    Timeframe::D1
}

fn default_initial_capital() -> Decimal {
    Decimal::new(10_000_000, 0) // 1천만원
}

fn default_commission_rate() -> Decimal {
    Decimal::new(15, 5) // 0.015%
}

fn default_slippage_rate() -> Decimal {
    Decimal::new(5, 4) // 0.05%
}

fn default_position_size_pct() -> Decimal {
    Decimal::ONE
}

impl BacktestConfig {
    /// 기본값으로 새 설정을 생성합니다.
    pub fn new(strategy_id: impl Into<String>, symbols: Vec<Symbol>, range: DateRange) -> Self {
        Self {
            id: Uuid::new_v4(),
            strategy_id: strategy_id.into(),
            symbols,
            range,
            timeframe: default_timeframe(),
            initial_capital: default_initial_capital(),
            commission_rate: default_commission_rate(),
            slippage_rate: default_slippage_rate(),
            position_size_pct: default_position_size_pct(),
            fractional_shares: false,
            params: BTreeMap::new(),
            data_source: None,
        }
    }

    /// 애플리케이션 설정의 백테스트 기본값을 적용합니다.
    pub fn with_defaults(mut self, defaults: &BacktestDefaults) -> Self {
        self.initial_capital = defaults.initial_capital;
        self.commission_rate = defaults.commission_rate;
        self.slippage_rate = defaults.slippage_rate;
        self.position_size_pct = defaults.position_size_pct;
        self
    }

    /// 실행 ID를 지정합니다.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// 봉 주기를 설정합니다.
    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    /// 초기 자본금을 설정합니다.
    pub fn with_initial_capital(mut self, capital: Decimal) -> Self {
        self.initial_capital = capital;
        self
    }

    /// 수수료율을 설정합니다.
    pub fn with_commission_rate(mut self, rate: Decimal) -> Self {
        self.commission_rate = rate;
        self
    }

    /// 슬리피지율을 설정합니다.
    pub fn with_slippage_rate(mut self, rate: Decimal) -> Self {
        self.slippage_rate = rate;
        self
    }

    /// 포지션 크기 비율을 설정합니다.
    pub fn with_position_size_pct(mut self, pct: Decimal) -> Self {
        self.position_size_pct = pct;
        self
    }

    /// 소수점 수량 허용 여부를 설정합니다.
    pub fn with_fractional_shares(mut self, fractional: bool) -> Self {
        self.fractional_shares = fractional;
        self
    }

    /// 전략 파라미터 맵 전체를 교체합니다.
    pub fn with_params(mut self, params: BTreeMap<String, ParamValue>) -> Self {
        self.params = params;
        self
    }

    /// 전략 파라미터 하나를 설정합니다.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// 데이터 소스를 지정합니다.
    pub fn with_data_source(mut self, source: impl Into<String>) -> Self {
        self.data_source = Some(source.into());
        self
    }

    /// 기간만 바꾼 복사본.
    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    /// 설정을 검증합니다.
    pub fn validate(&self) -> BacktestResult<()> {
        if self.range.is_empty() {
            return Err(BacktestError::InvalidConfig(format!(
                "기간이 비어 있습니다: {}",
                self.range
            )));
        }

        if self.initial_capital <= Decimal::ZERO {
            return Err(BacktestError::InvalidConfig(
                "초기 자본금은 0보다 커야 합니다".to_string(),
            ));
        }

        if self.symbols.is_empty() {
            return Err(BacktestError::InvalidConfig(
                "심볼 목록이 비어 있습니다".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.symbols.iter().find(|s| !seen.insert(*s)) {
            return Err(BacktestError::InvalidConfig(format!(
                "중복된 심볼: {}",
                dup
            )));
        }

        if self.strategy_id.trim().is_empty() {
            return Err(BacktestError::InvalidConfig(
                "전략 ID가 비어 있습니다".to_string(),
            ));
        }

        if self.commission_rate < Decimal::ZERO || self.commission_rate >= Decimal::ONE {
            return Err(BacktestError::InvalidConfig(
                "수수료율은 0 이상 1 미만이어야 합니다".to_string(),
            ));
        }

        if self.slippage_rate < Decimal::ZERO || self.slippage_rate >= Decimal::ONE {
            return Err(BacktestError::InvalidConfig(
                "슬리피지율은 0 이상 1 미만이어야 합니다".to_string(),
            ));
        }

        if self.position_size_pct <= Decimal::ZERO || self.position_size_pct > Decimal::ONE {
            return Err(BacktestError::InvalidConfig(
                "포지션 크기 비율은 0 초과 1 이하여야 합니다".to_string(),
            ));
        }

        Ok(())
    }
}

/// 심볼 하나를 문자열로 (역)직렬화합니다.
pub(crate) mod symbol_string {
    use serde::{Deserialize, Deserializer, Serializer};
    use trader_core::Symbol;

    pub fn serialize<S: Serializer>(symbol: &Symbol, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&symbol.to_standard_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Symbol, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<Symbol>().map_err(serde::de::Error::custom)
    }
}

/// 심볼 목록을 문자열 배열로 (역)직렬화합니다.
mod symbol_list {
    use serde::{Deserialize, Deserializer, Serializer};
    use trader_core::Symbol;

    pub fn serialize<S: Serializer>(symbols: &[Symbol], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(symbols.iter().map(Symbol::to_standard_string))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Symbol>, D::Error> {
        let raw = Vec::<String>::deserialize(deserializer)?;
        raw.iter()
            .map(|s| s.parse::<Symbol>().map_err(serde::de::Error::custom))
            .collect()
    }
}
