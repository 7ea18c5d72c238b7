//! 포트폴리오 백테스트.
//!
//! 심볼별 비중으로 자본을 나눠 각 심볼을 독립적으로 시뮬레이션한 뒤,
//! 거래와 자산 곡선을 합쳐 포트폴리오 성과를 계산합니다.
//!
//! # 모듈 구성
//!
//! - [`equity_curve`]: 심볼별 자산 곡선 합성
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! let config = PortfolioConfig::new(base)
//!     .with_allocation(Symbol::kr_stock("005930"), dec!(0.6))
//!     .with_allocation(Symbol::kr_stock("000660"), dec!(0.4));
//! let result = PortfolioBacktester::new(&engine).run(&config)?;
//! println!("{}", result.metrics.summary());
//! ```

pub mod equity_curve;

pub use equity_curve::{merge_equity_curves, CurveInput};

use std::collections::HashSet;
use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use trader_core::Symbol;
use uuid::Uuid;

use crate::backtest::{BacktestConfig, BacktestEngine, BacktestReport, EquityPoint, RunControl, Trade};
use crate::error::{BacktestError, BacktestResult};
use crate::performance::PerformanceMetrics;

/// 심볼 비중.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// 심볼 (`"005930"` 형식 문자열로 직렬화)
    #[serde(with = "crate::backtest::config::symbol_string")]
    pub symbol: Symbol,
    /// 비중 (양수, 합계는 정규화됨)
    pub weight: Decimal,
}

/// 포트폴리오 백테스트 설정.
///
/// `base`의 심볼 목록은 무시하고 `allocations`의 심볼을 사용합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// 기본 백테스트 설정 (전략, 기간, 비용, 총 자본)
    pub base: BacktestConfig,
    /// 심볼별 비중
    pub allocations: Vec<Allocation>,
}

impl PortfolioConfig {
    /// 빈 비중 목록으로 설정을 생성합니다.
    pub fn new(base: BacktestConfig) -> Self {
        Self {
            base,
            allocations: Vec::new(),
        }
    }

    /// 심볼 비중을 추가합니다.
    pub fn with_allocation(mut self, symbol: Symbol, weight: Decimal) -> Self {
        self.allocations.push(Allocation { symbol, weight });
        self
    }

    /// 비중을 검증하고 합계 1로 정규화한 목록을 반환합니다.
    pub fn normalized_allocations(&self) -> BacktestResult<Vec<Allocation>> {
        if self.allocations.is_empty() {
            return Err(BacktestError::InvalidConfig(
                "포트폴리오 비중이 비어 있습니다".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for allocation in &self.allocations {
            if allocation.weight <= Decimal::ZERO {
                return Err(BacktestError::InvalidConfig(format!(
                    "{} 비중은 0보다 커야 합니다: {}",
                    allocation.symbol, allocation.weight
                )));
            }
            if !seen.insert(&allocation.symbol) {
                return Err(BacktestError::InvalidConfig(format!(
                    "중복된 심볼: {}",
                    allocation.symbol
                )));
            }
        }

        let total = self
            .allocations
            .iter()
            .try_fold(Decimal::ZERO, |acc, a| acc.checked_add(a.weight))
            .ok_or_else(|| {
                BacktestError::InvalidConfig("포트폴리오 비중 합계가 너무 큽니다".to_string())
            })?;
        Ok(self
            .allocations
            .iter()
            .map(|a| Allocation {
                symbol: a.symbol.clone(),
                weight: a.weight / total,
            })
            .collect())
    }
}

/// 심볼 하나의 실행 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRun {
    /// 정규화된 비중
    pub allocation: Allocation,
    /// 배분 자본
    pub capital: Decimal,
    /// 백테스트 결과
    pub report: BacktestReport,
}

/// 포트폴리오 백테스트 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioResult {
    /// 심볼별 결과 (비중 순서)
    pub runs: Vec<SymbolRun>,
    /// 전체 거래 (청산 시각 순)
    pub trades: Vec<Trade>,
    /// 합성 자산 곡선
    pub equity_curve: Vec<EquityPoint>,
    /// 초기 자본
    pub initial_capital: Decimal,
    /// 최종 자산
    pub final_capital: Decimal,
    /// 총 수익률 (%)
    pub total_return_pct: Decimal,
    /// 포트폴리오 성과 지표
    pub metrics: PerformanceMetrics,
    /// 실행 시간 (밀리초)
    pub duration_ms: u64,
}

/// 포트폴리오 백테스터.
#[derive(Debug, Clone, Copy)]
pub struct PortfolioBacktester<'a> {
    engine: &'a BacktestEngine,
}

impl<'a> PortfolioBacktester<'a> {
    /// 엔진을 사용하는 백테스터를 생성합니다.
    pub fn new(engine: &'a BacktestEngine) -> Self {
        Self { engine }
    }

    /// 포트폴리오 백테스트를 실행합니다.
    pub fn run(&self, config: &PortfolioConfig) -> BacktestResult<PortfolioResult> {
        self.run_with_control(config, &RunControl::default())
    }

    /// 취소·진행률 제어와 함께 실행합니다. 진행률은 (완료 심볼 수, 전체 심볼 수)입니다.
    #[instrument(name = "portfolio", skip_all, fields(strategy = %config.base.strategy_id))]
    pub fn run_with_control(
        &self,
        config: &PortfolioConfig,
        control: &RunControl,
    ) -> BacktestResult<PortfolioResult> {
        let started = Instant::now();
        let allocations = config.normalized_allocations()?;
        let initial_capital = config.base.initial_capital;
        let inner = control.silent();
        let total = allocations.len() as u64;

        info!(symbols = allocations.len(), capital = %initial_capital, "포트폴리오 백테스트 시작");

        let mut runs = Vec::with_capacity(allocations.len());
        for (i, allocation) in allocations.into_iter().enumerate() {
            control.check()?;

            let capital = initial_capital
                .checked_mul(allocation.weight)
                .ok_or_else(|| overflow("심볼 배분 자본"))?;
            let mut run_config = config
                .base
                .clone()
                .with_id(sub_run_id(config.base.id, i))
                .with_initial_capital(capital);
            run_config.symbols = vec![allocation.symbol.clone()];

            let report = self.engine.run_with_control(&run_config, &inner)?;
            runs.push(SymbolRun {
                allocation,
                capital,
                report,
            });

            control.report(i as u64 + 1, total);
        }

        let mut trades: Vec<Trade> = runs
            .iter()
            .flat_map(|r| r.report.trades.iter().cloned())
            .collect();
        trades.sort_by_key(|t| t.exit_time);

        let inputs: Vec<CurveInput<'_>> = runs
            .iter()
            .map(|r| CurveInput {
                initial: r.capital,
                points: &r.report.equity_curve,
            })
            .collect();
        let equity_curve = merge_equity_curves(&inputs);

        let final_capital = runs
            .iter()
            .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(r.report.final_capital))
            .ok_or_else(|| overflow("최종 자본"))?;
        let metrics = PerformanceMetrics::calculate(
            &trades,
            &equity_curve,
            initial_capital,
            self.engine.metrics_config(),
        );
        let total_return_pct = final_capital
            .checked_sub(initial_capital)
            .and_then(|gain| gain.checked_div(initial_capital))
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(|| overflow("총 수익률"))?;

        info!(
            trades = trades.len(),
            final_capital = %final_capital,
            "포트폴리오 백테스트 완료"
        );

        Ok(PortfolioResult {
            runs,
            trades,
            equity_curve,
            initial_capital,
            final_capital,
            total_return_pct,
            metrics,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }
}

fn overflow(context: &str) -> BacktestError {
    BacktestError::SimulationFailure(format!("{} 계산 중 오버플로", context))
}

/// 심볼별 실행 ID. 거래 ID가 심볼 간에 겹치지 않도록 상위 비트를 이동합니다.
fn sub_run_id(base: Uuid, index: usize) -> Uuid {
    Uuid::from_u128(base.as_u128().wrapping_add((index as u128 + 1) << 64))
}
