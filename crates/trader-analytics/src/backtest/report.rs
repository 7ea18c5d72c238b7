//! 백테스트 결과 리포트.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::DecimalExt;

use super::accounting::{EquityPoint, Trade};
use super::config::BacktestConfig;
use crate::performance::PerformanceMetrics;

/// 백테스트 결과 리포트
///
/// 실행당 한 번 생성되며 이후 읽기 전용입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    /// 실행 설정
    pub config: BacktestConfig,

    /// 최종 자산 (모든 포지션 청산 후 현금)
    pub final_capital: Decimal,

    /// 총 수익률 (%)
    pub total_return_pct: Decimal,

    /// 청산 순서대로 정렬된 거래 목록
    pub trades: Vec<Trade>,

    /// 자산 곡선 (첫 점 = 초기 자본, 이후 봉 시각마다 한 점)
    pub equity_curve: Vec<EquityPoint>,

    /// 성과 지표
    pub metrics: PerformanceMetrics,

    /// 심볼별 성과 (키: `BASE/QUOTE`)
    pub metrics_by_symbol: BTreeMap<String, PerformanceMetrics>,

    /// 총 수수료
    pub total_commission: Decimal,

    /// 총 슬리피지 비용
    pub total_slippage: Decimal,

    /// 처리한 봉 수 (전 심볼 합계)
    pub bars_processed: usize,

    /// 실행 시간 (밀리초)
    pub duration_ms: u64,
}

impl BacktestReport {
    /// 거래별 수익률 목록 (비율, 0.05 = 5%).
    ///
    /// 몬테카를로 재표본 추출의 입력입니다.
    pub fn trade_returns(&self) -> Vec<f64> {
        self.trades
            .iter()
            .map(|t| t.return_pct.to_f64_lossy() / 100.0)
            .collect()
    }

    /// 자산 곡선 값만 추출합니다.
    pub fn equity_values(&self) -> Vec<Decimal> {
        self.equity_curve.iter().map(|p| p.equity).collect()
    }

    /// 결과 요약을 문자열로 반환합니다.
    pub fn summary(&self) -> String {
        format!(
            "백테스트 결과 요약 [{}]\n\
             ═══════════════════════════════════════\n\
             기간: {} → {} ({} 일)\n\
             처리한 봉: {}\n\
             ───────────────────────────────────────\n\
             초기 자본: {}\n\
             최종 자산: {:.2}\n\
             순수익: {:.2}\n\
             총 수익률: {:.2}%\n\
             ───────────────────────────────────────\n\
             총 거래: {}\n\
             승률: {:.1}%\n\
             프로핏 팩터: {:.2}\n\
             ───────────────────────────────────────\n\
             샤프 비율: {:.2}\n\
             최대 낙폭: {:.2}%\n\
             ───────────────────────────────────────\n\
             총 수수료: {:.2}\n\
             총 슬리피지: {:.2}\n\
             ═══════════════════════════════════════",
            self.config.strategy_id,
            self.config.range.start,
            self.config.range.end,
            self.config.range.days(),
            self.bars_processed,
            self.config.initial_capital,
            self.final_capital,
            self.final_capital - self.config.initial_capital,
            self.total_return_pct,
            self.metrics.total_trades,
            self.metrics.win_rate_pct,
            self.metrics.profit_factor,
            self.metrics.sharpe_ratio,
            self.metrics.max_drawdown_pct,
            self.total_commission,
            self.total_slippage,
        )
    }
}
