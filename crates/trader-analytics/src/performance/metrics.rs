//! 성과 지표 계산 모듈
//!
//! 거래 목록과 자산 곡선으로부터 전략 성과 지표를 계산하는 순수 함수 모음입니다:
//! - 총 수익률: (최종 자산 − 초기 자본) / 초기 자본 × 100
//! - 샤프 비율: 기간 수익률 평균 / 모표준편차 × √(연간 기간 수)
//! - 최대 낙폭: 자산 곡선의 고점 대비 최대 하락률 (단일 순방향 패스)
//! - 승률: 수익 거래 / 전체 거래 × 100
//! - 프로핏 팩터: 총이익 / |총손실|
//!
//! 나눗셈이 정의되지 않는 경우(거래 없음, 평탄한 자산 곡선, 손실 거래 없음)에도
//! NaN이나 무한대 대신 정해진 값을 돌려주므로 최적화기의 비교가 항상 잘 정의됩니다.
//!
//! # 사용 예시
//!
//! ```rust
//! use trader_analytics::performance::{MetricsConfig, PerformanceMetrics};
//! use rust_decimal_macros::dec;
//!
//! let metrics = PerformanceMetrics::calculate(&[], &[], dec!(10_000_000), &MetricsConfig::default());
//!
//! assert_eq!(metrics.win_rate_pct, dec!(0));
//! assert_eq!(metrics.profit_factor, dec!(999.99));
//! assert_eq!(metrics.sharpe_ratio, dec!(0));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trader_core::{decimal_sqrt, BacktestDefaults};

use crate::backtest::{EquityPoint, Trade};

/// 연간 거래일 수 (일봉 연율화 기본값)
pub const TRADING_DAYS_PER_YEAR: u32 = 252;

/// 손실 거래가 없을 때의 프로핏 팩터 기본 대체값
pub const DEFAULT_PROFIT_FACTOR_CAP: Decimal = Decimal::from_parts(99999, 0, 0, false, 2);

/// 지표 계산 정책.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 샤프 비율 연율화에 쓰는 연간 기간 수
    pub periods_per_year: u32,
    /// 프로핏 팩터 상한 (손실 거래가 없을 때 이 값을 사용)
    pub profit_factor_cap: Decimal,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: TRADING_DAYS_PER_YEAR,
            profit_factor_cap: DEFAULT_PROFIT_FACTOR_CAP,
        }
    }
}

impl From<&BacktestDefaults> for MetricsConfig {
    fn from(defaults: &BacktestDefaults) -> Self {
        Self {
            periods_per_year: defaults.periods_per_year,
            profit_factor_cap: defaults.profit_factor_cap,
        }
    }
}

/// 전략 성과 지표.
///
/// 계산 후에는 변경하지 않습니다. 모든 비율은 백분율 단위입니다 (5.25 = 5.25%).
///
/// ## 수익성 지표
/// - `total_return_pct`, `net_profit`, `avg_trade_return_pct`, `expectancy`
///
/// ## 위험 지표
/// - `max_drawdown_pct`, `sharpe_ratio`
///
/// ## 거래 효율성 지표
/// - `win_rate_pct`, `profit_factor`, `avg_win`, `avg_loss`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// 총 수익률 (%)
    pub total_return_pct: Decimal,

    /// 샤프 비율 (무위험 이자율 0, 모표준편차 기준)
    pub sharpe_ratio: Decimal,

    /// 최대 낙폭 (%)
    pub max_drawdown_pct: Decimal,

    /// 승률 (%)
    pub win_rate_pct: Decimal,

    /// 프로핏 팩터 (손실 거래가 없으면 설정된 상한값)
    pub profit_factor: Decimal,

    /// 총 거래 수
    pub total_trades: usize,

    /// 수익 거래 수
    pub winning_trades: usize,

    /// 손실 거래 수
    pub losing_trades: usize,

    /// 총이익 (수익 거래 손익 합)
    pub gross_profit: Decimal,

    /// 총손실 (손실 거래 손익 합의 절대값)
    pub gross_loss: Decimal,

    /// 순이익 (총이익 − 총손실)
    pub net_profit: Decimal,

    /// 거래당 평균 수익률 (%)
    pub avg_trade_return_pct: Decimal,

    /// 평균 수익 (수익 거래 기준)
    pub avg_win: Decimal,

    /// 평균 손실 (손실 거래 기준, 절대값)
    pub avg_loss: Decimal,

    /// 최대 단일 수익
    pub largest_win: Decimal,

    /// 최대 단일 손실 (절대값)
    pub largest_loss: Decimal,

    /// 거래당 기대 손익
    pub expectancy: Decimal,
}

impl PerformanceMetrics {
    /// 거래 목록과 자산 곡선으로 성과 지표를 계산합니다.
    ///
    /// 자산 곡선이 비어 있으면 최종 자산은 초기 자본 + 순이익으로 봅니다.
    pub fn calculate(
        trades: &[Trade],
        equity_curve: &[EquityPoint],
        initial_capital: Decimal,
        config: &MetricsConfig,
    ) -> Self {
        let equity: Vec<Decimal> = equity_curve.iter().map(|p| p.equity).collect();
        Self::from_series(trades, &equity, initial_capital, config)
    }

    /// 거래 목록만으로 성과 지표를 계산합니다.
    ///
    /// 자산 곡선은 초기 자본에 거래 손익을 청산 순서대로 누적해 만듭니다.
    /// 심볼별 성과처럼 별도 자산 곡선이 없는 경우에 씁니다.
    pub fn from_trades(trades: &[Trade], initial_capital: Decimal, config: &MetricsConfig) -> Self {
        let equity = Self::build_equity_curve(trades, initial_capital);
        Self::from_series(trades, &equity, initial_capital, config)
    }

    fn from_series(
        trades: &[Trade],
        equity: &[Decimal],
        initial_capital: Decimal,
        config: &MetricsConfig,
    ) -> Self {
        let mut gross_profit = Decimal::ZERO;
        let mut gross_loss = Decimal::ZERO;
        let mut winning_trades = 0usize;
        let mut losing_trades = 0usize;
        let mut largest_win = Decimal::ZERO;
        let mut largest_loss = Decimal::ZERO;
        let mut return_sum = Decimal::ZERO;

        for trade in trades {
            return_sum += trade.return_pct;
            if trade.pnl > Decimal::ZERO {
                winning_trades += 1;
                gross_profit += trade.pnl;
                largest_win = largest_win.max(trade.pnl);
            } else if trade.pnl < Decimal::ZERO {
                losing_trades += 1;
                gross_loss += trade.pnl.abs();
                largest_loss = largest_loss.max(trade.pnl.abs());
            }
        }

        let total_trades = trades.len();
        let net_profit = gross_profit - gross_loss;
        let hundred = Decimal::ONE_HUNDRED;

        let final_equity = equity
            .last()
            .copied()
            .unwrap_or(initial_capital + net_profit);
        let total_return_pct = if initial_capital > Decimal::ZERO {
            (final_equity - initial_capital) / initial_capital * hundred
        } else {
            Decimal::ZERO
        };

        let per_trade = |sum: Decimal, count: usize| {
            if count > 0 {
                sum / Decimal::from(count)
            } else {
                Decimal::ZERO
            }
        };

        Self {
            total_return_pct,
            sharpe_ratio: Self::calculate_sharpe_ratio(equity, config.periods_per_year),
            max_drawdown_pct: Self::calculate_max_drawdown(equity),
            win_rate_pct: per_trade(Decimal::from(winning_trades) * hundred, total_trades),
            profit_factor: Self::calculate_profit_factor(
                gross_profit,
                gross_loss,
                config.profit_factor_cap,
            ),
            total_trades,
            winning_trades,
            losing_trades,
            gross_profit,
            gross_loss,
            net_profit,
            avg_trade_return_pct: per_trade(return_sum, total_trades),
            avg_win: per_trade(gross_profit, winning_trades),
            avg_loss: per_trade(gross_loss, losing_trades),
            largest_win,
            largest_loss,
            expectancy: per_trade(net_profit, total_trades),
        }
    }

    /// 거래 손익 누적으로 자산 곡선을 구축합니다.
    fn build_equity_curve(trades: &[Trade], initial_capital: Decimal) -> Vec<Decimal> {
        let mut sorted: Vec<&Trade> = trades.iter().collect();
        sorted.sort_by_key(|t| t.exit_time);

        let mut curve = Vec::with_capacity(sorted.len() + 1);
        let mut equity = initial_capital;
        curve.push(equity);
        for trade in sorted {
            equity += trade.pnl;
            curve.push(equity);
        }
        curve
    }

    /// 프로핏 팩터를 계산합니다.
    ///
    /// 손실이 없으면 `cap`을 반환하고, 그 밖의 값도 `cap`을 넘지 않습니다.
    pub fn calculate_profit_factor(gross_profit: Decimal, gross_loss: Decimal, cap: Decimal) -> Decimal {
        if gross_loss.is_zero() {
            return cap;
        }
        (gross_profit / gross_loss).min(cap)
    }

    /// 최대 낙폭(MDD)을 계산합니다.
    ///
    /// MDD = (고점 - 저점) / 고점 × 100%
    ///
    /// # 예시
    ///
    /// 자산이 1000만원 → 1200만원(고점) → 1080만원(저점) → 1300만원
    /// MDD = (1200 - 1080) / 1200 × 100 = 10%
    pub fn calculate_max_drawdown(equity_curve: &[Decimal]) -> Decimal {
        let Some(&first) = equity_curve.first() else {
            return Decimal::ZERO;
        };

        let mut max_drawdown = Decimal::ZERO;
        let mut peak = first;

        for &equity in equity_curve {
            if equity > peak {
                peak = equity;
            }

            if peak > Decimal::ZERO {
                let drawdown = (peak - equity) / peak * Decimal::ONE_HUNDRED;
                if drawdown > max_drawdown {
                    max_drawdown = drawdown;
                }
            }
        }

        max_drawdown
    }

    /// 자산 곡선의 기간 수익률 (비율, 0.01 = 1%).
    ///
    /// 직전 값이 0 이하이거나 수익률이 Decimal 범위를 넘는 구간은 건너뜁니다.
    pub fn period_returns(equity_curve: &[Decimal]) -> Vec<Decimal> {
        equity_curve
            .windows(2)
            .filter(|w| w[0] > Decimal::ZERO)
            .filter_map(|w| w[1].checked_sub(w[0])?.checked_div(w[0]))
            .collect()
    }

    /// 샤프 비율을 계산합니다.
    ///
    /// Sharpe = 평균(기간 수익률) / 모표준편차(기간 수익률) × √(연간 기간 수)
    ///
    /// 표준편차가 0이면(평탄한 자산 곡선) 0을 반환합니다.
    /// 중간 계산이 Decimal 범위를 넘어도 0을 반환합니다.
    pub fn calculate_sharpe_ratio(equity_curve: &[Decimal], periods_per_year: u32) -> Decimal {
        Self::checked_sharpe_ratio(&Self::period_returns(equity_curve), periods_per_year)
            .unwrap_or(Decimal::ZERO)
    }

    fn checked_sharpe_ratio(returns: &[Decimal], periods_per_year: u32) -> Option<Decimal> {
        if returns.is_empty() {
            return Some(Decimal::ZERO);
        }

        let n = Decimal::from(returns.len());
        let mean = returns
            .iter()
            .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(*r))?
            .checked_div(n)?;

        // 모분산: Σ(ri - mean)² / n
        let variance = returns
            .iter()
            .try_fold(Decimal::ZERO, |acc, r| {
                let d = r.checked_sub(mean)?;
                acc.checked_add(d.checked_mul(d)?)
            })?
            .checked_div(n)?;

        let std_dev = decimal_sqrt(variance);
        if std_dev.is_zero() {
            return Some(Decimal::ZERO);
        }

        mean.checked_div(std_dev)?
            .checked_mul(decimal_sqrt(Decimal::from(periods_per_year)))
    }

    /// 수익 여부.
    pub fn is_profitable(&self) -> bool {
        self.net_profit > Decimal::ZERO
    }

    /// 한 줄 요약 (로그 출력용).
    pub fn summary(&self) -> String {
        format!(
            "거래: {} | 승률: {:.1}% | PF: {:.2} | 샤프: {:.2} | MDD: {:.1}% | 수익률: {:.2}%",
            self.total_trades,
            self.win_rate_pct,
            self.profit_factor,
            self.sharpe_ratio,
            self.max_drawdown_pct,
            self.total_return_pct
        )
    }
}
