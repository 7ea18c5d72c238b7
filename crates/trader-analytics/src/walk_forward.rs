//! 워크포워드 분석.
//!
//! 분석 기간을 (학습 구간, 검증 구간) 윈도우로 나눠, 학습 구간에서 파라미터를 최적화하고
//! 바로 다음의 보지 않은 검증 구간에서 그 파라미터로 백테스트합니다.
//! 과거 데이터의 잡음에 과적합된 파라미터를 걸러내기 위한 절차입니다.
//!
//! # 윈도우 배치
//!
//! ```text
//! Rolling:   [IS 0     ][OOS 0]
//!                 [IS 1     ][OOS 1]
//!                      [IS 2     ][OOS 2]
//!
//! Anchored:  [IS 0     ][OOS 0]
//!            [IS 1          ][OOS 1]
//!            [IS 2               ][OOS 2]
//! ```
//!
//! 윈도우 수 = floor((L − I − O) / S) + 1 (0 미만이면 0). 두 방식 모두 같습니다.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use trader_core::DateRange;
use trader_strategy::ParamValue;

use crate::backtest::{BacktestEngine, RunControl};
use crate::error::{BacktestError, BacktestResult};
use crate::optimization::{OptimizationConfig, Optimizer};
use crate::performance::PerformanceMetrics;

/// 윈도우 이동 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// 고정 길이 학습 구간이 앞으로 이동
    #[default]
    Rolling,
    /// 학습 시작일 고정, 학습 구간이 점점 길어짐
    Anchored,
}

fn default_min_windows() -> usize {
    1
}

/// 워크포워드 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// 학습 구간 최적화 설정 (기간은 윈도우마다 교체)
    pub optimization: OptimizationConfig,

    /// 전체 분석 기간
    pub analysis_range: DateRange,

    /// 학습 구간 길이 (일)
    pub in_sample_days: u32,

    /// 검증 구간 길이 (일)
    pub out_of_sample_days: u32,

    /// 윈도우 이동 간격 (일)
    pub step_days: u32,

    /// 최소 윈도우 수
    #[serde(default = "default_min_windows")]
    pub min_windows: usize,

    /// 윈도우 이동 방식
    #[serde(default)]
    pub mode: WindowMode,
}

/// 계획된 윈도우 하나의 기간.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowPlan {
    /// 윈도우 번호 (0부터)
    pub index: usize,
    /// 학습 구간
    pub in_sample: DateRange,
    /// 검증 구간
    pub out_of_sample: DateRange,
}

/// 분석 길이 `l`, 학습 `i`, 검증 `o`, 간격 `s`(일)에서 만들 수 있는 윈도우 수.
pub fn window_count(l: i64, i: i64, o: i64, s: i64) -> usize {
    if s <= 0 || l < i + o {
        return 0;
    }
    usize::try_from((l - i - o) / s + 1).unwrap_or(0)
}

impl WalkForwardConfig {
    /// 새 설정을 생성합니다.
    pub fn new(
        optimization: OptimizationConfig,
        analysis_range: DateRange,
        in_sample_days: u32,
        out_of_sample_days: u32,
        step_days: u32,
    ) -> Self {
        Self {
            optimization,
            analysis_range,
            in_sample_days,
            out_of_sample_days,
            step_days,
            min_windows: default_min_windows(),
            mode: WindowMode::default(),
        }
    }

    /// 최소 윈도우 수를 설정합니다.
    pub fn with_min_windows(mut self, min_windows: usize) -> Self {
        self.min_windows = min_windows;
        self
    }

    /// 윈도우 이동 방식을 설정합니다.
    pub fn with_mode(mut self, mode: WindowMode) -> Self {
        self.mode = mode;
        self
    }

    /// 윈도우 일정을 계산합니다. 백테스트는 실행하지 않습니다.
    ///
    /// # 오류
    ///
    /// - `InvalidConfig`: 빈 분석 기간, 0일 길이
    /// - `InsufficientWindows`: 윈도우 수가 `min_windows` 미만
    pub fn plan_windows(&self) -> BacktestResult<Vec<WindowPlan>> {
        if self.analysis_range.is_empty() {
            return Err(BacktestError::InvalidConfig(format!(
                "분석 기간이 비어 있습니다: {}",
                self.analysis_range
            )));
        }

        if self.in_sample_days == 0 || self.out_of_sample_days == 0 || self.step_days == 0 {
            return Err(BacktestError::InvalidConfig(
                "학습/검증/이동 간격은 1일 이상이어야 합니다".to_string(),
            ));
        }

        let i = i64::from(self.in_sample_days);
        let o = i64::from(self.out_of_sample_days);
        let s = i64::from(self.step_days);
        let count = window_count(self.analysis_range.days(), i, o, s);

        let required = self.min_windows.max(1);
        if count < required {
            return Err(BacktestError::InsufficientWindows {
                required,
                available: count,
            });
        }

        let start = self.analysis_range.start;
        Ok((0..count)
            .map(|k| {
                let shift = Duration::days(k as i64 * s);
                let (is_start, is_end) = match self.mode {
                    WindowMode::Rolling => {
                        let is_start = start + shift;
                        (is_start, is_start + Duration::days(i))
                    }
                    WindowMode::Anchored => (start, start + Duration::days(i) + shift),
                };
                WindowPlan {
                    index: k,
                    in_sample: DateRange::new(is_start, is_end),
                    out_of_sample: DateRange::new(is_end, is_end + Duration::days(o)),
                }
            })
            .collect())
    }
}

/// 윈도우 하나의 분석 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    /// 윈도우 번호
    pub index: usize,
    /// 학습 구간
    pub in_sample: DateRange,
    /// 검증 구간
    pub out_of_sample: DateRange,
    /// 학습 구간 최적 파라미터
    pub best_params: BTreeMap<String, ParamValue>,
    /// 학습 구간 최고 목적 함수 값
    pub in_sample_objective: Option<Decimal>,
    /// 학습 구간 성과 (최적 파라미터)
    pub in_sample_metrics: Option<PerformanceMetrics>,
    /// 검증 구간 성과
    pub out_of_sample_metrics: Option<PerformanceMetrics>,
    /// 실패 사유 (있으면 집계에서 제외)
    pub error: Option<String>,
}

impl WalkForwardWindow {
    fn failed(plan: &WindowPlan, error: &BacktestError) -> Self {
        Self {
            index: plan.index,
            in_sample: plan.in_sample,
            out_of_sample: plan.out_of_sample,
            best_params: BTreeMap::new(),
            in_sample_objective: None,
            in_sample_metrics: None,
            out_of_sample_metrics: None,
            error: Some(error.to_string()),
        }
    }

    /// 집계에 포함되는 윈도우인지 확인합니다.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.out_of_sample_metrics.is_some()
    }

    /// 학습 대비 검증 샤프 비율 하락률. 학습 샤프가 0 이하면 계산하지 않습니다.
    pub fn sharpe_degradation(&self) -> Option<Decimal> {
        let is = self.in_sample_metrics.as_ref()?.sharpe_ratio;
        let oos = self.out_of_sample_metrics.as_ref()?.sharpe_ratio;
        if is <= Decimal::ZERO {
            return None;
        }
        Some((is - oos) / is)
    }
}

/// 워크포워드 분석 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    /// 윈도우별 결과
    pub windows: Vec<WalkForwardWindow>,
    /// 검증 구간 수익률 복리 합성 (%)
    pub combined_oos_return_pct: Decimal,
    /// 검증 구간 평균 샤프 비율
    pub avg_oos_sharpe: Decimal,
    /// 학습 구간 평균 샤프 비율
    pub avg_is_sharpe: Decimal,
    /// 안정성 점수 = 검증 평균 샤프 / 학습 평균 샤프 (학습 평균이 0이면 0)
    pub stability_score: Decimal,
    /// 성공한 윈도우 수
    pub successful_windows: usize,
    /// 실행 시간 (밀리초)
    pub duration_ms: u64,
}

impl WalkForwardResult {
    /// 결과 요약을 문자열로 반환합니다.
    pub fn summary(&self) -> String {
        format!(
            "워크포워드 분석 결과\n\
             ═══════════════════════════════════════\n\
             윈도우: {} (성공 {})\n\
             ───────────────────────────────────────\n\
             검증 구간 합성 수익률: {:.2}%\n\
             검증 평균 샤프: {:.2}\n\
             학습 평균 샤프: {:.2}\n\
             안정성 점수: {:.2}\n\
             ═══════════════════════════════════════",
            self.windows.len(),
            self.successful_windows,
            self.combined_oos_return_pct,
            self.avg_oos_sharpe,
            self.avg_is_sharpe,
            self.stability_score,
        )
    }
}

/// 워크포워드 분석기.
#[derive(Debug, Clone, Copy)]
pub struct WalkForwardAnalyzer<'a> {
    engine: &'a BacktestEngine,
}

impl<'a> WalkForwardAnalyzer<'a> {
    /// 엔진을 사용하는 분석기를 생성합니다.
    pub fn new(engine: &'a BacktestEngine) -> Self {
        Self { engine }
    }

    /// 분석을 실행합니다.
    pub fn run(&self, config: &WalkForwardConfig) -> BacktestResult<WalkForwardResult> {
        self.run_with_control(config, &RunControl::default())
    }

    /// 취소·진행률 제어와 함께 분석을 실행합니다.
    ///
    /// 진행률은 (완료 윈도우 수, 전체 윈도우 수)로 보고합니다.
    #[instrument(
        name = "walk_forward",
        skip_all,
        fields(strategy = %config.optimization.base.strategy_id, mode = ?config.mode)
    )]
    pub fn run_with_control(
        &self,
        config: &WalkForwardConfig,
        control: &RunControl,
    ) -> BacktestResult<WalkForwardResult> {
        let started = Instant::now();
        let plans = config.plan_windows()?;

        // 모든 윈도우에 공통인 설정 오류는 시작 전에 드러냄
        let optimizer = Optimizer::new(self.engine);
        optimizer.plan(
            &config
                .optimization
                .clone()
                .with_base_range(config.analysis_range),
        )?;

        info!(
            windows = plans.len(),
            in_sample_days = config.in_sample_days,
            out_of_sample_days = config.out_of_sample_days,
            step_days = config.step_days,
            "워크포워드 분석 시작"
        );

        let inner = control.silent();
        let total = plans.len() as u64;
        let mut windows = Vec::with_capacity(plans.len());

        for plan in &plans {
            control.check()?;

            let window = match self.run_window(config, plan, &optimizer, &inner) {
                Ok(window) => window,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(window = plan.index, error = %e, "윈도우 분석 실패");
                    WalkForwardWindow::failed(plan, &e)
                }
            };
            windows.push(window);

            control.report(plan.index as u64 + 1, total);
        }

        let result = aggregate(windows, started.elapsed().as_millis() as u64);
        info!(
            successful = result.successful_windows,
            combined_oos_return = %result.combined_oos_return_pct,
            stability = %result.stability_score,
            "워크포워드 분석 완료"
        );
        Ok(result)
    }

    fn run_window(
        &self,
        config: &WalkForwardConfig,
        plan: &WindowPlan,
        optimizer: &Optimizer<'_>,
        control: &RunControl,
    ) -> BacktestResult<WalkForwardWindow> {
        let is_config = config
            .optimization
            .clone()
            .with_base_range(plan.in_sample);
        let optimized = optimizer.run_with_control(&is_config, control)?;

        let mut params = config.optimization.base.params.clone();
        params.extend(optimized.best_params.clone());
        let oos_config = config
            .optimization
            .base
            .clone()
            .with_range(plan.out_of_sample)
            .with_params(params);
        let oos = self.engine.run_with_control(&oos_config, control)?;

        Ok(WalkForwardWindow {
            index: plan.index,
            in_sample: plan.in_sample,
            out_of_sample: plan.out_of_sample,
            best_params: optimized.best_params,
            in_sample_objective: Some(optimized.best_objective),
            in_sample_metrics: Some(optimized.best_result.metrics),
            out_of_sample_metrics: Some(oos.metrics),
            error: None,
        })
    }
}

/// 성공한 윈도우만으로 집계합니다.
fn aggregate(windows: Vec<WalkForwardWindow>, duration_ms: u64) -> WalkForwardResult {
    let successful: Vec<(&PerformanceMetrics, &PerformanceMetrics)> = windows
        .iter()
        .filter(|w| w.is_success())
        .filter_map(|w| {
            Some((
                w.in_sample_metrics.as_ref()?,
                w.out_of_sample_metrics.as_ref()?,
            ))
        })
        .collect();

    let n = successful.len();
    let (combined, avg_is, avg_oos) = if n == 0 {
        (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
    } else {
        let growth = successful.iter().fold(Decimal::ONE, |acc, (_, oos)| {
            acc * (Decimal::ONE + oos.total_return_pct / Decimal::ONE_HUNDRED)
        });
        let count = Decimal::from(n);
        let sum_is: Decimal = successful.iter().map(|(is, _)| is.sharpe_ratio).sum();
        let sum_oos: Decimal = successful.iter().map(|(_, oos)| oos.sharpe_ratio).sum();
        (
            (growth - Decimal::ONE) * Decimal::ONE_HUNDRED,
            sum_is / count,
            sum_oos / count,
        )
    };

    let stability_score = if avg_is.is_zero() {
        Decimal::ZERO
    } else {
        avg_oos / avg_is
    };

    WalkForwardResult {
        windows,
        combined_oos_return_pct: combined,
        avg_oos_sharpe: avg_oos,
        avg_is_sharpe: avg_is,
        stability_score,
        successful_windows: n,
        duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::BacktestConfig;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use trader_core::{Symbol, Timeframe};
    use trader_data::{generate_klines, InMemoryBarProvider};
    use trader_strategy::StrategyRegistry;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn optimization() -> OptimizationConfig {
        let base = BacktestConfig::new(
            "sma_crossover",
            vec![Symbol::kr_stock("005930")],
            DateRange::new(date(2023, 1, 1), date(2024, 1, 1)),
        );
        OptimizationConfig::new(base)
            .with_parameter("short_period", vec![ParamValue::Int(3), ParamValue::Int(5)])
            .with_parameter("long_period", vec![ParamValue::Int(10), ParamValue::Int(15)])
    }

    fn config(days: i64, i: u32, o: u32, s: u32) -> WalkForwardConfig {
        WalkForwardConfig::new(
            optimization(),
            DateRange::from_days(date(2023, 1, 1), days),
            i,
            o,
            s,
        )
    }

    #[test]
    fn test_window_count_formula() {
        assert_eq!(window_count(365, 180, 30, 30), 6);
        assert_eq!(window_count(210, 180, 30, 30), 1);
        assert_eq!(window_count(209, 180, 30, 30), 0);
        assert_eq!(window_count(100, 10, 10, 0), 0);
    }

    #[test]
    fn test_rolling_windows() {
        let plans = config(365, 180, 30, 30).plan_windows().unwrap();
        assert_eq!(plans.len(), 6);

        for pair in plans.windows(2) {
            assert_eq!(pair[1].in_sample.start - pair[0].in_sample.start, Duration::days(30));
        }
        for plan in &plans {
            assert_eq!(plan.in_sample.days(), 180);
            assert_eq!(plan.out_of_sample.days(), 30);
            assert_eq!(plan.in_sample.end, plan.out_of_sample.start);
        }
        let last = plans.last().unwrap();
        assert!(last.out_of_sample.end <= date(2023, 1, 1) + Duration::days(365));
    }

    #[test]
    fn test_anchored_windows() {
        let plans = config(365, 180, 30, 30)
            .with_mode(WindowMode::Anchored)
            .plan_windows()
            .unwrap();
        assert_eq!(plans.len(), 6);
        assert!(plans.iter().all(|p| p.in_sample.start == date(2023, 1, 1)));
        assert_eq!(plans[0].in_sample.days(), 180);
        assert_eq!(plans[2].in_sample.days(), 240);
    }

    #[test]
    fn test_insufficient_windows() {
        let result = config(365, 180, 30, 30).with_min_windows(10).plan_windows();
        match result {
            Err(BacktestError::InsufficientWindows {
                required,
                available,
            }) => {
                assert_eq!(required, 10);
                assert_eq!(available, 6);
            }
            other => panic!("unexpected: {:?}", other),
        }

        assert!(matches!(
            config(100, 180, 30, 30).plan_windows(),
            Err(BacktestError::InsufficientWindows { available: 0, .. })
        ));
    }

    #[test]
    fn test_zero_lengths_rejected() {
        assert!(matches!(
            config(365, 0, 30, 30).plan_windows(),
            Err(BacktestError::InvalidConfig(_))
        ));
        assert!(matches!(
            config(365, 180, 30, 0).plan_windows(),
            Err(BacktestError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_stability_zero_when_in_sample_flat() {
        let result = aggregate(Vec::new(), 0);
        assert_eq!(result.stability_score, Decimal::ZERO);
        assert_eq!(result.successful_windows, 0);
    }

    #[test]
    fn test_walk_forward_run() {
        let symbol = Symbol::kr_stock("005930");
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let klines = generate_klines(&symbol, Timeframe::D1, start, 200, dec!(50000), 0.03, 11);
        let engine = BacktestEngine::new(
            Arc::new(InMemoryBarProvider::new().with_klines(klines)),
            Arc::new(StrategyRegistry::with_builtins()),
        );

        let config = config(200, 90, 30, 30).with_min_windows(2);
        let result = WalkForwardAnalyzer::new(&engine).run(&config).unwrap();

        assert_eq!(result.windows.len(), window_count(200, 90, 30, 30));
        assert_eq!(result.successful_windows, result.windows.len());
        for window in &result.windows {
            assert!(!window.best_params.is_empty());
            assert!(window.out_of_sample_metrics.is_some());
        }
    }
}
