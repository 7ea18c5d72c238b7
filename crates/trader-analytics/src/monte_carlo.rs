//! 몬테카를로 재표본 분석.
//!
//! 백테스트 거래별 수익률을 재표본 추출해 가상의 자산 경로를 만들고,
//! 최종 수익률 분포로 결과의 신뢰 구간을 추정합니다.
//!
//! # 방식
//!
//! - **Bootstrap**: 거래 수만큼 복원 추출 (거래 선택의 운)
//! - **Permutation**: 같은 거래의 순서만 섞음 (거래 순서의 운, 최종 수익률은 동일하고 낙폭만 달라짐)
//! - **Parametric**: 거래 수익률에 정규분포를 맞춰 생성
//!
//! `preserve_correlation`이 켜져 있고 `block_size > 1`이면 연속된 거래 묶음 단위로 추출해
//! 연승·연패 같은 계열 상관을 일부 보존합니다.
//!
//! 한 실행은 시드 하나로 만든 단일 난수 스트림을 사용하므로 같은 시드는 같은 결과를 냅니다.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use statrs::statistics::Statistics;
use tracing::{debug, info, instrument};
use trader_core::MonteCarloDefaults;

use crate::backtest::{BacktestReport, RunControl};
use crate::error::{BacktestError, BacktestResult};

/// 재표본 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonteCarloMethod {
    /// 복원 추출
    #[default]
    Bootstrap,
    /// 순서 섞기
    Permutation,
    /// 정규분포 생성
    Parametric,
}

/// 몬테카를로 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    /// 시뮬레이션 횟수
    pub num_simulations: usize,
    /// 재표본 방식
    pub method: MonteCarloMethod,
    /// 신뢰 수준 (0, 1)
    pub confidence_level: f64,
    /// 블록 단위 추출 여부
    pub preserve_correlation: bool,
    /// 블록 크기 (거래 수). 1보다 크면 `preserve_correlation`이 켜져 있어야 합니다.
    pub block_size: usize,
    /// 랜덤 시드 (없으면 엔트로피에서 생성)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// 히스토그램 구간 수
    pub distribution_bins: usize,
    /// 파산 기준 수익률 (%)
    pub ruin_threshold_pct: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self::from_defaults(&MonteCarloDefaults::default())
    }
}

impl MonteCarloConfig {
    /// 애플리케이션 기본값으로 설정을 만듭니다.
    pub fn from_defaults(defaults: &MonteCarloDefaults) -> Self {
        Self {
            num_simulations: defaults.simulations,
            method: MonteCarloMethod::default(),
            confidence_level: defaults.confidence_level,
            preserve_correlation: false,
            block_size: 1,
            seed: None,
            distribution_bins: defaults.distribution_bins,
            ruin_threshold_pct: -20.0,
        }
    }

    /// 재표본 방식을 설정합니다.
    pub fn with_method(mut self, method: MonteCarloMethod) -> Self {
        self.method = method;
        self
    }

    /// 시뮬레이션 횟수를 설정합니다.
    pub fn with_simulations(mut self, num_simulations: usize) -> Self {
        self.num_simulations = num_simulations;
        self
    }

    /// 랜덤 시드를 설정합니다.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// 신뢰 수준을 설정합니다.
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    /// 블록 단위 추출을 켭니다.
    pub fn with_blocks(mut self, block_size: usize) -> Self {
        self.preserve_correlation = true;
        self.block_size = block_size;
        self
    }

    /// 히스토그램 구간 수를 설정합니다.
    pub fn with_bins(mut self, bins: usize) -> Self {
        self.distribution_bins = bins;
        self
    }

    /// 설정을 검증합니다.
    pub fn validate(&self) -> BacktestResult<()> {
        if self.num_simulations == 0 {
            return Err(BacktestError::InvalidConfig(
                "시뮬레이션 횟수는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.distribution_bins == 0 {
            return Err(BacktestError::InvalidConfig(
                "히스토그램 구간 수는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(BacktestError::InvalidConfig(
                "블록 크기는 1 이상이어야 합니다".to_string(),
            ));
        }
        if self.block_size > 1 && !self.preserve_correlation {
            return Err(BacktestError::InvalidConfig(format!(
                "블록 크기 {}는 preserve_correlation = true일 때만 사용됩니다",
                self.block_size
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(BacktestError::InvalidConfig(format!(
                "신뢰 수준은 0과 1 사이여야 합니다: {}",
                self.confidence_level
            )));
        }
        Ok(())
    }

    fn uses_blocks(&self) -> bool {
        self.preserve_correlation && self.block_size > 1
    }
}

/// 히스토그램 구간 `[lower, upper)` (마지막 구간은 `upper` 포함).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    /// 하한 (%)
    pub lower: f64,
    /// 상한 (%)
    pub upper: f64,
    /// 시뮬레이션 수
    pub count: usize,
}

/// 몬테카를로 분석 결과.
///
/// 수익률과 낙폭은 %, 확률은 0~1 비율입니다.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonteCarloResult {
    /// 시뮬레이션 횟수
    pub simulations: usize,
    /// 재표본 방식
    pub method: MonteCarloMethod,
    /// 원래 거래 순서의 복리 수익률
    pub original_return_pct: f64,
    /// 평균 수익률
    pub mean_return_pct: f64,
    /// 중앙값 수익률
    pub median_return_pct: f64,
    /// 수익률 표준편차 (모표준편차)
    pub std_dev_return_pct: f64,
    /// 신뢰 수준
    pub confidence_level: f64,
    /// 신뢰 구간 하한
    pub ci_lower_pct: f64,
    /// 신뢰 구간 상한
    pub ci_upper_pct: f64,
    /// 수익 확률
    pub probability_of_profit: f64,
    /// 파산 기준 이하 확률
    pub probability_of_ruin: f64,
    /// 최저 수익률
    pub worst_return_pct: f64,
    /// 최고 수익률
    pub best_return_pct: f64,
    /// 수익률 분포
    pub histogram: Vec<HistogramBin>,
    /// 경로별 최대 낙폭의 중앙값
    pub median_max_drawdown_pct: f64,
    /// 경로별 최대 낙폭의 최댓값
    pub worst_max_drawdown_pct: f64,
}

impl MonteCarloResult {
    /// 결과 요약을 문자열로 반환합니다.
    pub fn summary(&self) -> String {
        format!(
            "몬테카를로 분석 결과 ({:?}, {}회)\n\
             ═══════════════════════════════════════\n\
             원래 수익률: {:.2}%\n\
             평균 수익률: {:.2}%\n\
             중앙값 수익률: {:.2}%\n\
             표준편차: {:.2}%\n\
             {:.0}% 신뢰 구간: [{:.2}%, {:.2}%]\n\
             ───────────────────────────────────────\n\
             수익 확률: {:.1}%\n\
             파산 확률: {:.1}%\n\
             최대 낙폭 중앙값: {:.2}%\n\
             최악 최대 낙폭: {:.2}%\n\
             ═══════════════════════════════════════",
            self.method,
            self.simulations,
            self.original_return_pct,
            self.mean_return_pct,
            self.median_return_pct,
            self.std_dev_return_pct,
            self.confidence_level * 100.0,
            self.ci_lower_pct,
            self.ci_upper_pct,
            self.probability_of_profit * 100.0,
            self.probability_of_ruin * 100.0,
            self.median_max_drawdown_pct,
            self.worst_max_drawdown_pct,
        )
    }
}

/// 재표본 경로 생성기.
///
/// 원본 수익률과 설정으로 한 번 만들고, 시뮬레이션마다 경로 하나를 생성합니다.
#[derive(Debug, Clone)]
pub struct Resampler<'a> {
    returns: &'a [f64],
    method: MonteCarloMethod,
    block_size: Option<usize>,
    normal: Option<Normal>,
    mean: f64,
}

impl<'a> Resampler<'a> {
    /// 생성기를 만듭니다. 수익률은 비율(0.05 = 5%)입니다.
    pub fn new(returns: &'a [f64], config: &MonteCarloConfig) -> Self {
        let mean = if returns.is_empty() {
            0.0
        } else {
            returns.iter().mean()
        };
        // 표본이 2개 미만이거나 분산이 0이면 평균값만 생성
        let normal = if config.method == MonteCarloMethod::Parametric && returns.len() > 1 {
            let std_dev = returns.iter().std_dev();
            Normal::new(mean, std_dev).ok()
        } else {
            None
        };

        Self {
            returns,
            method: config.method,
            block_size: config.uses_blocks().then_some(config.block_size),
            normal,
            mean,
        }
    }

    /// 가상 경로 하나 (거래별 수익률 시퀀스).
    pub fn next_path(&self, rng: &mut StdRng) -> Vec<f64> {
        let n = self.returns.len();
        if n == 0 {
            return Vec::new();
        }

        match (self.method, self.block_size) {
            (MonteCarloMethod::Bootstrap, None) => {
                (0..n).map(|_| self.returns[rng.gen_range(0..n)]).collect()
            }
            (MonteCarloMethod::Bootstrap, Some(size)) => {
                let blocks: Vec<&[f64]> = self.returns.chunks(size).collect();
                let mut path = Vec::with_capacity(n);
                while path.len() < n {
                    let block = blocks[rng.gen_range(0..blocks.len())];
                    let take = block.len().min(n - path.len());
                    path.extend_from_slice(&block[..take]);
                }
                path
            }
            (MonteCarloMethod::Permutation, None) => {
                let mut path = self.returns.to_vec();
                path.shuffle(rng);
                path
            }
            (MonteCarloMethod::Permutation, Some(size)) => {
                let mut blocks: Vec<&[f64]> = self.returns.chunks(size).collect();
                blocks.shuffle(rng);
                blocks.concat()
            }
            (MonteCarloMethod::Parametric, _) => match &self.normal {
                // 한 거래에서 원금 이상 잃지 않음
                Some(normal) => (0..n).map(|_| rng.sample(normal).max(-1.0)).collect(),
                None => vec![self.mean.max(-1.0); n],
            },
        }
    }
}

/// 경로의 복리 수익률 (%)과 최대 낙폭 (%).
fn path_outcome(path: &[f64]) -> (f64, f64) {
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;

    for r in path {
        equity *= 1.0 + r;
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak * 100.0);
        }
    }

    ((equity - 1.0) * 100.0, max_dd)
}

/// 정렬된 값의 백분위수 (선형 보간). `p`는 0~1.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = p.clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// 정렬된 값의 등간격 히스토그램. 항상 `bins`개 구간을 반환합니다.
///
/// 값이 없으면 `[0, 0]` 구간, 최솟값과 최댓값이 같으면 `min` 위치의 폭 0 구간들을
/// 만들고 모든 값을 첫 구간에 담습니다.
pub fn histogram(sorted: &[f64], bins: usize) -> Vec<HistogramBin> {
    if bins == 0 {
        return Vec::new();
    }

    let (min, max) = match (sorted.first(), sorted.last()) {
        (Some(&min), Some(&max)) => (min, max),
        _ => (0.0, 0.0),
    };

    if max <= min {
        let mut result = vec![
            HistogramBin {
                lower: min,
                upper: min,
                count: 0,
            };
            bins
        ];
        result[0].count = sorted.len();
        return result;
    }

    let width = (max - min) / bins as f64;
    let mut result: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + width * i as f64,
            upper: if i + 1 == bins {
                max
            } else {
                min + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();

    for &value in sorted {
        let idx = (((value - min) / width) as usize).min(bins - 1);
        result[idx].count += 1;
    }

    result
}

fn sort_f64(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
}

/// 몬테카를로 분석기.
#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    config: MonteCarloConfig,
}

impl MonteCarloSimulator {
    /// 설정으로 분석기를 생성합니다.
    pub fn new(config: MonteCarloConfig) -> Self {
        Self { config }
    }

    /// 설정.
    pub fn config(&self) -> &MonteCarloConfig {
        &self.config
    }

    /// 백테스트 결과의 거래로 분석합니다.
    pub fn simulate(&self, report: &BacktestReport) -> BacktestResult<MonteCarloResult> {
        self.simulate_returns(&report.trade_returns())
    }

    /// 백테스트 결과의 거래로 분석합니다 (취소·진행률 제어).
    pub fn simulate_with_control(
        &self,
        report: &BacktestReport,
        control: &RunControl,
    ) -> BacktestResult<MonteCarloResult> {
        self.simulate_returns_with_control(&report.trade_returns(), control)
    }

    /// 거래별 수익률(비율) 목록으로 분석합니다.
    pub fn simulate_returns(&self, returns: &[f64]) -> BacktestResult<MonteCarloResult> {
        self.simulate_returns_with_control(returns, &RunControl::default())
    }

    /// 거래별 수익률 목록으로 분석합니다.
    ///
    /// 취소는 시뮬레이션마다 한 번 확인하며, 진행률은 (완료 시뮬레이션 수, 전체)입니다.
    #[instrument(
        name = "monte_carlo",
        skip_all,
        fields(method = ?self.config.method, simulations = self.config.num_simulations)
    )]
    pub fn simulate_returns_with_control(
        &self,
        returns: &[f64],
        control: &RunControl,
    ) -> BacktestResult<MonteCarloResult> {
        self.config.validate()?;

        if let Some(bad) = returns.iter().find(|r| !r.is_finite()) {
            return Err(BacktestError::InvalidConfig(format!(
                "유한하지 않은 거래 수익률: {}",
                bad
            )));
        }

        let total = self.config.num_simulations as u64;

        if returns.is_empty() {
            debug!("거래가 없어 분포를 0으로 보고합니다");
            control.report(total, total);
            return Ok(MonteCarloResult {
                simulations: self.config.num_simulations,
                method: self.config.method,
                confidence_level: self.config.confidence_level,
                histogram: histogram(
                    &vec![0.0; self.config.num_simulations],
                    self.config.distribution_bins,
                ),
                ..Default::default()
            });
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let resampler = Resampler::new(returns, &self.config);

        let mut outcomes = Vec::with_capacity(self.config.num_simulations);
        let mut drawdowns = Vec::with_capacity(self.config.num_simulations);
        for done in 0..self.config.num_simulations {
            control.check()?;
            let (ret, dd) = path_outcome(&resampler.next_path(&mut rng));
            outcomes.push(ret);
            drawdowns.push(dd);
            control.report(done as u64 + 1, total);
        }

        let result = self.summarize(returns, outcomes, drawdowns);
        info!(
            mean = result.mean_return_pct,
            ci_lower = result.ci_lower_pct,
            ci_upper = result.ci_upper_pct,
            probability_of_profit = result.probability_of_profit,
            "몬테카를로 분석 완료"
        );
        Ok(result)
    }

    fn summarize(
        &self,
        returns: &[f64],
        mut outcomes: Vec<f64>,
        mut drawdowns: Vec<f64>,
    ) -> MonteCarloResult {
        sort_f64(&mut outcomes);
        sort_f64(&mut drawdowns);

        let n = outcomes.len() as f64;
        let mean = outcomes.iter().sum::<f64>() / n;
        let variance = outcomes.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let profitable = outcomes.iter().filter(|&&r| r > 0.0).count();
        let ruined = outcomes
            .iter()
            .filter(|&&r| r < self.config.ruin_threshold_pct)
            .count();
        let tail = (1.0 - self.config.confidence_level) / 2.0;

        MonteCarloResult {
            simulations: outcomes.len(),
            method: self.config.method,
            original_return_pct: path_outcome(returns).0,
            mean_return_pct: mean,
            median_return_pct: percentile(&outcomes, 0.5),
            std_dev_return_pct: variance.sqrt(),
            confidence_level: self.config.confidence_level,
            ci_lower_pct: percentile(&outcomes, tail),
            ci_upper_pct: percentile(&outcomes, 1.0 - tail),
            probability_of_profit: profitable as f64 / n,
            probability_of_ruin: ruined as f64 / n,
            worst_return_pct: outcomes.first().copied().unwrap_or_default(),
            best_return_pct: outcomes.last().copied().unwrap_or_default(),
            histogram: histogram(&outcomes, self.config.distribution_bins),
            median_max_drawdown_pct: percentile(&drawdowns, 0.5),
            worst_max_drawdown_pct: drawdowns.last().copied().unwrap_or_default(),
        }
    }
}
