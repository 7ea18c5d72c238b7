//! 전략 파라미터 최적화.
//!
//! 파라미터 후보 공간에서 조합을 만들어 시뮬레이터로 하나씩 평가하고,
//! 목적 함수 값이 가장 큰 조합을 고릅니다.
//!
//! # 탐색 방식
//!
//! - **그리드 탐색**: 파라미터 이름의 사전순으로 곱집합을 만들고 마지막 이름이 가장 빠르게 바뀝니다.
//!   `max_runs`에 도달하면 생성 순서대로 멈춥니다.
//! - **랜덤 탐색**: 같은 공간에서 `max_runs`개를 비복원 추출합니다.
//!   공간이 요청 수보다 작을 때만 복원 추출합니다. 시드가 같으면 순서도 같습니다.
//!
//! 후보는 순차 평가하며, 한 후보의 실패는 기록만 하고 탐색을 계속합니다.
//! 최고 후보는 후보 스트림에 대한 fold로 정하며 동점이면 먼저 나온 후보가 이깁니다.
//!
//! # 예제
//!
//! ```rust,ignore
//! let config = OptimizationConfig::new(base)
//!     .with_parameter("short_period", vec![5i64.into(), 10i64.into()])
//!     .with_parameter("long_period", vec![20i64.into(), 30i64.into()]);
//! let result = Optimizer::new(&engine).run(&config)?;
//! println!("{:?} → {}", result.best_params, result.best_objective);
//! ```

use std::collections::BTreeMap;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use trader_strategy::ParamValue;

use crate::backtest::{BacktestConfig, BacktestEngine, BacktestReport, RunControl};
use crate::error::{BacktestError, BacktestResult};
use crate::performance::PerformanceMetrics;

/// 탐색 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMethod {
    /// 전체 곱집합 순회
    #[default]
    GridSearch,
    /// 균등 무작위 추출
    RandomSearch,
}

/// 최대화할 목적 함수.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationObjective {
    /// 샤프 비율
    #[default]
    SharpeRatio,
    /// 프로핏 팩터
    ProfitFactor,
    /// 총 수익률
    TotalReturn,
    /// 승률
    WinRate,
    /// 최대 낙폭 (작을수록 좋으므로 부호를 뒤집어 최대화)
    MaxDrawdown,
}

impl OptimizationObjective {
    /// 성과 지표에서 목적 함수 값을 계산합니다.
    pub fn score(&self, metrics: &PerformanceMetrics) -> Decimal {
        match self {
            Self::SharpeRatio => metrics.sharpe_ratio,
            Self::ProfitFactor => metrics.profit_factor,
            Self::TotalReturn => metrics.total_return_pct,
            Self::WinRate => metrics.win_rate_pct,
            Self::MaxDrawdown => -metrics.max_drawdown_pct,
        }
    }
}

fn default_max_runs() -> usize {
    100
}

/// 최적화 설정.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConfig {
    /// 후보마다 파라미터만 바꿔 실행할 기본 설정
    pub base: BacktestConfig,

    /// 파라미터 이름 → 후보 값 목록
    pub parameter_space: BTreeMap<String, Vec<ParamValue>>,

    /// 탐색 방식
    #[serde(default)]
    pub method: OptimizationMethod,

    /// 목적 함수
    #[serde(default)]
    pub objective: OptimizationObjective,

    /// 최대 평가 횟수
    #[serde(default = "default_max_runs")]
    pub max_runs: usize,

    /// 랜덤 탐색 시드 (없으면 엔트로피에서 생성)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl OptimizationConfig {
    /// 빈 파라미터 공간으로 설정을 생성합니다.
    pub fn new(base: BacktestConfig) -> Self {
        Self {
            base,
            parameter_space: BTreeMap::new(),
            method: OptimizationMethod::default(),
            objective: OptimizationObjective::default(),
            max_runs: default_max_runs(),
            seed: None,
        }
    }

    /// 파라미터 후보 목록을 추가합니다.
    pub fn with_parameter(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.parameter_space.insert(name.into(), values);
        self
    }

    /// 탐색 방식을 설정합니다.
    pub fn with_method(mut self, method: OptimizationMethod) -> Self {
        self.method = method;
        self
    }

    /// 목적 함수를 설정합니다.
    pub fn with_objective(mut self, objective: OptimizationObjective) -> Self {
        self.objective = objective;
        self
    }

    /// 최대 평가 횟수를 설정합니다.
    pub fn with_max_runs(mut self, max_runs: usize) -> Self {
        self.max_runs = max_runs;
        self
    }

    /// 랜덤 시드를 설정합니다.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// 기본 설정의 기간만 바꾼 복사본.
    pub fn with_base_range(mut self, range: trader_core::DateRange) -> Self {
        self.base = self.base.with_range(range);
        self
    }
}

/// 파라미터 후보 공간 (이름 사전순).
#[derive(Debug, Clone)]
pub struct ParameterSpace {
    names: Vec<String>,
    values: Vec<Vec<ParamValue>>,
    size: usize,
}

impl ParameterSpace {
    /// 후보 맵으로 공간을 만듭니다.
    ///
    /// 맵이 비었거나 후보가 없는 파라미터가 있으면 `EmptyParameterSpace`.
    pub fn new(space: &BTreeMap<String, Vec<ParamValue>>) -> BacktestResult<Self> {
        if space.is_empty() {
            return Err(BacktestError::EmptyParameterSpace(
                "최적화할 파라미터가 없습니다".to_string(),
            ));
        }

        if let Some((name, _)) = space.iter().find(|(_, values)| values.is_empty()) {
            return Err(BacktestError::EmptyParameterSpace(format!(
                "'{}' 후보 값이 없습니다",
                name
            )));
        }

        // usize를 넘는 공간은 앞부분만 인덱싱
        let size = space
            .values()
            .try_fold(1usize, |acc, values| acc.checked_mul(values.len()))
            .unwrap_or(usize::MAX);

        Ok(Self {
            names: space.keys().cloned().collect(),
            values: space.values().cloned().collect(),
            size,
        })
    }

    /// 전체 조합 수.
    pub fn size(&self) -> usize {
        self.size
    }

    /// 파라미터 이름 목록 (사전순).
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 생성 순서상 `index`번째 조합. 마지막 이름이 가장 빠르게 바뀝니다.
    pub fn combination(&self, index: usize) -> BTreeMap<String, ParamValue> {
        let mut rest = index;
        let mut picked = vec![0usize; self.names.len()];
        for (slot, values) in picked.iter_mut().zip(&self.values).rev() {
            *slot = rest % values.len();
            rest /= values.len();
        }

        self.names
            .iter()
            .zip(&self.values)
            .zip(picked)
            .map(|((name, values), i)| (name.clone(), values[i].clone()))
            .collect()
    }

    /// 그리드 탐색 순서 (최대 `max_runs`개).
    pub fn grid_indices(&self, max_runs: usize) -> Vec<usize> {
        (0..self.size.min(max_runs)).collect()
    }

    /// 랜덤 탐색 순서 (`max_runs`개).
    pub fn random_indices(&self, max_runs: usize, rng: &mut StdRng) -> Vec<usize> {
        if self.size >= max_runs {
            rand::seq::index::sample(rng, self.size, max_runs).into_vec()
        } else {
            (0..max_runs).map(|_| rng.gen_range(0..self.size)).collect()
        }
    }
}

/// 후보 하나의 평가 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    /// 후보 파라미터 (탐색 대상 파라미터만)
    pub params: BTreeMap<String, ParamValue>,
    /// 목적 함수 값 (실패 시 없음)
    pub objective: Option<Decimal>,
    /// 성과 지표 (실패 시 없음)
    pub metrics: Option<PerformanceMetrics>,
    /// 실패 사유
    pub error: Option<String>,
}

impl CandidateResult {
    /// 비교용 값. 실패한 후보는 최악값입니다.
    pub fn ranking_value(&self) -> Decimal {
        self.objective.unwrap_or(Decimal::MIN)
    }
}

/// 최적화 결과.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// 탐색 방식
    pub method: OptimizationMethod,
    /// 목적 함수
    pub objective: OptimizationObjective,
    /// 최고 후보 파라미터
    pub best_params: BTreeMap<String, ParamValue>,
    /// 최고 목적 함수 값
    pub best_objective: Decimal,
    /// 최고 후보의 백테스트 결과
    pub best_result: BacktestReport,
    /// 평가한 후보 수
    pub total_evaluations: usize,
    /// 실패한 후보 수
    pub failed_evaluations: usize,
    /// 평가 순서대로 기록한 후보 결과
    pub evaluations: Vec<CandidateResult>,
    /// 실행 시간 (밀리초)
    pub duration_ms: u64,
}

impl OptimizationResult {
    /// 성공한 후보를 목적 함수 내림차순으로 상위 `n`개 반환합니다.
    pub fn top(&self, n: usize) -> Vec<&CandidateResult> {
        let mut ranked: Vec<&CandidateResult> = self
            .evaluations
            .iter()
            .filter(|c| c.objective.is_some())
            .collect();
        // 안정 정렬이므로 동점은 평가 순서 유지
        ranked.sort_by(|a, b| b.ranking_value().cmp(&a.ranking_value()));
        ranked.truncate(n);
        ranked
    }
}

/// 최고 후보 fold 상태.
struct Best {
    index: usize,
    objective: Decimal,
    report: BacktestReport,
}

/// 파라미터 최적화기.
#[derive(Debug, Clone, Copy)]
pub struct Optimizer<'a> {
    engine: &'a BacktestEngine,
}

impl<'a> Optimizer<'a> {
    /// 엔진을 사용하는 최적화기를 생성합니다.
    pub fn new(engine: &'a BacktestEngine) -> Self {
        Self { engine }
    }

    /// 최적화를 실행합니다.
    pub fn run(&self, config: &OptimizationConfig) -> BacktestResult<OptimizationResult> {
        self.run_with_control(config, &RunControl::default())
    }

    /// 취소·진행률 제어와 함께 최적화를 실행합니다.
    ///
    /// 진행률은 (평가 완료 후보 수, 계획된 후보 수)로 보고합니다.
    #[instrument(
        name = "optimize",
        skip_all,
        fields(strategy = %config.base.strategy_id, method = ?config.method)
    )]
    pub fn run_with_control(
        &self,
        config: &OptimizationConfig,
        control: &RunControl,
    ) -> BacktestResult<OptimizationResult> {
        let started = Instant::now();
        let indices = self.plan(config)?;
        let space = ParameterSpace::new(&config.parameter_space)?;
        let total = indices.len() as u64;
        let inner = control.silent();

        info!(
            space = space.size(),
            planned = indices.len(),
            objective = ?config.objective,
            "최적화 시작"
        );

        let mut evaluations: Vec<CandidateResult> = Vec::with_capacity(indices.len());
        let mut best: Option<Best> = None;

        for (done, &index) in indices.iter().enumerate() {
            control.check()?;

            let candidate = space.combination(index);
            let mut params = config.base.params.clone();
            params.extend(candidate.clone());
            let run_config = config.base.clone().with_params(params);

            match self.engine.run_with_control(&run_config, &inner) {
                Ok(report) => {
                    let objective = config.objective.score(&report.metrics);
                    debug!(candidate = done, objective = %objective, "후보 평가 완료");

                    let current = best.as_ref().map_or(Decimal::MIN, |b| b.objective);
                    if best.is_none() || objective > current {
                        best = Some(Best {
                            index: evaluations.len(),
                            objective,
                            report: report.clone(),
                        });
                    }

                    evaluations.push(CandidateResult {
                        params: candidate,
                        objective: Some(objective),
                        metrics: Some(report.metrics),
                        error: None,
                    });
                }
                Err(e) if e.is_candidate_failure() => {
                    warn!(candidate = done, error = %e, "후보 평가 실패");
                    evaluations.push(CandidateResult {
                        params: candidate,
                        objective: None,
                        metrics: None,
                        error: Some(e.to_string()),
                    });
                }
                Err(e) => return Err(e),
            }

            control.report(done as u64 + 1, total);
        }

        let failed_evaluations = evaluations.iter().filter(|c| c.error.is_some()).count();
        let Some(best) = best else {
            let reason = evaluations
                .iter()
                .find_map(|c| c.error.clone())
                .unwrap_or_default();
            return Err(BacktestError::SimulationFailure(format!(
                "모든 후보 평가 실패 ({}개): {}",
                evaluations.len(),
                reason
            )));
        };

        let best_params = evaluations[best.index].params.clone();
        info!(
            evaluations = evaluations.len(),
            failed = failed_evaluations,
            best_objective = %best.objective,
            "최적화 완료"
        );

        Ok(OptimizationResult {
            method: config.method,
            objective: config.objective,
            best_params,
            best_objective: best.objective,
            best_result: best.report,
            total_evaluations: evaluations.len(),
            failed_evaluations,
            evaluations,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// 설정을 검증하고 평가할 조합 인덱스를 생성 순서대로 반환합니다.
    ///
    /// 백테스트를 실행하기 전에 모든 설정 오류를 드러냅니다.
    pub fn plan(&self, config: &OptimizationConfig) -> BacktestResult<Vec<usize>> {
        config.base.validate()?;

        if config.max_runs == 0 {
            return Err(BacktestError::InvalidConfig(
                "max_runs는 1 이상이어야 합니다".to_string(),
            ));
        }

        let space = ParameterSpace::new(&config.parameter_space)?;

        let strategy = self.engine.strategy(&config.base.strategy_id)?;
        let schema = strategy.schema();
        if let Some(unknown) = space
            .names()
            .iter()
            .find(|name| !schema.iter().any(|spec| &spec.name == *name))
        {
            return Err(BacktestError::InvalidConfig(format!(
                "전략 '{}'에 없는 파라미터: {}",
                strategy.id(),
                unknown
            )));
        }

        Ok(match config.method {
            OptimizationMethod::GridSearch => space.grid_indices(config.max_runs),
            OptimizationMethod::RandomSearch => {
                let mut rng = match config.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                space.random_indices(config.max_runs, &mut rng)
            }
        })
    }
}
