//! 파라미터 최적화 및 워크포워드 명령어.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use tracing::info;

use trader_analytics::{JobOutput, JobRequest, OptimizationConfig, WalkForwardConfig};
use trader_strategy::ParamValue;

use super::runner::{load_config_file, JobRunner};

/// 상위 후보 출력 개수.
const TOP_CANDIDATES: usize = 5;

/// 최적화 실행 시 덮어쓰기 항목.
#[derive(Debug, Clone, Default)]
pub struct SearchOverrides {
    /// 최대 평가 횟수
    pub max_runs: Option<usize>,
    /// 랜덤 시드
    pub seed: Option<u64>,
}

impl SearchOverrides {
    fn apply(&self, mut config: OptimizationConfig) -> OptimizationConfig {
        if let Some(max_runs) = self.max_runs {
            config = config.with_max_runs(max_runs);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config
    }
}

/// 설정 파일로 파라미터 최적화를 실행합니다.
pub async fn run_optimize(
    runner: &JobRunner,
    config_path: &Path,
    overrides: &SearchOverrides,
    output: Option<&Path>,
) -> Result<JobOutput> {
    let config = overrides.apply(load_config_file::<OptimizationConfig>(config_path)?);

    info!(
        strategy = %config.base.strategy_id,
        method = ?config.method,
        objective = ?config.objective,
        parameters = config.parameter_space.len(),
        max_runs = config.max_runs,
        "최적화 시작"
    );

    let output = runner
        .run_and_report(JobRequest::Optimize(config), output)
        .await?;

    if let JobOutput::Optimize(result) = &output {
        println!("\n상위 {}개 후보:", TOP_CANDIDATES);
        println!("───────────────────────────────────────────────");
        for (rank, candidate) in result.top(TOP_CANDIDATES).iter().enumerate() {
            println!(
                "  {}. {} = {}",
                rank + 1,
                format_params(&candidate.params),
                candidate.ranking_value()
            );
        }
    }

    Ok(output)
}

/// 설정 파일로 워크포워드 분석을 실행합니다.
pub async fn run_walk_forward(
    runner: &JobRunner,
    config_path: &Path,
    overrides: &SearchOverrides,
    output: Option<&Path>,
) -> Result<JobOutput> {
    let mut config = load_config_file::<WalkForwardConfig>(config_path)?;
    config.optimization = overrides.apply(config.optimization);

    // 윈도우 계획 오류는 작업 제출 전에 보고
    let plans = config.plan_windows()?;
    info!(
        strategy = %config.optimization.base.strategy_id,
        range = %config.analysis_range,
        windows = plans.len(),
        mode = ?config.mode,
        "워크포워드 분석 시작"
    );
    for plan in &plans {
        println!(
            "  윈도우 {}: IS {} / OOS {}",
            plan.index + 1,
            plan.in_sample,
            plan.out_of_sample
        );
    }

    runner
        .run_and_report(JobRequest::WalkForward(config), output)
        .await
}

/// 파라미터 조합을 `name=value` 목록으로 표시합니다.
pub fn format_params(params: &BTreeMap<String, ParamValue>) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use trader_analytics::BacktestConfig;
    use trader_core::{DateRange, Symbol};

    fn base() -> OptimizationConfig {
        OptimizationConfig::new(BacktestConfig::new(
            "sma_crossover",
            vec![Symbol::kr_stock("005930")],
            DateRange::from_days(NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(), 365),
        ))
    }

    #[test]
    fn test_format_params_sorted_by_name() {
        let params = BTreeMap::from([
            ("short_period".to_string(), ParamValue::Int(5)),
            ("long_period".to_string(), ParamValue::Int(20)),
        ]);
        assert_eq!(format_params(&params), "long_period=20, short_period=5");
        assert_eq!(format_params(&BTreeMap::new()), "");
    }

    #[test]
    fn test_search_overrides() {
        let overrides = SearchOverrides {
            max_runs: Some(12),
            seed: Some(42),
        };
        let config = overrides.apply(base());
        assert_eq!(config.max_runs, 12);
        assert_eq!(config.seed, Some(42));

        let untouched = SearchOverrides::default().apply(base());
        assert_eq!(untouched.max_runs, base().max_runs);
        assert_eq!(untouched.seed, None);
    }
}
