//! 몬테카를로 명령어.
//!
//! 저장된 백테스트 결과(JSON)의 거래 수익률을 재표본해 분포를 추정합니다.

use std::path::Path;

use anyhow::{anyhow, Result};
use tracing::info;

use trader_analytics::{BacktestReport, JobOutput, JobRequest, MonteCarloConfig, MonteCarloMethod};
use trader_core::MonteCarloDefaults;

use super::runner::{load_config_file, JobRunner};

/// 몬테카를로 실행 시 덮어쓰기 항목.
#[derive(Debug, Clone, Default)]
pub struct MonteCarloOverrides {
    /// 재표본 방식
    pub method: Option<MonteCarloMethod>,
    /// 시뮬레이션 횟수
    pub simulations: Option<usize>,
    /// 랜덤 시드
    pub seed: Option<u64>,
}

/// 설정 파일이 없으면 애플리케이션 기본값에서 시작해 설정을 구성합니다.
pub fn build_config(
    config_path: Option<&Path>,
    defaults: &MonteCarloDefaults,
    overrides: &MonteCarloOverrides,
) -> Result<MonteCarloConfig> {
    let mut config = match config_path {
        Some(path) => load_config_file::<MonteCarloConfig>(path)?,
        None => MonteCarloConfig::from_defaults(defaults),
    };

    if let Some(method) = overrides.method {
        config = config.with_method(method);
    }
    if let Some(simulations) = overrides.simulations {
        config = config.with_simulations(simulations);
    }
    if let Some(seed) = overrides.seed {
        config = config.with_seed(seed);
    }

    config.validate()?;
    Ok(config)
}

/// 재표본 방식 이름을 해석합니다.
pub fn parse_method(s: &str) -> Result<MonteCarloMethod> {
    match s.to_lowercase().as_str() {
        "bootstrap" => Ok(MonteCarloMethod::Bootstrap),
        "permutation" | "shuffle" => Ok(MonteCarloMethod::Permutation),
        "parametric" | "normal" => Ok(MonteCarloMethod::Parametric),
        other => Err(anyhow!(
            "알 수 없는 재표본 방식: {} (bootstrap, permutation, parametric)",
            other
        )),
    }
}

/// 백테스트 결과 파일에 대해 몬테카를로 분석을 실행합니다.
pub async fn run_monte_carlo(
    runner: &JobRunner,
    report_path: &Path,
    config: MonteCarloConfig,
    output: Option<&Path>,
) -> Result<JobOutput> {
    let report = load_config_file::<BacktestReport>(report_path)?;

    info!(
        strategy = %report.config.strategy_id,
        trades = report.trades.len(),
        method = ?config.method,
        simulations = config.num_simulations,
        "몬테카를로 분석 시작"
    );

    runner
        .run_and_report(
            JobRequest::MonteCarlo {
                report: Box::new(report),
                config,
            },
            output,
        )
        .await
}
