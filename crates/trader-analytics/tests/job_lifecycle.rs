//! 작업 레지스트리 통합 테스트.
//!
//! 실행 중 취소, 작업 연쇄(백테스트 → 몬테카를로), 최적화 작업의 진행률을 검증합니다.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use trader_analytics::backtest::{BacktestConfig, BacktestEngine};
use trader_analytics::jobs::{JobKind, JobOutput, JobRegistry, JobRequest, JobStatus};
use trader_analytics::monte_carlo::{MonteCarloConfig, MonteCarloMethod};
use trader_analytics::optimization::OptimizationConfig;
use trader_analytics::JobError;
use trader_core::{DateRange, Kline, Symbol, Timeframe};
use trader_data::{generate_klines, InMemoryBarProvider};
use trader_strategy::{
    Decision, ParamSpec, ParamValue, Strategy, StrategyParams, StrategyRegistry, StrategyResult,
};

const BARS: usize = 2000;
const POLL: Duration = Duration::from_millis(5);

/// 봉마다 1ms 대기하는 전략.
struct SleepyStrategy;

impl Strategy for SleepyStrategy {
    fn id(&self) -> &str {
        "sleepy"
    }

    fn name(&self) -> &str {
        "Sleepy"
    }

    fn description(&self) -> &str {
        "봉마다 1ms 대기 후 관망"
    }

    fn schema(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    fn min_bars(&self, _params: &StrategyParams) -> usize {
        1
    }

    fn evaluate(&self, _window: &[Kline], _params: &StrategyParams) -> StrategyResult<Decision> {
        std::thread::sleep(Duration::from_millis(1));
        Ok(Decision::hold())
    }
}

fn registry() -> JobRegistry {
    let symbol = Symbol::kr_stock("035420");
    let start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
    let klines = generate_klines(&symbol, Timeframe::D1, start, BARS, dec!(200000), 0.02, 99);

    let mut strategies = StrategyRegistry::with_builtins();
    strategies.register(Arc::new(SleepyStrategy), &[]);
    let engine = BacktestEngine::new(
        Arc::new(InMemoryBarProvider::new().with_klines(klines)),
        Arc::new(strategies),
    );
    JobRegistry::new(Arc::new(engine), 2)
}

fn config(strategy: &str) -> BacktestConfig {
    BacktestConfig::new(
        strategy,
        vec![Symbol::kr_stock("035420")],
        DateRange::from_days(NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(), BARS as i64),
    )
}

#[tokio::test]
async fn test_cancel_running_job_mid_replay() {
    let registry = registry();
    let id = registry
        .submit(JobRequest::Backtest(config("sleepy")))
        .await
        .unwrap();

    // 리플레이가 실제로 진행 중일 때 취소
    loop {
        let progress = registry.progress(id).await.unwrap();
        if progress.status == JobStatus::Running && progress.current > 0 {
            break;
        }
        tokio::time::sleep(POLL).await;
    }
    registry.cancel(id).await.unwrap();

    let progress = tokio::time::timeout(Duration::from_secs(2), registry.wait(id, POLL))
        .await
        .expect("cancellation should be observed within a few bars")
        .unwrap();

    assert_eq!(progress.status, JobStatus::Cancelled);
    assert!(progress.current < BARS as u64);
    assert!(progress.finished_at.is_some());
    assert_eq!(
        registry.result(id).await.unwrap_err(),
        JobError::NotReady(JobStatus::Cancelled)
    );

    // 종료된 작업의 재취소는 상태를 바꾸지 않음
    assert_eq!(registry.cancel(id).await.unwrap(), JobStatus::Cancelled);
}

#[tokio::test]
async fn test_backtest_then_monte_carlo_jobs() {
    let registry = registry();
    let backtest = registry
        .submit(JobRequest::Backtest(
            config("sma_crossover")
                .with_param("short_period", 5)
                .with_param("long_period", 20),
        ))
        .await
        .unwrap();
    assert_eq!(
        registry.wait(backtest, POLL).await.unwrap().status,
        JobStatus::Succeeded
    );

    let JobOutput::Backtest(report) = registry.result(backtest).await.unwrap() else {
        panic!("expected backtest output");
    };
    assert!(!report.trades.is_empty());

    let mc = registry
        .submit(JobRequest::MonteCarlo {
            report: report.clone(),
            config: MonteCarloConfig::default()
                .with_method(MonteCarloMethod::Bootstrap)
                .with_simulations(2_000)
                .with_seed(42),
        })
        .await
        .unwrap();
    let progress = registry.wait(mc, POLL).await.unwrap();
    assert_eq!(progress.status, JobStatus::Succeeded);
    assert_eq!(progress.kind, JobKind::MonteCarlo);
    assert_eq!(progress.total, 2_000);

    match registry.result(mc).await.unwrap() {
        JobOutput::MonteCarlo(result) => {
            assert_eq!(result.simulations, 2_000);
            assert!(result.ci_lower_pct <= result.ci_upper_pct);
            assert!(result.original_return_pct.is_finite());
        }
        other => panic!("unexpected output: {}", other.kind()),
    }
}

#[tokio::test]
async fn test_optimize_job_reports_candidate_progress() {
    let registry = registry();
    let optimization = OptimizationConfig::new(config("sma_crossover"))
        .with_parameter(
            "short_period",
            vec![ParamValue::Int(5), ParamValue::Int(10)],
        )
        .with_parameter(
            "long_period",
            vec![ParamValue::Int(20), ParamValue::Int(30)],
        );

    let id = registry
        .submit(JobRequest::Optimize(optimization))
        .await
        .unwrap();
    let progress = registry.wait(id, POLL).await.unwrap();

    assert_eq!(progress.status, JobStatus::Succeeded);
    assert_eq!(progress.current, 4);
    assert_eq!(progress.total, 4);
    assert_eq!(progress.percent, 100.0);

    let output = registry.result(id).await.unwrap();
    assert_eq!(output.kind(), JobKind::Optimize);
    let json = serde_json::to_value(&output).unwrap();
    assert_eq!(json["total_evaluations"], 4);
}

#[tokio::test]
async fn test_invalid_config_fails_job() {
    let registry = registry();
    let id = registry
        .submit(JobRequest::Backtest(
            config("sma_crossover").with_initial_capital(dec!(0)),
        ))
        .await
        .unwrap();

    let progress = registry.wait(id, POLL).await.unwrap();
    assert_eq!(progress.status, JobStatus::Failed);
    assert!(progress.error.is_some());
}
