//! 백테스트 시뮬레이션 및 분석 엔진.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 봉 재생 시뮬레이터 (체결, 회계, 강제 청산)
//! - 성과 지표 계산
//! - 파라미터 최적화 (그리드, 랜덤)
//! - 워크포워드 분석
//! - 몬테카를로 재표본 분석
//! - 포트폴리오 백테스트
//! - 취소 가능한 비동기 작업 레지스트리
//!
//! # Re-exports
//!
//! - [`backtest`]: 백테스트 설정, 엔진, 결과
//! - [`performance`]: 성과 지표 (PerformanceMetrics, MetricsConfig)
//! - [`jobs`]: 작업 레지스트리 (JobRegistry, JobProgress)

pub mod backtest;
pub mod error;
pub mod jobs;
pub mod monte_carlo;
pub mod optimization;
pub mod performance;
pub mod portfolio;
pub mod walk_forward;

pub use backtest::{
    Account, BacktestConfig, BacktestEngine, BacktestReport, EquityPoint, ProgressSink,
    RunControl, Trade,
};
pub use error::{BacktestError, BacktestResult, JobError};
pub use jobs::{JobId, JobKind, JobOutput, JobProgress, JobRegistry, JobRequest, JobStatus};
pub use monte_carlo::{
    HistogramBin, MonteCarloConfig, MonteCarloMethod, MonteCarloResult, MonteCarloSimulator,
};
pub use optimization::{
    CandidateResult, OptimizationConfig, OptimizationMethod, OptimizationObjective,
    OptimizationResult, Optimizer, ParameterSpace,
};
pub use performance::{MetricsConfig, PerformanceMetrics, TRADING_DAYS_PER_YEAR};
pub use portfolio::{Allocation, PortfolioBacktester, PortfolioConfig, PortfolioResult};
pub use walk_forward::{
    WalkForwardAnalyzer, WalkForwardConfig, WalkForwardResult, WalkForwardWindow, WindowMode,
};
