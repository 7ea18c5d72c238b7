//! 비동기 작업 레지스트리.
//!
//! 백테스트, 최적화, 워크포워드, 몬테카를로, 포트폴리오 실행을 작업으로 등록하고
//! 즉시 작업 ID를 반환합니다. 실제 계산은 CPU 집약적이므로
//! `tokio::task::spawn_blocking`으로 blocking thread pool에서 실행하며,
//! 동시에 실행되는 작업 수는 세마포어로 `max_workers`개까지 제한합니다.
//!
//! # 상태 전이
//!
//! ```text
//! QUEUED ──▶ RUNNING ──▶ SUCCEEDED
//!    │          ├──────▶ FAILED
//!    │          └──────▶ CANCELLED
//!    └─────────────────▶ CANCELLED
//! ```
//!
//! 종료 상태는 다시 바뀌지 않습니다. 상태 전이는 작업별 쓰기 잠금 안에서만 일어나므로
//! 외부에서 한 작업이 두 상태로 동시에 관찰되지 않습니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock as StdRwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backtest::{BacktestConfig, BacktestEngine, BacktestReport, ProgressSink, RunControl};
use crate::error::{BacktestError, BacktestResult, JobError};
use crate::monte_carlo::{MonteCarloConfig, MonteCarloResult, MonteCarloSimulator};
use crate::optimization::{OptimizationConfig, OptimizationResult, Optimizer};
use crate::portfolio::{PortfolioBacktester, PortfolioConfig, PortfolioResult};
use crate::walk_forward::{WalkForwardAnalyzer, WalkForwardConfig, WalkForwardResult};

/// 작업 ID.
pub type JobId = Uuid;

/// 작업 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// 대기 중
    Queued,
    /// 실행 중
    Running,
    /// 성공
    Succeeded,
    /// 실패
    Failed,
    /// 취소됨
    Cancelled,
}

impl JobStatus {
    /// 종료 상태 여부.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// `next`로 전이할 수 있는지 확인합니다.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Cancelled)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
        )
    }

    /// 상태 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 작업 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// 단일 백테스트
    Backtest,
    /// 파라미터 최적화
    Optimize,
    /// 워크포워드 분석
    WalkForward,
    /// 몬테카를로 분석
    MonteCarlo,
    /// 포트폴리오 백테스트
    Portfolio,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Backtest => "backtest",
            Self::Optimize => "optimize",
            Self::WalkForward => "walk_forward",
            Self::MonteCarlo => "monte_carlo",
            Self::Portfolio => "portfolio",
        };
        f.write_str(name)
    }
}

/// 작업 요청.
#[derive(Debug, Clone)]
pub enum JobRequest {
    /// 단일 백테스트
    Backtest(BacktestConfig),
    /// 파라미터 최적화
    Optimize(OptimizationConfig),
    /// 워크포워드 분석
    WalkForward(WalkForwardConfig),
    /// 기존 백테스트 결과에 대한 몬테카를로 분석
    MonteCarlo {
        /// 분석 대상 결과
        report: Box<BacktestReport>,
        /// 분석 설정
        config: MonteCarloConfig,
    },
    /// 포트폴리오 백테스트
    Portfolio(PortfolioConfig),
}

impl JobRequest {
    /// 작업 종류.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Backtest(_) => JobKind::Backtest,
            Self::Optimize(_) => JobKind::Optimize,
            Self::WalkForward(_) => JobKind::WalkForward,
            Self::MonteCarlo { .. } => JobKind::MonteCarlo,
            Self::Portfolio(_) => JobKind::Portfolio,
        }
    }

    /// 대상 전략 ID.
    pub fn strategy_id(&self) -> &str {
        match self {
            Self::Backtest(config) => &config.strategy_id,
            Self::Optimize(config) => &config.base.strategy_id,
            Self::WalkForward(config) => &config.optimization.base.strategy_id,
            Self::MonteCarlo { report, .. } => &report.config.strategy_id,
            Self::Portfolio(config) => &config.base.strategy_id,
        }
    }

    fn execute(self, engine: &BacktestEngine, control: &RunControl) -> BacktestResult<JobOutput> {
        Ok(match self {
            Self::Backtest(config) => {
                JobOutput::Backtest(Box::new(engine.run_with_control(&config, control)?))
            }
            Self::Optimize(config) => JobOutput::Optimize(Box::new(
                Optimizer::new(engine).run_with_control(&config, control)?,
            )),
            Self::WalkForward(config) => JobOutput::WalkForward(Box::new(
                WalkForwardAnalyzer::new(engine).run_with_control(&config, control)?,
            )),
            Self::MonteCarlo { report, config } => JobOutput::MonteCarlo(Box::new(
                MonteCarloSimulator::new(config).simulate_with_control(&report, control)?,
            )),
            Self::Portfolio(config) => JobOutput::Portfolio(Box::new(
                PortfolioBacktester::new(engine).run_with_control(&config, control)?,
            )),
        })
    }
}

/// 작업 결과.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum JobOutput {
    /// 백테스트 결과
    Backtest(Box<BacktestReport>),
    /// 최적화 결과
    Optimize(Box<OptimizationResult>),
    /// 워크포워드 결과
    WalkForward(Box<WalkForwardResult>),
    /// 몬테카를로 결과
    MonteCarlo(Box<MonteCarloResult>),
    /// 포트폴리오 결과
    Portfolio(Box<PortfolioResult>),
}

impl JobOutput {
    /// 결과 종류.
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Backtest(_) => JobKind::Backtest,
            Self::Optimize(_) => JobKind::Optimize,
            Self::WalkForward(_) => JobKind::WalkForward,
            Self::MonteCarlo(_) => JobKind::MonteCarlo,
            Self::Portfolio(_) => JobKind::Portfolio,
        }
    }

    /// 사람이 읽는 요약.
    pub fn summary(&self) -> String {
        match self {
            Self::Backtest(report) => report.summary(),
            Self::Optimize(result) => format!(
                "최적화 완료: {}개 평가 ({}개 실패), 최고 {:?} = {}\n{}",
                result.total_evaluations,
                result.failed_evaluations,
                result.objective,
                result.best_objective,
                result.best_result.summary()
            ),
            Self::WalkForward(result) => result.summary(),
            Self::MonteCarlo(result) => result.summary(),
            Self::Portfolio(result) => result.metrics.summary(),
        }
    }
}

/// 작업 진행 상황 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// 작업 ID
    pub job_id: JobId,
    /// 작업 종류
    pub kind: JobKind,
    /// 상태
    pub status: JobStatus,
    /// 진행률 (0~100)
    pub percent: f64,
    /// 완료 단위 수 (봉, 후보, 윈도우, 시뮬레이션)
    pub current: u64,
    /// 전체 단위 수
    pub total: u64,
    /// 상태 메시지
    pub message: Option<String>,
    /// 실패 사유
    pub error: Option<String>,
    /// 등록 시각
    pub submitted_at: DateTime<Utc>,
    /// 시작 시각
    pub started_at: Option<DateTime<Utc>>,
    /// 종료 시각
    pub finished_at: Option<DateTime<Utc>>,
}

/// 작업 하나의 공유 상태. 쓰기는 소유 워커와 `cancel`만 합니다.
struct JobSlot {
    progress: StdRwLock<JobProgress>,
    output: Mutex<Option<JobOutput>>,
    cancel: CancellationToken,
}

impl JobSlot {
    fn new(job_id: JobId, kind: JobKind, cancel: CancellationToken) -> Self {
        Self {
            progress: StdRwLock::new(JobProgress {
                job_id,
                kind,
                status: JobStatus::Queued,
                percent: 0.0,
                current: 0,
                total: 0,
                message: Some("대기 중".to_string()),
                error: None,
                submitted_at: Utc::now(),
                started_at: None,
                finished_at: None,
            }),
            output: Mutex::new(None),
            cancel,
        }
    }

    fn snapshot(&self) -> JobProgress {
        match self.progress.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn status(&self) -> JobStatus {
        match self.progress.read() {
            Ok(guard) => guard.status,
            Err(poisoned) => poisoned.into_inner().status,
        }
    }

    /// 상태를 전이합니다. 허용되지 않는 전이면 `false`.
    fn transition(&self, next: JobStatus, message: Option<String>, error: Option<String>) -> bool {
        let mut guard = match self.progress.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if !guard.status.can_transition_to(next) {
            debug!(job_id = %guard.job_id, from = %guard.status, to = %next, "무시된 상태 전이");
            return false;
        }

        let now = Utc::now();
        guard.status = next;
        guard.message = message;
        guard.error = error;
        match next {
            JobStatus::Running => guard.started_at = Some(now),
            JobStatus::Succeeded => {
                guard.percent = 100.0;
                guard.current = guard.total;
                guard.finished_at = Some(now);
            }
            JobStatus::Failed | JobStatus::Cancelled => guard.finished_at = Some(now),
            JobStatus::Queued => {}
        }
        true
    }

    /// 대기 중이면 즉시 취소합니다. 확인과 전이는 같은 잠금 안에서 일어납니다.
    fn cancel_queued(&self, message: &str) -> bool {
        let mut guard = match self.progress.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.status != JobStatus::Queued {
            return false;
        }
        guard.status = JobStatus::Cancelled;
        guard.message = Some(message.to_string());
        guard.finished_at = Some(Utc::now());
        true
    }

    fn complete(&self, output: JobOutput) {
        // SUCCEEDED 전이 전에 결과 저장
        if let Ok(mut slot) = self.output.lock() {
            *slot = Some(output);
        }
        if !self.transition(JobStatus::Succeeded, Some("완료".to_string()), None) {
            if let Ok(mut slot) = self.output.lock() {
                slot.take();
            }
        }
    }

    fn output(&self) -> Option<JobOutput> {
        self.output.lock().ok().and_then(|slot| slot.clone())
    }
}

/// 작업 슬롯에 진행률을 기록하는 수신자.
struct SlotProgress(Arc<JobSlot>);

impl ProgressSink for SlotProgress {
    fn report(&self, current: u64, total: u64) {
        let Ok(mut guard) = self.0.progress.write() else {
            return;
        };
        if guard.status != JobStatus::Running {
            return;
        }
        guard.current = current;
        guard.total = total;
        guard.percent = if total == 0 {
            0.0
        } else {
            current as f64 / total as f64 * 100.0
        };
    }
}

/// 비동기 작업 레지스트리.
///
/// `Clone`은 같은 레지스트리를 가리키는 핸들을 만듭니다.
#[derive(Clone)]
pub struct JobRegistry {
    engine: Arc<BacktestEngine>,
    jobs: Arc<RwLock<HashMap<JobId, Arc<JobSlot>>>>,
    workers: Arc<Semaphore>,
    max_workers: usize,
    shutdown: CancellationToken,
}

impl fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("max_workers", &self.max_workers)
            .field("available_workers", &self.workers.available_permits())
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl JobRegistry {
    /// 레지스트리를 생성합니다. `max_workers`는 최소 1입니다.
    pub fn new(engine: Arc<BacktestEngine>, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            engine,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            workers: Arc::new(Semaphore::new(max_workers)),
            max_workers,
            shutdown: CancellationToken::new(),
        }
    }

    /// 작업 엔진.
    pub fn engine(&self) -> &Arc<BacktestEngine> {
        &self.engine
    }

    /// 작업을 등록하고 ID를 즉시 반환합니다.
    ///
    /// tokio 런타임 안에서 호출해야 합니다.
    pub async fn submit(&self, request: JobRequest) -> Result<JobId, JobError> {
        if self.shutdown.is_cancelled() {
            return Err(JobError::Shutdown);
        }

        let job_id = Uuid::new_v4();
        let kind = request.kind();
        let slot = Arc::new(JobSlot::new(job_id, kind, self.shutdown.child_token()));
        self.jobs.write().await.insert(job_id, Arc::clone(&slot));

        info!(job_id = %job_id, kind = %kind, "작업 등록");

        let engine = Arc::clone(&self.engine);
        let workers = Arc::clone(&self.workers);
        tokio::spawn(run_job(engine, workers, slot, request));

        Ok(job_id)
    }

    /// 작업 진행 상황을 조회합니다.
    pub async fn progress(&self, job_id: JobId) -> Result<JobProgress, JobError> {
        Ok(self.slot(job_id).await?.snapshot())
    }

    /// 작업을 취소합니다.
    ///
    /// 대기 중인 작업은 즉시 `CANCELLED`가 되고, 실행 중인 작업은 다음 봉 확인 시점에
    /// 워커가 `CANCELLED`로 전이합니다. 종료된 작업은 그대로입니다.
    /// 호출 직후의 상태를 반환합니다.
    pub async fn cancel(&self, job_id: JobId) -> Result<JobStatus, JobError> {
        let slot = self.slot(job_id).await?;

        let status = slot.status();
        if status.is_terminal() {
            return Ok(status);
        }

        slot.cancel_queued("대기 중 취소");
        slot.cancel.cancel();
        info!(job_id = %job_id, "작업 취소 요청");

        Ok(slot.status())
    }

    /// 작업 결과를 조회합니다. `SUCCEEDED` 상태에서만 읽을 수 있습니다.
    pub async fn result(&self, job_id: JobId) -> Result<JobOutput, JobError> {
        let slot = self.slot(job_id).await?;
        match slot.status() {
            JobStatus::Succeeded => slot
                .output()
                .ok_or(JobError::NotReady(JobStatus::Succeeded)),
            status => Err(JobError::NotReady(status)),
        }
    }

    /// 모든 작업의 진행 상황 (등록 시각 순).
    pub async fn list(&self) -> Vec<JobProgress> {
        let mut all: Vec<JobProgress> = self
            .jobs
            .read()
            .await
            .values()
            .map(|slot| slot.snapshot())
            .collect();
        all.sort_by_key(|p| p.submitted_at);
        all
    }

    /// 종료된 작업을 레지스트리에서 제거하고 마지막 상태를 반환합니다.
    pub async fn remove(&self, job_id: JobId) -> Result<JobProgress, JobError> {
        let mut jobs = self.jobs.write().await;
        let slot = jobs.get(&job_id).ok_or(JobError::NotFound(job_id))?;

        let snapshot = slot.snapshot();
        if !snapshot.status.is_terminal() {
            return Err(JobError::NotReady(snapshot.status));
        }

        jobs.remove(&job_id);
        debug!(job_id = %job_id, "작업 제거");
        Ok(snapshot)
    }

    /// 작업이 종료될 때까지 `poll` 간격으로 기다립니다.
    pub async fn wait(&self, job_id: JobId, poll: Duration) -> Result<JobProgress, JobError> {
        loop {
            let progress = self.progress(job_id).await?;
            if progress.status.is_terminal() {
                return Ok(progress);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// 레지스트리를 종료합니다. 모든 작업을 취소하고 새 등록을 거부합니다.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        for slot in self.jobs.read().await.values() {
            slot.cancel_queued("레지스트리 종료");
        }
        info!("작업 레지스트리 종료");
    }

    async fn slot(&self, job_id: JobId) -> Result<Arc<JobSlot>, JobError> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(JobError::NotFound(job_id))
    }
}

/// 워커 슬롯을 얻어 작업을 실행합니다.
async fn run_job(
    engine: Arc<BacktestEngine>,
    workers: Arc<Semaphore>,
    slot: Arc<JobSlot>,
    request: JobRequest,
) {
    let job_id = slot.snapshot().job_id;

    let permit = tokio::select! {
        permit = workers.acquire_owned() => permit,
        _ = slot.cancel.cancelled() => {
            slot.cancel_queued("대기 중 취소");
            return;
        }
    };
    let Ok(_permit) = permit else {
        slot.cancel_queued("레지스트리 종료");
        return;
    };

    // 대기 중에 취소되었으면 실행하지 않음
    if !slot.transition(JobStatus::Running, Some("실행 중".to_string()), None) {
        return;
    }
    debug!(job_id = %job_id, "작업 시작");

    let control = RunControl::new()
        .with_cancel(slot.cancel.clone())
        .with_progress(Arc::new(SlotProgress(Arc::clone(&slot))));
    let strategy = request.strategy_id().to_string();
    let outcome = tokio::task::spawn_blocking(move || {
        let span = trader_core::backtest_span!("job", strategy, job_id);
        let _enter = span.enter();
        request.execute(&engine, &control)
    })
    .await;

    match outcome {
        Ok(Ok(output)) => {
            slot.complete(output);
            info!(job_id = %job_id, "작업 완료");
        }
        Ok(Err(BacktestError::Cancelled)) => {
            slot.transition(JobStatus::Cancelled, Some("취소됨".to_string()), None);
            info!(job_id = %job_id, "작업 취소됨");
        }
        Ok(Err(e)) => {
            warn!(job_id = %job_id, error = %e, "작업 실패");
            slot.transition(JobStatus::Failed, Some("실패".to_string()), Some(e.to_string()));
        }
        Err(join_error) => {
            error!(job_id = %job_id, error = %join_error, "작업 스레드 비정상 종료");
            slot.transition(
                JobStatus::Failed,
                Some("실패".to_string()),
                Some(format!("작업 스레드 비정상 종료: {}", join_error)),
            );
        }
    }
}
