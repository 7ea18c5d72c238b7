//! 작업 실행기.
//!
//! 요청을 [`JobRegistry`]에 제출하고 진행률을 폴링하면서 진행 막대를 갱신합니다.
//! Ctrl-C를 누르면 실행 중인 작업에 취소를 요청하고 작업이 종료될 때까지 기다립니다.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use trader_analytics::{
    BacktestEngine, JobOutput, JobProgress, JobRegistry, JobRequest, JobStatus, MetricsConfig,
};
use trader_core::AppConfig;
use trader_data::CsvBarProvider;
use trader_strategy::StrategyRegistry;

/// 설정 파일을 로드합니다.
///
/// 확장자로 형식을 고릅니다 (`.toml` 또는 `.json`).
pub fn load_config_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(anyhow!("설정 파일을 찾을 수 없습니다: {}", path.display()));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("설정 파일 읽기 실패: {}", path.display()))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("TOML 파싱 실패: {}", path.display())),
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("JSON 파싱 실패: {}", path.display())),
        _ => Err(anyhow!(
            "지원하지 않는 설정 형식입니다. .toml 또는 .json을 사용하세요: {}",
            path.display()
        )),
    }
}

/// 결과를 JSON 파일로 저장합니다.
pub fn write_output<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("결과 저장 실패: {}", path.display()))?;
    info!(path = %path.display(), "결과 저장 완료");
    Ok(())
}

/// 작업 레지스트리를 감싼 CLI 실행기.
pub struct JobRunner {
    registry: JobRegistry,
    poll_interval: Duration,
    show_progress: bool,
}

impl JobRunner {
    /// 애플리케이션 설정으로 실행기를 만듭니다.
    ///
    /// 캔들은 `data.csv_dir`의 CSV 파일에서 읽습니다.
    pub fn from_config(config: &AppConfig) -> Self {
        let provider = CsvBarProvider::new(&config.data.csv_dir);
        let engine = BacktestEngine::new(
            Arc::new(provider),
            Arc::new(StrategyRegistry::with_builtins()),
        )
        .with_metrics_config(MetricsConfig::from(&config.backtest));

        Self::new(
            engine,
            config.jobs.max_workers,
            Duration::from_millis(config.jobs.poll_interval_ms),
        )
    }

    /// 엔진으로 실행기를 만듭니다.
    pub fn new(engine: BacktestEngine, max_workers: usize, poll_interval: Duration) -> Self {
        Self {
            registry: JobRegistry::new(Arc::new(engine), max_workers),
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            show_progress: true,
        }
    }

    /// 진행 막대 표시 여부를 설정합니다.
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// 내부 작업 레지스트리.
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// 작업을 제출하고 끝날 때까지 기다립니다.
    ///
    /// 취소되거나 실패한 작업은 에러로 돌려줍니다.
    pub async fn run(&self, request: JobRequest) -> Result<JobOutput> {
        let kind = request.kind();
        let strategy = request.strategy_id().to_string();
        let job_id = self.registry.submit(request).await?;
        info!(%job_id, kind = %kind, strategy = %strategy, "작업 제출");

        let pb = self.progress_bar()?;
        let mut ticker = tokio::time::interval(self.poll_interval);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut cancel_requested = false;

        let progress = loop {
            tokio::select! {
                _ = &mut ctrl_c, if !cancel_requested => {
                    warn!(%job_id, "Ctrl-C 감지, 작업 취소 요청");
                    cancel_requested = true;
                    self.registry.cancel(job_id).await?;
                }
                _ = ticker.tick() => {
                    let progress = self.registry.progress(job_id).await?;
                    update_bar(&pb, &progress);
                    if progress.status.is_terminal() {
                        break progress;
                    }
                }
            }
        };

        match progress.status {
            JobStatus::Succeeded => {
                pb.finish_with_message("완료");
                info!(%job_id, "작업 완료");
                Ok(self.registry.result(job_id).await?)
            }
            JobStatus::Cancelled => {
                pb.abandon_with_message("취소됨");
                bail!("작업이 취소되었습니다: {}", job_id)
            }
            _ => {
                pb.abandon_with_message("실패");
                bail!(
                    "작업 실패 ({}): {}",
                    job_id,
                    progress.error.unwrap_or_else(|| "알 수 없는 오류".to_string())
                )
            }
        }
    }

    /// 작업을 실행하고 요약을 출력합니다. 경로가 주어지면 결과를 JSON으로 저장합니다.
    pub async fn run_and_report(
        &self,
        request: JobRequest,
        output: Option<&Path>,
    ) -> Result<JobOutput> {
        let result = self.run(request).await?;

        println!("{}", result.summary());
        if let Some(path) = output {
            write_output(&result, path)?;
            println!("결과 저장 위치: {}", path.display());
        }

        Ok(result)
    }

    fn progress_bar(&self) -> Result<ProgressBar> {
        if !self.show_progress {
            return Ok(ProgressBar::hidden());
        }

        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )?
                .progress_chars("#>-"),
        );
        Ok(pb)
    }
}

fn update_bar(pb: &ProgressBar, progress: &JobProgress) {
    if progress.total > 0 {
        pb.set_length(progress.total);
    }
    pb.set_position(progress.current);
    if let Some(message) = &progress.message {
        pb.set_message(message.clone());
    }
}
