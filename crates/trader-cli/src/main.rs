//! 백테스트 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 단일 백테스트
//! trader backtest -c config/backtest/sma.toml -o reports/sma.json
//!
//! # 그리드 최적화
//! trader optimize -c config/optimize/sma_grid.toml
//!
//! # 워크포워드 분석
//! trader walk-forward -c config/walk_forward/sma.toml
//!
//! # 저장된 결과에 대한 몬테카를로 분석
//! trader monte-carlo --report reports/sma.json --method bootstrap --seed 42
//!
//! # 등록된 전략 목록
//! trader strategies
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{error, info};

use trader_cli::commands::backtest::{run_backtest, run_portfolio, BacktestOverrides};
use trader_cli::commands::monte_carlo::{build_config, parse_method, run_monte_carlo, MonteCarloOverrides};
use trader_cli::commands::optimize::{run_optimize, run_walk_forward, SearchOverrides};
use trader_cli::commands::strategies::print_strategies;
use trader_cli::JobRunner;
use trader_core::{init_logging, AppConfig, LogConfig};
use trader_strategy::StrategyRegistry;

#[derive(Parser)]
#[command(name = "trader")]
#[command(about = "한국 주식 백테스트 및 전략 최적화 CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// 애플리케이션 설정 파일 (TOML)
    #[arg(long, global = true, default_value = "config/default.toml")]
    app_config: PathBuf,

    /// 상세 로그 출력
    #[arg(short, long, global = true)]
    verbose: bool,

    /// 진행 막대 숨김
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 단일 백테스트 실행
    Backtest {
        /// 백테스트 설정 파일 (.toml 또는 .json)
        #[arg(short, long)]
        config: PathBuf,

        /// 전략 ID (설정 파일 값 대신 사용)
        #[arg(short, long)]
        strategy: Option<String>,

        /// 초기 자본금 (설정 파일 값 대신 사용)
        #[arg(long)]
        capital: Option<Decimal>,

        /// 결과 JSON 저장 경로
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 파라미터 최적화 (그리드/랜덤 탐색)
    Optimize {
        /// 최적화 설정 파일 (.toml 또는 .json)
        #[arg(short, long)]
        config: PathBuf,

        /// 최대 평가 횟수
        #[arg(long)]
        max_runs: Option<usize>,

        /// 랜덤 시드
        #[arg(long)]
        seed: Option<u64>,

        /// 결과 JSON 저장 경로
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 워크포워드 분석
    WalkForward {
        /// 워크포워드 설정 파일 (.toml 또는 .json)
        #[arg(short, long)]
        config: PathBuf,

        /// 윈도우별 최대 평가 횟수
        #[arg(long)]
        max_runs: Option<usize>,

        /// 랜덤 시드
        #[arg(long)]
        seed: Option<u64>,

        /// 결과 JSON 저장 경로
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 저장된 백테스트 결과에 대한 몬테카를로 분석
    MonteCarlo {
        /// 백테스트 결과 JSON (`backtest -o`로 저장한 파일)
        #[arg(short, long)]
        report: PathBuf,

        /// 몬테카를로 설정 파일 (없으면 애플리케이션 기본값)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// 재표본 방식 (bootstrap, permutation, parametric)
        #[arg(short, long)]
        method: Option<String>,

        /// 시뮬레이션 횟수
        #[arg(short = 'n', long)]
        simulations: Option<usize>,

        /// 랜덤 시드
        #[arg(long)]
        seed: Option<u64>,

        /// 결과 JSON 저장 경로
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 비중 배분 포트폴리오 백테스트
    Portfolio {
        /// 포트폴리오 설정 파일 (.toml 또는 .json)
        #[arg(short, long)]
        config: PathBuf,

        /// 초기 자본금 (설정 파일 값 대신 사용)
        #[arg(long)]
        capital: Option<Decimal>,

        /// 결과 JSON 저장 경로
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 등록된 전략과 파라미터 목록
    Strategies,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // 설정 파일이 없으면 기본값과 환경 변수만 사용
    let app_config = AppConfig::load(Some(&cli.app_config))
        .map_err(|e| anyhow!("설정 로드 실패 ({}): {}", cli.app_config.display(), e))?;

    let mut log_config = LogConfig::from(&app_config.logging);
    if cli.verbose {
        log_config.level = "debug".to_string();
    }
    init_logging(log_config).map_err(|e| anyhow!("로깅 초기화 실패: {}", e))?;

    if let Err(e) = dispatch(cli, &app_config).await {
        error!("명령 실패: {:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn dispatch(cli: Cli, app_config: &AppConfig) -> Result<()> {
    if let Commands::Strategies = cli.command {
        print_strategies(&StrategyRegistry::with_builtins());
        return Ok(());
    }

    let runner = JobRunner::from_config(app_config).with_progress_bar(!cli.quiet);
    info!(
        data_dir = %app_config.data.csv_dir,
        workers = app_config.jobs.max_workers,
        "작업 실행기 준비"
    );

    match cli.command {
        Commands::Backtest {
            config,
            strategy,
            capital,
            output,
        } => {
            let overrides = BacktestOverrides {
                strategy,
                initial_capital: capital,
            };
            run_backtest(&runner, &config, &overrides, output.as_deref()).await?;
        }

        Commands::Optimize {
            config,
            max_runs,
            seed,
            output,
        } => {
            let overrides = SearchOverrides { max_runs, seed };
            run_optimize(&runner, &config, &overrides, output.as_deref()).await?;
        }

        Commands::WalkForward {
            config,
            max_runs,
            seed,
            output,
        } => {
            let overrides = SearchOverrides { max_runs, seed };
            run_walk_forward(&runner, &config, &overrides, output.as_deref()).await?;
        }

        Commands::MonteCarlo {
            report,
            config,
            method,
            simulations,
            seed,
            output,
        } => {
            let overrides = MonteCarloOverrides {
                method: method.as_deref().map(parse_method).transpose()?,
                simulations,
                seed,
            };
            let mc_config = build_config(config.as_deref(), &app_config.monte_carlo, &overrides)?;
            run_monte_carlo(&runner, &report, mc_config, output.as_deref()).await?;
        }

        Commands::Portfolio {
            config,
            capital,
            output,
        } => {
            let overrides = BacktestOverrides {
                strategy: None,
                initial_capital: capital,
            };
            run_portfolio(&runner, &config, &overrides, output.as_deref()).await?;
        }

        Commands::Strategies => {}
    }

    runner.registry().shutdown().await;
    Ok(())
}
