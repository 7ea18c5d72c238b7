//! 설정 관리.
//!
//! 애플리케이션 설정을 정의하고 로드합니다. 로드 순서는
//! 기본값 → TOML 파일 → 환경 변수(`TRADER__SECTION__KEY`) 입니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 백테스트 기본값
    pub backtest: BacktestDefaults,
    /// 비동기 작업 실행 설정
    pub jobs: JobsConfig,
    /// 데이터 소스 설정
    pub data: DataConfig,
    /// 몬테카를로 기본값
    pub monte_carlo: MonteCarloDefaults,
}

/// 로깅 설정.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 백테스트 기본값.
///
/// 한국 주식 현물 거래 기준입니다.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BacktestDefaults {
    /// 초기 자본금 (원)
    pub initial_capital: Decimal,
    /// 수수료율 (0.00015 = 0.015%)
    pub commission_rate: Decimal,
    /// 슬리피지율 (0.0005 = 0.05%)
    pub slippage_rate: Decimal,
    /// 신규 진입 시 가용 현금 대비 투입 비율 (1.0 = 전액)
    pub position_size_pct: Decimal,
    /// 연율화 기간 수 (일봉 = 252)
    pub periods_per_year: u32,
    /// 손실 거래가 없을 때 프로핏 팩터 대체값
    pub profit_factor_cap: Decimal,
}

impl Default for BacktestDefaults {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::new(10_000_000, 0),
            commission_rate: Decimal::new(15, 5),
            slippage_rate: Decimal::new(5, 4),
            position_size_pct: Decimal::ONE,
            periods_per_year: 252,
            profit_factor_cap: Decimal::new(99999, 2),
        }
    }
}

/// 비동기 작업 실행 설정.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JobsConfig {
    /// 동시에 실행되는 최대 작업 수 (워커 수)
    pub max_workers: usize,
    /// 진행률 폴링 간격 (밀리초)
    pub poll_interval_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            poll_interval_ms: 200,
        }
    }
}

/// 데이터 소스 설정.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV 캔들 파일 디렉토리
    pub csv_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_dir: "./data".to_string(),
        }
    }
}

/// 몬테카를로 기본값.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MonteCarloDefaults {
    /// 시뮬레이션 횟수
    pub simulations: usize,
    /// 신뢰 수준 (0.95 = 95%)
    pub confidence_level: f64,
    /// 히스토그램 구간 수
    pub distribution_bins: usize,
}

impl Default for MonteCarloDefaults {
    fn default() -> Self {
        Self {
            simulations: 1000,
            confidence_level: 0.95,
            distribution_bins: 20,
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path.as_ref()).required(false));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("TRADER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load(Some("config/default.toml"))
    }
}
