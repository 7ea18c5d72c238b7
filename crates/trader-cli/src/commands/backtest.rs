//! 백테스트 및 포트폴리오 명령어.

use std::path::Path;

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::info;

use trader_analytics::{BacktestConfig, JobOutput, JobRequest, PortfolioConfig};

use super::runner::{load_config_file, JobRunner};

/// 명령줄에서 설정 파일 값을 덮어쓰는 항목.
#[derive(Debug, Clone, Default)]
pub struct BacktestOverrides {
    /// 전략 ID
    pub strategy: Option<String>,
    /// 초기 자본금
    pub initial_capital: Option<Decimal>,
}

impl BacktestOverrides {
    /// 설정에 덮어쓰기 값을 적용합니다.
    pub fn apply(&self, mut config: BacktestConfig) -> BacktestConfig {
        if let Some(strategy) = &self.strategy {
            config.strategy_id = strategy.clone();
        }
        if let Some(capital) = self.initial_capital {
            config.initial_capital = capital;
        }
        config
    }
}

/// 설정 파일로 단일 백테스트를 실행합니다.
pub async fn run_backtest(
    runner: &JobRunner,
    config_path: &Path,
    overrides: &BacktestOverrides,
    output: Option<&Path>,
) -> Result<JobOutput> {
    let config = overrides.apply(load_config_file::<BacktestConfig>(config_path)?);
    config.validate()?;

    info!(
        strategy = %config.strategy_id,
        symbols = config.symbols.len(),
        range = %config.range,
        "백테스트 시작"
    );

    runner
        .run_and_report(JobRequest::Backtest(config), output)
        .await
}

/// 설정 파일로 포트폴리오 백테스트를 실행합니다.
pub async fn run_portfolio(
    runner: &JobRunner,
    config_path: &Path,
    overrides: &BacktestOverrides,
    output: Option<&Path>,
) -> Result<JobOutput> {
    let mut config = load_config_file::<PortfolioConfig>(config_path)?;
    config.base = overrides.apply(config.base);
    config.normalized_allocations()?;

    info!(
        strategy = %config.base.strategy_id,
        allocations = config.allocations.len(),
        "포트폴리오 백테스트 시작"
    );

    runner
        .run_and_report(JobRequest::Portfolio(config), output)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use trader_core::{DateRange, Symbol};

    #[test]
    fn test_overrides_replace_only_given_fields() {
        let config = BacktestConfig::new(
            "sma_crossover",
            vec![Symbol::kr_stock("005930")],
            DateRange::from_days(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 100),
        );
        let original_commission = config.commission_rate;

        let overrides = BacktestOverrides {
            strategy: None,
            initial_capital: Some(dec!(30000000)),
        };
        let applied = overrides.apply(config);

        assert_eq!(applied.strategy_id, "sma_crossover");
        assert_eq!(applied.initial_capital, dec!(30000000));
        assert_eq!(applied.commission_rate, original_commission);
    }

    #[test]
    fn test_default_overrides_are_noop() {
        let config = BacktestConfig::new(
            "buy_hold",
            vec![Symbol::kr_stock("000660")],
            DateRange::from_days(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 30),
        );
        assert_eq!(BacktestOverrides::default().apply(config.clone()), config);
    }
}
