//! 설정 로딩 및 공통 타입 통합 테스트.

use std::io::Write;

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use trader_core::{AppConfig, DateRange, LogConfig, LogFormat, MarketType, Symbol, Timeframe};

fn write_toml(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_partial_file_keeps_defaults() {
    let file = write_toml(
        r#"
        [backtest]
        initial_capital = 50000000
        commission_rate = 0.0003

        [jobs]
        max_workers = 8

        [data]
        csv_dir = "fixtures/bars"
        "#,
    );

    let config = AppConfig::load(Some(file.path())).unwrap();

    assert_eq!(config.backtest.initial_capital, dec!(50000000));
    assert_eq!(config.backtest.commission_rate, dec!(0.0003));
    // 파일에 없는 값은 기본값 유지
    assert_eq!(config.backtest.slippage_rate, dec!(0.0005));
    assert_eq!(config.backtest.periods_per_year, 252);
    assert_eq!(config.jobs.max_workers, 8);
    assert_eq!(config.data.csv_dir, "fixtures/bars");
    assert_eq!(config.monte_carlo, AppConfig::default().monte_carlo);
}

#[test]
fn test_missing_file_uses_defaults() {
    let config = AppConfig::load(Some("does/not/exist.toml")).unwrap();
    assert_eq!(config.backtest, AppConfig::default().backtest);
}

#[test]
fn test_log_config_from_app_config() {
    let file = write_toml(
        r#"
        [logging]
        level = "debug"
        format = "json"
        "#,
    );
    let config = AppConfig::load(Some(file.path())).unwrap();
    let log = LogConfig::from(&config.logging);

    assert_eq!(log.level, "debug");
    assert_eq!(log.format, LogFormat::Json);
}

#[test]
fn test_symbol_round_trip_through_text() {
    for text in ["005930", "005930/KRW", "AAPL/USD", "BTC/USDT"] {
        let symbol: Symbol = text.parse().unwrap();
        let reparsed: Symbol = symbol.to_standard_string().parse().unwrap();
        assert_eq!(symbol, reparsed);
    }

    let samsung: Symbol = "005930".parse().unwrap();
    assert_eq!(samsung.market_type, MarketType::KrStock);
    assert_eq!(samsung.to_string(), "005930/KRW");
    assert!("/KRW".parse::<Symbol>().is_err());
}

#[test]
fn test_date_range_is_half_open() {
    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    );

    assert_eq!(range.days(), 30);
    assert!(range.contains(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    assert!(range.contains(Utc.with_ymd_and_hms(2024, 1, 30, 23, 59, 59).unwrap()));
    assert!(!range.contains(Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).unwrap()));
    assert!(DateRange::new(range.end, range.start).is_empty());
}

#[test]
fn test_timeframe_parsing() {
    assert_eq!("1d".parse::<Timeframe>().unwrap(), Timeframe::D1);
    assert_eq!(Timeframe::D1.as_str(), "1d");
    assert!("7x".parse::<Timeframe>().is_err());
}
