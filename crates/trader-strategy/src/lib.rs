//! 전략 평가 기능 및 전략 레지스트리.
//!
//! 이 크레이트가 제공하는 기능:
//! - 봉 윈도우를 받아 매매 결정을 돌려주는 `Strategy` trait
//! - 생성 시점에 한 번 검증되는 타입 기반 파라미터 (`StrategyParams`)
//! - 이름으로 전략 구현을 찾는 `StrategyRegistry`
//! - 내장 전략 (SMA 크로스오버, RSI 평균 회귀, 매수 후 보유)
//!
//! # 예제
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use trader_strategy::{ParamValue, StrategyRegistry};
//!
//! let registry = StrategyRegistry::with_builtins();
//! let strategy = registry.get("sma_crossover").unwrap();
//!
//! let mut overrides = BTreeMap::new();
//! overrides.insert("short_period".to_string(), ParamValue::Int(5));
//! let params = strategy.resolve_params(&overrides).unwrap();
//!
//! assert_eq!(params.get_int("short_period").unwrap(), 5);
//! assert_eq!(params.get_int("long_period").unwrap(), 20);
//! ```

pub mod error;
pub mod indicators;
pub mod params;
pub mod registry;
pub mod strategies;
pub mod traits;

// 주요 타입 재내보내기
pub use error::{StrategyError, StrategyResult};
pub use params::{ParamKind, ParamSpec, ParamValue, StrategyParams};
pub use registry::{StrategyInfo, StrategyRegistry};
pub use strategies::{BuyAndHoldStrategy, RsiMeanReversionStrategy, SmaCrossoverStrategy};
pub use traits::{Decision, SignalAction, Strategy};
