//! 내장 전략.
//!
//! - **SMA Crossover**: 이동평균 교차 추세 추종.
//! - **RSI Mean Reversion**: RSI 과매도/과매수 평균 회귀.
//! - **Buy and Hold**: 벤치마크용 매수 후 보유.

pub mod buy_and_hold;
pub mod rsi_mean_reversion;
pub mod sma_crossover;

pub use buy_and_hold::BuyAndHoldStrategy;
pub use rsi_mean_reversion::RsiMeanReversionStrategy;
pub use sma_crossover::SmaCrossoverStrategy;
