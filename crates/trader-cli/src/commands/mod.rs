//! CLI 명령어 구현 모듈.

pub mod backtest;
pub mod monte_carlo;
pub mod optimize;
pub mod runner;
pub mod strategies;

pub use runner::{load_config_file, write_output, JobRunner};
