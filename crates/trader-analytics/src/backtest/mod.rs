//! 백테스팅 모듈
//!
//! 과거 데이터로 트레이딩 전략을 시뮬레이션하고 성과를 분석합니다.
//!
//! # 주요 구성요소
//!
//! - [`BacktestConfig`]: 백테스트 설정 (초기 자본, 수수료, 슬리피지 등)
//! - [`Account`]: 체결 및 회계 (현금, 평균 단가 포지션, 거래 기록)
//! - [`BacktestEngine`]: 봉 재생 시뮬레이터
//! - [`BacktestReport`]: 백테스트 결과 리포트

pub mod accounting;
pub mod config;
pub mod engine;
pub mod report;

pub use accounting::{Account, EquityPoint, Fill, OrderSize, PositionState, Trade};
pub use config::BacktestConfig;
pub use engine::{BacktestEngine, ProgressSink, RunControl};
pub use report::BacktestReport;
