//! # Trader Core
//!
//! 백테스트·최적화 엔진의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 워크스페이스 전반에서 사용되는 기본 타입을 제공합니다:
//! - 캔들(OHLCV) 데이터와 매매 방향
//! - 심볼, 시장 유형, 타임프레임, 날짜 구간
//! - 손익 계산 공통 함수
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
