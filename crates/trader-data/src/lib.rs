//! 과거 봉 데이터 제공.
//!
//! 이 crate는 다음을 제공합니다:
//! - 백테스트 엔진이 소비하는 `BarDataProvider` 추상화
//! - 메모리 기반 제공자 (테스트, 사전 로드 데이터)
//! - CSV 파일 기반 제공자
//! - 시드 기반 합성 캔들 생성기

pub mod error;
pub mod provider;
pub mod synthetic;

pub use error::{DataError, Result};
pub use provider::{BarDataProvider, CsvBarProvider, InMemoryBarProvider};
pub use synthetic::generate_klines;
