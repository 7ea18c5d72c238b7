//! 봉 데이터 Provider 모듈.
//!
//! - `InMemoryBarProvider`: 메모리에 적재된 캔들 (테스트, 사전 로드)
//! - `CsvBarProvider`: `<dir>/<SYMBOL>_<timeframe>.csv` 파일

mod csv_file;
mod memory;

pub use csv_file::CsvBarProvider;
pub use memory::InMemoryBarProvider;

use crate::error::Result;
use trader_core::{DateRange, Kline, Symbol, Timeframe};

/// 과거 봉 데이터 제공자.
///
/// 재생 루프에 중단 지점이 없으므로 동기 인터페이스입니다.
/// 구현체는 여러 작업 워커에서 동시에 호출될 수 있습니다.
pub trait BarDataProvider: Send + Sync {
    /// 제공자 이름 (로그 및 데이터 소스 선택용).
    fn name(&self) -> &str;

    /// `open_time`이 `range`에 속하는 봉을 시간 오름차순으로 반환합니다.
    ///
    /// 데이터가 없으면 빈 벡터를 반환합니다 (오류 아님).
    fn get_bars(&self, symbol: &Symbol, timeframe: Timeframe, range: &DateRange)
        -> Result<Vec<Kline>>;
}
