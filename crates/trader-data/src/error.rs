//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터를 찾을 수 없음 (파일 없음 등)
    #[error("Data not found: {0}")]
    NotFound(String),

    /// 잘못된 데이터 (OHLC 불일치, 음수 가격 등)
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 파싱 오류 (행 번호 포함)
    #[error("Parse error at row {row}: {message}")]
    Parse {
        /// 1부터 시작하는 데이터 행 번호 (헤더 제외)
        row: usize,
        /// 오류 내용
        message: String,
    },

    /// 입출력 오류
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 등록되지 않은 데이터 소스
    #[error("Unknown data source: {0}")]
    UnknownSource(String),
}

impl From<csv::Error> for DataError {
    fn from(err: csv::Error) -> Self {
        let row = err
            .position()
            .map(|p| p.line().saturating_sub(1) as usize)
            .unwrap_or(0);
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(io) => DataError::Io(io),
            _ => DataError::Parse { row, message },
        }
    }
}

/// 데이터 작업 Result 타입.
pub type Result<T> = std::result::Result<T, DataError>;
