//! 트레이딩 시스템의 에러 타입.
//!
//! 크레이트 경계를 넘는 공통 에러를 정의합니다. 각 하위 크레이트는
//! 자신의 도메인 에러를 두고, 필요한 경우 이 타입으로 변환합니다.

use thiserror::Error;

/// 핵심 트레이딩 에러.
#[derive(Debug, Error)]
pub enum TraderError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 데이터 에러
    #[error("데이터 에러: {0}")]
    Data(String),

    /// 전략 에러
    #[error("전략 에러: {0}")]
    Strategy(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 트레이딩 작업을 위한 Result 타입.
pub type TraderResult<T> = Result<T, TraderError>;

impl TraderError {
    /// 재시도 가능한 에러인지 확인합니다.
    ///
    /// 백테스트 도메인의 에러는 모두 결정적이므로 자동 재시도 대상이 아닙니다.
    /// 재시도 여부는 호출자가 결정합니다.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// 호출자의 입력(설정)이 원인인 에러인지 확인합니다.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            TraderError::Config(_) | TraderError::InvalidInput(_) | TraderError::NotFound(_)
        )
    }
}

impl From<serde_json::Error> for TraderError {
    fn from(err: serde_json::Error) -> Self {
        TraderError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for TraderError {
    fn from(err: config::ConfigError) -> Self {
        TraderError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_never_retryable() {
        let err = TraderError::Data("빈 응답".to_string());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_caller_error() {
        assert!(TraderError::Config("x".to_string()).is_caller_error());
        assert!(TraderError::NotFound("job".to_string()).is_caller_error());
        assert!(!TraderError::Internal("x".to_string()).is_caller_error());
    }

    #[test]
    fn test_from_serde_json() {
        let err: TraderError = serde_json::from_str::<u32>("oops").unwrap_err().into();
        assert!(matches!(err, TraderError::Serialization(_)));
    }
}
