//! 전략 에러 타입.

use thiserror::Error;

/// 전략 조회, 파라미터 검증, 평가 중 발생하는 에러.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StrategyError {
    /// 등록되지 않은 전략
    #[error("알 수 없는 전략: {0}")]
    UnknownStrategy(String),

    /// 스키마에 없는 파라미터
    #[error("알 수 없는 파라미터 '{name}' (전략: {strategy})")]
    UnknownParameter {
        /// 전략 ID
        strategy: String,
        /// 파라미터 이름
        name: String,
    },

    /// 타입 불일치, 범위 위반, 파라미터 간 제약 위반
    #[error("잘못된 파라미터 '{name}': {reason}")]
    InvalidParameter {
        /// 파라미터 이름
        name: String,
        /// 사유
        reason: String,
    },

    /// 평가 중 오류
    #[error("전략 평가 오류: {0}")]
    Evaluation(String),
}

impl StrategyError {
    /// 잘못된 파라미터 에러를 생성합니다.
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        StrategyError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// 전략 작업 Result 타입.
pub type StrategyResult<T> = Result<T, StrategyError>;
