//! 백테스트 분석 오류 타입.
//!
//! 시뮬레이터, 최적화기, 워크포워드 분석기, 몬테카를로 분석기가 공유하는
//! 오류 분류와 비동기 작업 레지스트리 오류를 정의합니다.

use thiserror::Error;
use trader_data::DataError;
use trader_strategy::StrategyError;
use uuid::Uuid;

use crate::jobs::JobStatus;

/// 백테스트 관련 에러.
///
/// 모든 변형은 호출자에게 그대로 전달되며 자동 재시도하지 않습니다.
#[derive(Debug, Error)]
pub enum BacktestError {
    /// 잘못된 설정 (빈 기간, 0 이하 자본금, 빈 심볼 목록 등)
    #[error("백테스트 설정 오류: {0}")]
    InvalidConfig(String),

    /// 전략 최소 봉 수보다 데이터가 적음
    #[error("데이터 부족: {symbol} (필요 {required}개, 보유 {available}개)")]
    InsufficientData {
        /// 심볼
        symbol: String,
        /// 전략이 요구하는 최소 봉 수
        required: usize,
        /// 실제 봉 수
        available: usize,
    },

    /// 후보 값이 없는 파라미터가 있음
    #[error("파라미터 공간이 비어 있습니다: {0}")]
    EmptyParameterSpace(String),

    /// 워크포워드 윈도우 수가 최소 요구치 미만
    #[error("워크포워드 윈도우 부족: 최소 {required}개 필요, {available}개 생성 가능")]
    InsufficientWindows {
        /// 최소 윈도우 수
        required: usize,
        /// 생성 가능한 윈도우 수
        available: usize,
    },

    /// 시뮬레이션 중 예상치 못한 오류 (연산 오버플로, 전략 평가 실패 등)
    #[error("시뮬레이션 실패: {0}")]
    SimulationFailure(String),

    /// 취소됨 (오류가 아닌 정상 종료 상태)
    #[error("작업이 취소되었습니다")]
    Cancelled,

    /// 데이터 제공자 오류
    #[error("데이터 오류: {0}")]
    Data(#[from] DataError),

    /// 전략 조회/파라미터 오류
    #[error("전략 오류: {0}")]
    Strategy(#[from] StrategyError),
}

impl BacktestError {
    /// 호출자가 설정을 고쳐야 하는 오류인지 확인합니다.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            BacktestError::InvalidConfig(_)
                | BacktestError::EmptyParameterSpace(_)
                | BacktestError::InsufficientWindows { .. }
                | BacktestError::Strategy(_)
        )
    }

    /// 취소 여부.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BacktestError::Cancelled)
    }

    /// 최적화 루프에서 후보 단위로 기록하고 계속 진행할 수 있는 오류인지 확인합니다.
    ///
    /// 취소와 데이터 제공자 오류는 후보와 무관하므로 탐색 전체를 중단합니다.
    pub fn is_candidate_failure(&self) -> bool {
        matches!(
            self,
            BacktestError::SimulationFailure(_)
                | BacktestError::InsufficientData { .. }
                | BacktestError::Strategy(_)
                | BacktestError::InvalidConfig(_)
        )
    }
}

/// 백테스트 작업 Result 타입.
pub type BacktestResult<T> = Result<T, BacktestError>;

/// 작업 레지스트리 오류.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// 등록되지 않은 작업 ID
    #[error("작업을 찾을 수 없습니다: {0}")]
    NotFound(Uuid),

    /// 결과를 아직 읽을 수 없음 (성공 상태가 아님)
    #[error("작업 결과가 준비되지 않았습니다 (상태: {0})")]
    NotReady(JobStatus),

    /// 레지스트리가 종료됨
    #[error("작업 레지스트리가 종료되었습니다")]
    Shutdown,
}
