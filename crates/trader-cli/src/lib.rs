//! CLI 도구 모음.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 설정 파일(TOML/JSON) 로딩
//! - 작업 레지스트리를 통한 백테스트, 최적화, 워크포워드, 몬테카를로, 포트폴리오 실행
//! - 진행률 표시와 Ctrl-C 취소

pub mod commands;

pub use commands::*;
