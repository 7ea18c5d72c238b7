//! 백테스트를 위한 도메인 모델.

mod calculations;
mod market_data;

pub use calculations::*;
pub use market_data::*;
