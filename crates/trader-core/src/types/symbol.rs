//! 심볼 및 시장 유형 정의.
//!
//! 이 모듈은 종목 심볼 관련 타입을 정의합니다:
//! - `MarketType` - 시장 유형 (국내 주식, 해외 주식, 암호화폐)
//! - `Symbol` - 거래 가능한 상품을 나타내는 심볼

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 시장 유형 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    /// 한국 주식 시장 (KOSPI/KOSDAQ)
    KrStock,
    /// 미국 주식 시장
    UsStock,
    /// 암호화폐 현물 시장
    Crypto,
}

impl MarketType {
    /// 이 시장의 기본 호가 통화.
    pub fn default_quote(&self) -> &'static str {
        match self {
            MarketType::KrStock => "KRW",
            MarketType::UsStock => "USD",
            MarketType::Crypto => "USDT",
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::KrStock => write!(f, "kr_stock"),
            MarketType::UsStock => write!(f, "us_stock"),
            MarketType::Crypto => write!(f, "crypto"),
        }
    }
}

/// 거래 가능한 상품을 나타내는 심볼.
///
/// 심볼은 기준 자산(종목 코드), 호가 통화, 시장 유형으로 구성됩니다.
/// 예: 삼성전자 `005930/KRW`, `AAPL/USD`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// 기준 자산 (예: 005930, AAPL)
    pub base: String,
    /// 호가 통화 (예: KRW, USD)
    pub quote: String,
    /// 시장 유형
    pub market_type: MarketType,
    /// 거래소별 심볼 형식 (선택)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_symbol: Option<String>,
}

impl Symbol {
    /// 새 심볼을 생성합니다.
    pub fn new(base: impl Into<String>, quote: impl Into<String>, market_type: MarketType) -> Self {
        Self {
            base: base.into().trim().to_uppercase(),
            quote: quote.into().trim().to_uppercase(),
            market_type,
            exchange_symbol: None,
        }
    }

    /// 국내 주식 심볼을 생성합니다 (호가 통화 KRW).
    pub fn kr_stock(code: impl Into<String>) -> Self {
        Self::new(code, "KRW", MarketType::KrStock)
    }

    /// 미국 주식 심볼을 생성합니다.
    pub fn us_stock(ticker: impl Into<String>) -> Self {
        Self::new(ticker, "USD", MarketType::UsStock)
    }

    /// 거래소별 심볼 형식을 설정합니다.
    pub fn with_exchange_symbol(mut self, exchange_symbol: impl Into<String>) -> Self {
        self.exchange_symbol = Some(exchange_symbol.into());
        self
    }

    /// 데이터 파일 이름 등에 쓰이는 키 (기준 자산 코드).
    pub fn code(&self) -> &str {
        &self.base
    }

    /// 표준 심볼 문자열 형식을 반환합니다.
    pub fn to_standard_string(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Symbol {
    type Err = String;

    /// `"005930"`, `"005930/KRW"`, `"AAPL/USD"` 형식을 파싱합니다.
    ///
    /// 슬래시가 없으면 국내 주식으로 간주합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Empty symbol".to_string());
        }

        match s.split_once('/') {
            None => Ok(Self::kr_stock(s)),
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() => {
                let market_type = match quote.to_uppercase().as_str() {
                    "KRW" => MarketType::KrStock,
                    "USD" => MarketType::UsStock,
                    _ => MarketType::Crypto,
                };
                Ok(Self::new(base, quote, market_type))
            }
            _ => Err(format!("Invalid symbol: {}", s)),
        }
    }
}
