//! 전략 레지스트리.
//!
//! 전략 ID 또는 별칭으로 구현체를 찾습니다. 시뮬레이터는 이 레지스트리와
//! `Strategy` trait에만 의존하고 구체 전략 타입은 알지 못합니다.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StrategyError, StrategyResult};
use crate::params::ParamSpec;
use crate::strategies::{BuyAndHoldStrategy, RsiMeanReversionStrategy, SmaCrossoverStrategy};
use crate::traits::Strategy;

/// 전략 목록 조회용 요약 정보.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// 전략 ID
    pub id: String,
    /// 별칭
    pub aliases: Vec<String>,
    /// 이름
    pub name: String,
    /// 설명
    pub description: String,
    /// 파라미터 스키마
    pub params: Vec<ParamSpec>,
}

/// 이름으로 조회 가능한 전략 구현 모음.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn Strategy>>,
    aliases: HashMap<String, String>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.strategies.keys().collect();
        ids.sort();
        f.debug_struct("StrategyRegistry")
            .field("strategies", &ids)
            .field("aliases", &self.aliases.len())
            .finish()
    }
}

impl StrategyRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 내장 전략이 등록된 레지스트리를 생성합니다.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SmaCrossoverStrategy), &["sma", "ma_cross"]);
        registry.register(Arc::new(RsiMeanReversionStrategy), &["rsi"]);
        registry.register(Arc::new(BuyAndHoldStrategy), &["buy_hold", "benchmark"]);
        registry
    }

    /// 전략을 등록합니다. 같은 ID가 있으면 교체합니다.
    pub fn register(&mut self, strategy: Arc<dyn Strategy>, aliases: &[&str]) {
        let id = strategy.id().to_string();
        for alias in aliases {
            self.aliases.insert(alias.to_string(), id.clone());
        }
        debug!(strategy = %id, aliases = ?aliases, "전략 등록");
        if self.strategies.insert(id.clone(), strategy).is_some() {
            warn!(strategy = %id, "기존 전략 구현을 교체합니다");
        }
    }

    /// ID 또는 별칭으로 전략을 조회합니다.
    pub fn get(&self, query: &str) -> StrategyResult<Arc<dyn Strategy>> {
        let id = self.aliases.get(query).map(String::as_str).unwrap_or(query);
        self.strategies.get(id).cloned().ok_or_else(|| {
            debug!(query, "등록되지 않은 전략");
            StrategyError::UnknownStrategy(query.to_string())
        })
    }

    /// 등록 여부.
    pub fn contains(&self, query: &str) -> bool {
        self.get(query).is_ok()
    }

    /// ID 순으로 정렬된 전략 목록.
    pub fn list(&self) -> Vec<StrategyInfo> {
        let mut infos: Vec<StrategyInfo> = self
            .strategies
            .values()
            .map(|s| {
                let mut aliases: Vec<String> = self
                    .aliases
                    .iter()
                    .filter(|(_, id)| id.as_str() == s.id())
                    .map(|(alias, _)| alias.clone())
                    .collect();
                aliases.sort();
                StrategyInfo {
                    id: s.id().to_string(),
                    aliases,
                    name: s.name().to_string(),
                    description: s.description().to_string(),
                    params: s.schema(),
                }
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }
}
