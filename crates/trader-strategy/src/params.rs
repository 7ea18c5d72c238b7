//! 타입 기반 전략 파라미터.
//!
//! 전략은 `ParamSpec` 목록으로 스키마를 선언하고, 호출자가 넘긴 이름→값 맵은
//! `StrategyParams::resolve`에서 한 번만 검증됩니다. 재생 루프 안에서는
//! 이미 검증된 값만 읽습니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StrategyError, StrategyResult};

/// 파라미터 값.
///
/// 설정 파일에서는 타입 태그 없이 `5`, `0.5`, `true`, `"text"` 로 표기합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// 정수
    Int(i64),
    /// 실수
    Float(f64),
    /// 불리언
    Bool(bool),
    /// 문자열
    Text(String),
}

impl ParamValue {
    /// 값의 종류.
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Text(_) => ParamKind::Text,
        }
    }

    /// 숫자 값이면 f64로 반환합니다.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// 파라미터 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// 정수
    Int,
    /// 실수
    Float,
    /// 불리언
    Bool,
    /// 문자열
    Text,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Int => write!(f, "int"),
            ParamKind::Float => write!(f, "float"),
            ParamKind::Bool => write!(f, "bool"),
            ParamKind::Text => write!(f, "text"),
        }
    }
}

/// 파라미터 스키마 항목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// 파라미터 이름 (snake_case)
    pub name: String,
    /// 종류
    pub kind: ParamKind,
    /// 기본값
    pub default: ParamValue,
    /// 최소값 (숫자형만, 포함)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// 최대값 (숫자형만, 포함)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// 설명
    pub description: String,
}

impl ParamSpec {
    /// 정수 파라미터.
    pub fn int(name: &str, default: i64, min: i64, max: i64, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Int,
            default: ParamValue::Int(default),
            min: Some(min as f64),
            max: Some(max as f64),
            description: description.to_string(),
        }
    }

    /// 실수 파라미터.
    pub fn float(name: &str, default: f64, min: f64, max: f64, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Float,
            default: ParamValue::Float(default),
            min: Some(min),
            max: Some(max),
            description: description.to_string(),
        }
    }

    /// 불리언 파라미터.
    pub fn bool(name: &str, default: bool, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Bool,
            default: ParamValue::Bool(default),
            min: None,
            max: None,
            description: description.to_string(),
        }
    }

    /// 값을 이 스키마의 종류로 변환하고 범위를 검사합니다.
    ///
    /// 실수 파라미터에는 정수를, 정수 파라미터에는 소수부가 없는 실수를 허용합니다.
    pub fn coerce(&self, value: &ParamValue) -> StrategyResult<ParamValue> {
        let coerced = match (self.kind, value) {
            (ParamKind::Int, ParamValue::Int(v)) => ParamValue::Int(*v),
            (ParamKind::Int, ParamValue::Float(v)) if v.fract() == 0.0 && v.is_finite() => {
                ParamValue::Int(*v as i64)
            }
            (ParamKind::Float, ParamValue::Float(v)) if v.is_finite() => ParamValue::Float(*v),
            (ParamKind::Float, ParamValue::Int(v)) => ParamValue::Float(*v as f64),
            (ParamKind::Bool, ParamValue::Bool(v)) => ParamValue::Bool(*v),
            (ParamKind::Text, ParamValue::Text(v)) => ParamValue::Text(v.clone()),
            _ => {
                return Err(StrategyError::invalid(
                    &self.name,
                    format!("{} 타입이 필요하지만 {} 값 '{}'", self.kind, value.kind(), value),
                ))
            }
        };

        if let Some(n) = coerced.as_f64() {
            if let Some(min) = self.min {
                if n < min {
                    return Err(StrategyError::invalid(
                        &self.name,
                        format!("{} < 최소값 {}", n, min),
                    ));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Err(StrategyError::invalid(
                        &self.name,
                        format!("{} > 최대값 {}", n, max),
                    ));
                }
            }
        }

        Ok(coerced)
    }
}

/// 검증이 끝난 전략 파라미터.
///
/// 스키마의 모든 항목이 채워져 있고 각 값은 선언된 종류입니다.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParams(BTreeMap<String, ParamValue>);

impl StrategyParams {
    /// 스키마와 호출자 오버라이드로 파라미터를 확정합니다.
    ///
    /// 스키마에 없는 키는 `UnknownParameter`, 타입/범위 위반은 `InvalidParameter`.
    pub fn resolve(
        strategy_id: &str,
        schema: &[ParamSpec],
        overrides: &BTreeMap<String, ParamValue>,
    ) -> StrategyResult<Self> {
        if let Some(unknown) = overrides
            .keys()
            .find(|name| !schema.iter().any(|spec| &spec.name == *name))
        {
            warn!(strategy = strategy_id, name = %unknown, "스키마에 없는 파라미터");
            return Err(StrategyError::UnknownParameter {
                strategy: strategy_id.to_string(),
                name: unknown.clone(),
            });
        }

        let mut values = BTreeMap::new();
        for spec in schema {
            let raw = overrides.get(&spec.name).unwrap_or(&spec.default);
            let value = spec.coerce(raw).map_err(|e| {
                debug!(strategy = strategy_id, param = %spec.name, error = %e, "파라미터 변환 실패");
                e
            })?;
            values.insert(spec.name.clone(), value);
        }

        Ok(Self(values))
    }

    /// 값을 조회합니다.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// 정수 값을 조회합니다.
    pub fn get_int(&self, name: &str) -> StrategyResult<i64> {
        match self.0.get(name) {
            Some(ParamValue::Int(v)) => Ok(*v),
            Some(other) => Err(StrategyError::invalid(name, format!("정수가 아님: {}", other))),
            None => Err(StrategyError::invalid(name, "값 없음")),
        }
    }

    /// 기간 등 0 이상 정수를 usize로 조회합니다.
    pub fn get_usize(&self, name: &str) -> StrategyResult<usize> {
        let v = self.get_int(name)?;
        usize::try_from(v).map_err(|_| StrategyError::invalid(name, format!("음수: {}", v)))
    }

    /// 실수 값을 조회합니다 (정수도 허용).
    pub fn get_float(&self, name: &str) -> StrategyResult<f64> {
        self.0
            .get(name)
            .and_then(ParamValue::as_f64)
            .ok_or_else(|| StrategyError::invalid(name, "숫자가 아님"))
    }

    /// 불리언 값을 조회합니다.
    pub fn get_bool(&self, name: &str) -> StrategyResult<bool> {
        match self.0.get(name) {
            Some(ParamValue::Bool(v)) => Ok(*v),
            _ => Err(StrategyError::invalid(name, "불리언이 아님")),
        }
    }

    /// 이름 순서로 순회합니다.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// 내부 맵.
    pub fn as_map(&self) -> &BTreeMap<String, ParamValue> {
        &self.0
    }
}

impl fmt::Display for StrategyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<ParamSpec> {
        vec![
            ParamSpec::int("period", 14, 2, 100, "RSI 기간"),
            ParamSpec::float("threshold", 30.0, 0.0, 100.0, "임계값"),
            ParamSpec::bool("enabled", true, "사용 여부"),
        ]
    }

    fn overrides(pairs: &[(&str, ParamValue)]) -> BTreeMap<String, ParamValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_defaults_are_filled() {
        let params = StrategyParams::resolve("rsi", &schema(), &BTreeMap::new()).unwrap();
        assert_eq!(params.get_int("period").unwrap(), 14);
        assert_eq!(params.get_float("threshold").unwrap(), 30.0);
        assert!(params.get_bool("enabled").unwrap());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = StrategyParams::resolve(
            "rsi",
            &schema(),
            &overrides(&[("perido", ParamValue::Int(10))]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            StrategyError::UnknownParameter {
                strategy: "rsi".to_string(),
                name: "perido".to_string()
            }
        );
    }

    #[test]
    fn test_kind_and_range_checked() {
        let wrong_kind = StrategyParams::resolve(
            "rsi",
            &schema(),
            &overrides(&[("period", ParamValue::Text("ten".into()))]),
        );
        assert!(matches!(
            wrong_kind,
            Err(StrategyError::InvalidParameter { .. })
        ));

        let out_of_range = StrategyParams::resolve(
            "rsi",
            &schema(),
            &overrides(&[("period", ParamValue::Int(1))]),
        );
        assert!(matches!(
            out_of_range,
            Err(StrategyError::InvalidParameter { ref name, .. }) if name == "period"
        ));
    }

    #[test]
    fn test_numeric_coercion() {
        let params = StrategyParams::resolve(
            "rsi",
            &schema(),
            &overrides(&[
                ("period", ParamValue::Float(20.0)),
                ("threshold", ParamValue::Int(25)),
            ]),
        )
        .unwrap();
        assert_eq!(params.get("period"), Some(&ParamValue::Int(20)));
        assert_eq!(params.get("threshold"), Some(&ParamValue::Float(25.0)));

        let fractional = StrategyParams::resolve(
            "rsi",
            &schema(),
            &overrides(&[("period", ParamValue::Float(20.5))]),
        );
        assert!(fractional.is_err());
    }

    #[test]
    fn test_untagged_serde() {
        let values: Vec<ParamValue> = serde_json::from_str(r#"[5, 0.5, true, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Int(5),
                ParamValue::Float(0.5),
                ParamValue::Bool(true),
                ParamValue::Text("x".to_string())
            ]
        );
    }

    #[test]
    fn test_display_is_sorted_by_name() {
        let params = StrategyParams::resolve("rsi", &schema(), &BTreeMap::new()).unwrap();
        assert_eq!(params.to_string(), "enabled=true, period=14, threshold=30");
    }
}
