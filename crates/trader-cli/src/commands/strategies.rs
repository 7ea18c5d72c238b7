//! 전략 목록 명령어.

use trader_strategy::{StrategyInfo, StrategyRegistry};

/// 등록된 전략과 파라미터 스키마를 사람이 읽는 형식으로 만듭니다.
pub fn format_strategies(registry: &StrategyRegistry) -> String {
    let mut strategies = registry.list();
    strategies.sort_by(|a, b| a.id.cmp(&b.id));

    let mut out = String::new();
    out.push_str("\n사용 가능한 전략 목록:\n");
    out.push_str("═══════════════════════════════════════════════════════════════\n");
    for info in &strategies {
        out.push_str(&format_strategy(info));
    }
    out.push_str("═══════════════════════════════════════════════════════════════\n");
    out
}

fn format_strategy(info: &StrategyInfo) -> String {
    let mut out = format!("\n  {} ({})\n", info.id, info.name);
    if !info.aliases.is_empty() {
        out.push_str(&format!("  별칭: {}\n", info.aliases.join(", ")));
    }
    out.push_str(&format!("  {}\n", info.description));

    if info.params.is_empty() {
        out.push_str("  파라미터 없음\n");
        return out;
    }

    out.push_str("  ─────────────────────────────────────────────────────────────\n");
    for spec in &info.params {
        let bounds = match (spec.min, spec.max) {
            (Some(min), Some(max)) => format!(" [{} ~ {}]", min, max),
            (Some(min), None) => format!(" [>= {}]", min),
            (None, Some(max)) => format!(" [<= {}]", max),
            (None, None) => String::new(),
        };
        out.push_str(&format!(
            "  {:<20} {:<6} 기본값 {}{}  {}\n",
            spec.name, spec.kind, spec.default, bounds, spec.description
        ));
    }
    out
}

/// 전략 목록을 출력합니다.
pub fn print_strategies(registry: &StrategyRegistry) {
    print!("{}", format_strategies(registry));
}
