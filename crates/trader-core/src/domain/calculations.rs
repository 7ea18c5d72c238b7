//! 손익 계산 공통 함수.
//!
//! 백테스트 회계 모듈과 성과 지표 계산에서 공유하는 순수 함수입니다.
//! 극단적인 파라미터 조합에서 Decimal 범위를 넘을 수 있으므로
//! 곱셈/나눗셈이 포함된 함수는 `Option`을 반환합니다 (`None` = 오버플로).

use crate::domain::Side;
use crate::types::Quantity;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// 실현 손익 계산 (수수료 제외).
///
/// ```
/// use trader_core::{realized_pnl, Side};
/// use rust_decimal_macros::dec;
///
/// // 롱 포지션: 100에 매수 → 110에 매도, 수량 10
/// assert_eq!(realized_pnl(dec!(100), dec!(110), dec!(10), Side::Buy), Some(dec!(100)));
/// ```
pub fn realized_pnl(
    entry_price: Decimal,
    exit_price: Decimal,
    quantity: Quantity,
    side: Side,
) -> Option<Decimal> {
    let diff = match side {
        // 롱 포지션: (청산가 - 진입가) × 수량
        Side::Buy => exit_price.checked_sub(entry_price)?,
        // 숏 포지션: (진입가 - 청산가) × 수량
        Side::Sell => entry_price.checked_sub(exit_price)?,
    };
    diff.checked_mul(quantity)
}

/// 미실현 손익 계산 (현재가 기준 평가).
pub fn unrealized_pnl(
    entry_price: Decimal,
    current_price: Decimal,
    quantity: Quantity,
    side: Side,
) -> Option<Decimal> {
    realized_pnl(entry_price, current_price, quantity, side)
}

/// 수수료 차감 후 순손익.
pub fn net_pnl(gross_pnl: Decimal, fees: Decimal) -> Decimal {
    gross_pnl - fees
}

/// 수익률 계산 (백분율, 10.5 = 10.5%).
///
/// 비용 기준이 0 이하이면 0을 반환합니다.
pub fn return_pct(pnl: Decimal, cost_basis: Decimal) -> Decimal {
    if cost_basis > Decimal::ZERO {
        pnl.checked_div(cost_basis)
            .and_then(|r| r.checked_mul(dec!(100)))
            .unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}

/// 명목 가치 (가격 × 수량).
pub fn notional_value(price: Decimal, quantity: Quantity) -> Option<Decimal> {
    price.checked_mul(quantity)
}

/// 추가 매수 후 가중평균 단가.
///
/// 기존 보유가 없으면 추가 매수 가격이 그대로 평균 단가가 됩니다.
pub fn weighted_average_price(
    held_quantity: Quantity,
    held_avg_price: Decimal,
    add_quantity: Quantity,
    add_price: Decimal,
) -> Option<Decimal> {
    let total_quantity = held_quantity.checked_add(add_quantity)?;
    if total_quantity.is_zero() {
        return Some(Decimal::ZERO);
    }
    let total_cost = held_quantity
        .checked_mul(held_avg_price)?
        .checked_add(add_quantity.checked_mul(add_price)?)?;
    total_cost.checked_div(total_quantity)
}
