//! 정밀한 금융 계산을 위한 Decimal 유틸리티.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// 금융 정밀도를 위한 가격 타입.
pub type Price = Decimal;

/// 주문 수량을 위한 타입.
pub type Quantity = Decimal;

/// 퍼센트 타입 (5.25 = 5.25%).
pub type Percentage = Decimal;

/// Decimal 연산을 위한 확장 트레이트.
pub trait DecimalExt {
    /// 퍼센트 문자열로 변환합니다 (값이 이미 퍼센트 단위, 예: "5.25%").
    fn to_percentage_string(&self) -> String;

    /// 금융 표시용 반올림 (MidpointAwayFromZero).
    fn round_money(&self, dp: u32) -> Decimal;

    /// f64로 변환합니다. 표현할 수 없으면 0.
    fn to_f64_lossy(&self) -> f64;
}

impl DecimalExt for Decimal {
    fn to_percentage_string(&self) -> String {
        format!("{:.2}%", self)
    }

    fn round_money(&self, dp: u32) -> Decimal {
        self.round_dp_with_strategy(dp, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
    }

    fn to_f64_lossy(&self) -> f64 {
        self.to_f64().unwrap_or(0.0)
    }
}

/// Decimal 제곱근 (뉴턴-랩슨 방법).
///
/// 음수나 0은 0을 반환합니다.
pub fn decimal_sqrt(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let mut guess = value / Decimal::TWO;
    if guess.is_zero() {
        guess = value;
    }
    let precision = Decimal::new(1, 10); // 0.0000000001

    for _ in 0..50 {
        let next = (guess + value / guess) / Decimal::TWO;
        if (next - guess).abs() < precision {
            return next;
        }
        guess = next;
    }

    guess
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_percentage_string() {
        assert_eq!(dec!(5.254).to_percentage_string(), "5.25%");
    }

    #[test]
    fn test_round_money() {
        assert_eq!(dec!(2.345).round_money(2), dec!(2.35));
        assert_eq!(dec!(-2.345).round_money(2), dec!(-2.35));
    }

    #[test]
    fn test_decimal_sqrt() {
        assert_eq!(decimal_sqrt(dec!(0)), dec!(0));
        assert_eq!(decimal_sqrt(dec!(-4)), dec!(0));
        assert!((decimal_sqrt(dec!(16)) - dec!(4)).abs() < dec!(0.0000001));
        assert!((decimal_sqrt(dec!(252)) - dec!(15.8745078664)).abs() < dec!(0.000001));
        assert!((decimal_sqrt(dec!(0.0001)) - dec!(0.01)).abs() < dec!(0.0000001));
    }

    proptest::proptest! {
        #[test]
        fn prop_sqrt_squares_back(mantissa in 1i64..1_000_000_000_000, scale in 0u32..7) {
            let value = Decimal::new(mantissa, scale);
            let root = decimal_sqrt(value);

            proptest::prop_assert!(root > Decimal::ZERO);
            let error = (root * root - value).abs();
            proptest::prop_assert!(
                error <= value * dec!(0.00000001) + dec!(0.000000001),
                "sqrt({}) = {}, error {}",
                value,
                root,
                error
            );
        }
    }
}
