//! 체결 및 회계 모듈.
//!
//! 전략 결정과 현재 봉 종가로 모의 체결을 만들고 현금과 심볼별 포지션을 갱신합니다.
//!
//! # 체결 규칙
//!
//! - 매수 체결가 = 종가 × (1 + 슬리피지율), 매도 체결가 = 종가 × (1 − 슬리피지율)
//! - 수수료 = 체결 금액 × 수수료율, 체결 시점에 현금에서 차감
//! - 추가 매수는 평균 단가를 갱신 (이동평균 원가)
//! - 매도는 보유 수량까지만 청산하고 `Trade`를 생성
//! - 롱 전용 (국내 현물 주식)
//!
//! 모든 금액 연산은 `checked_*`를 사용하며, 오버플로는 `SimulationFailure`가 됩니다.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use trader_core::{return_pct, weighted_average_price, Side, Symbol};
use uuid::Uuid;

use super::config::BacktestConfig;
use crate::error::{BacktestError, BacktestResult};

/// 소수점 수량 허용 시 수량 자릿수.
const FRACTIONAL_DP: u32 = 8;

/// 청산 완료된 거래 기록.
///
/// 포지션이 전부 또는 일부 청산될 때만 생성되며 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// 거래 ID (실행 ID와 순번에서 결정적으로 파생)
    pub id: Uuid,
    /// 심볼
    pub symbol: Symbol,
    /// 포지션 방향 (롱 = Buy)
    pub side: Side,
    /// 진입 가격 (평균 단가)
    pub entry_price: Decimal,
    /// 청산 가격
    pub exit_price: Decimal,
    /// 청산 수량
    pub quantity: Decimal,
    /// 진입 시각
    pub entry_time: DateTime<Utc>,
    /// 청산 시각
    pub exit_time: DateTime<Utc>,
    /// 수수료 (청산 수수료 + 비례 배분된 진입 수수료)
    pub commission: Decimal,
    /// 순손익 (수수료 차감 후)
    pub pnl: Decimal,
    /// 수익률 (%, 원가 대비)
    pub return_pct: Decimal,
}

impl Trade {
    /// 수익 거래 여부.
    pub fn is_winner(&self) -> bool {
        self.pnl > Decimal::ZERO
    }

    /// 진입 원가 (평균 단가 × 수량).
    pub fn cost_basis(&self) -> Decimal {
        self.entry_price * self.quantity
    }
}

/// 자산 곡선의 한 점.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    /// 시각
    pub timestamp: DateTime<Utc>,
    /// 평가 자산 (현금 + 보유 포지션 시가 평가)
    pub equity: Decimal,
}

/// 보유 포지션 상태.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionState {
    /// 보유 수량
    pub quantity: Decimal,
    /// 평균 단가 (슬리피지 반영된 체결가 기준)
    pub avg_price: Decimal,
    /// 아직 청산에 배분되지 않은 진입 수수료
    pub entry_commission: Decimal,
    /// 최초 진입 시각
    pub opened_at: DateTime<Utc>,
}

/// 매수 수량 결정 방식.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderSize {
    /// 지정 수량
    Quantity(Decimal),
    /// 심볼당 자산 몫 대비 비중 (0~1)
    Weight(Decimal),
    /// 설정의 `position_size_pct` 규칙
    Default,
}

/// 모의 체결 내역.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    /// 심볼
    pub symbol: Symbol,
    /// 매수/매도
    pub side: Side,
    /// 체결가
    pub price: Decimal,
    /// 체결 수량
    pub quantity: Decimal,
    /// 수수료
    pub commission: Decimal,
    /// 체결 시각
    pub time: DateTime<Utc>,
}

/// 모의 계좌.
///
/// 한 번의 시뮬레이션 실행이 소유하며 다른 실행과 공유하지 않습니다.
#[derive(Debug, Clone)]
pub struct Account {
    cash: Decimal,
    positions: BTreeMap<Symbol, PositionState>,
    symbol_count: usize,
    commission_rate: Decimal,
    slippage_rate: Decimal,
    position_size_pct: Decimal,
    fractional_shares: bool,
    run_id: Uuid,
    trade_seq: u64,
    total_commission: Decimal,
    total_slippage: Decimal,
}

fn overflow(context: &str) -> BacktestError {
    BacktestError::SimulationFailure(format!("{} 계산 중 오버플로", context))
}

impl Account {
    /// 설정으로 계좌를 생성합니다.
    pub fn new(config: &BacktestConfig) -> Self {
        Self {
            cash: config.initial_capital,
            positions: BTreeMap::new(),
            symbol_count: config.symbols.len().max(1),
            commission_rate: config.commission_rate,
            slippage_rate: config.slippage_rate,
            position_size_pct: config.position_size_pct,
            fractional_shares: config.fractional_shares,
            run_id: config.id,
            trade_seq: 0,
            total_commission: Decimal::ZERO,
            total_slippage: Decimal::ZERO,
        }
    }

    /// 현금 잔고.
    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// 심볼의 보유 포지션.
    pub fn position(&self, symbol: &Symbol) -> Option<&PositionState> {
        self.positions.get(symbol)
    }

    /// 보유 중인 포지션 수.
    pub fn open_positions(&self) -> usize {
        self.positions.len()
    }

    /// 누적 수수료.
    pub fn total_commission(&self) -> Decimal {
        self.total_commission
    }

    /// 누적 슬리피지 비용.
    pub fn total_slippage(&self) -> Decimal {
        self.total_slippage
    }

    /// 시가 평가 자산 (현금 + Σ 보유 수량 × 최근 종가).
    ///
    /// 종가가 없는 심볼은 평균 단가로 평가합니다.
    pub fn equity(&self, marks: &HashMap<Symbol, Decimal>) -> BacktestResult<Decimal> {
        self.positions
            .iter()
            .try_fold(self.cash, |acc, (symbol, position)| {
                let mark = marks.get(symbol).copied().unwrap_or(position.avg_price);
                position
                    .quantity
                    .checked_mul(mark)
                    .and_then(|value| acc.checked_add(value))
            })
            .ok_or_else(|| overflow("평가 자산"))
    }

    /// 매수를 체결합니다.
    ///
    /// 수량이 0으로 계산되면 (현금 부족, 0 비중 등) 무시하고 `None`을 반환합니다.
    pub fn buy(
        &mut self,
        symbol: &Symbol,
        close: Decimal,
        time: DateTime<Utc>,
        size: OrderSize,
        equity: Decimal,
    ) -> BacktestResult<Option<Fill>> {
        if close <= Decimal::ZERO {
            return Ok(None);
        }

        let price = close
            .checked_mul(Decimal::ONE + self.slippage_rate)
            .ok_or_else(|| overflow("매수 체결가"))?;

        let target = match size {
            OrderSize::Quantity(quantity) => quantity,
            OrderSize::Weight(weight) => {
                let share = equity / Decimal::from(self.symbol_count);
                share
                    .checked_mul(weight)
                    .and_then(|amount| amount.checked_div(price))
                    .ok_or_else(|| overflow("비중 수량"))?
            }
            OrderSize::Default => {
                let unallocated = self
                    .symbol_count
                    .saturating_sub(self.positions.len())
                    .max(1);
                self.cash
                    .checked_mul(self.position_size_pct)
                    .and_then(|budget| budget.checked_div(Decimal::from(unallocated)))
                    .and_then(|budget| budget.checked_div(price))
                    .ok_or_else(|| overflow("기본 수량"))?
            }
        };

        // 수수료까지 포함해 살 수 있는 최대 수량
        let unit_cost = price
            .checked_mul(Decimal::ONE + self.commission_rate)
            .ok_or_else(|| overflow("단위 원가"))?;
        let affordable = self
            .cash
            .max(Decimal::ZERO)
            .checked_div(unit_cost)
            .ok_or_else(|| overflow("매수 가능 수량"))?;

        let quantity = self.round_quantity(target.min(affordable));
        if quantity <= Decimal::ZERO {
            return Ok(None);
        }

        let notional = price
            .checked_mul(quantity)
            .ok_or_else(|| overflow("체결 금액"))?;
        let commission = notional
            .checked_mul(self.commission_rate)
            .ok_or_else(|| overflow("수수료"))?;

        self.cash = self
            .cash
            .checked_sub(notional)
            .and_then(|c| c.checked_sub(commission))
            .ok_or_else(|| overflow("현금"))?;
        self.add_costs(commission, price - close, quantity)?;

        match self.positions.get_mut(symbol) {
            Some(position) => {
                position.avg_price =
                    weighted_average_price(position.quantity, position.avg_price, quantity, price)
                        .ok_or_else(|| overflow("평균 단가"))?;
                position.quantity = position
                    .quantity
                    .checked_add(quantity)
                    .ok_or_else(|| overflow("보유 수량"))?;
                position.entry_commission = position
                    .entry_commission
                    .checked_add(commission)
                    .ok_or_else(|| overflow("진입 수수료"))?;
            }
            None => {
                self.positions.insert(
                    symbol.clone(),
                    PositionState {
                        quantity,
                        avg_price: price,
                        entry_commission: commission,
                        opened_at: time,
                    },
                );
            }
        }

        Ok(Some(Fill {
            symbol: symbol.clone(),
            side: Side::Buy,
            price,
            quantity,
            commission,
            time,
        }))
    }

    /// 매도를 체결합니다.
    ///
    /// `quantity`가 없으면 전량 청산합니다. 포지션이 없으면 무시합니다.
    pub fn sell(
        &mut self,
        symbol: &Symbol,
        close: Decimal,
        time: DateTime<Utc>,
        quantity: Option<Decimal>,
    ) -> BacktestResult<Option<Trade>> {
        let Some(position) = self.positions.get(symbol).cloned() else {
            return Ok(None);
        };

        let held = position.quantity;
        let quantity = self.round_quantity(quantity.unwrap_or(held).min(held));
        if quantity <= Decimal::ZERO {
            return Ok(None);
        }

        let price = close
            .checked_mul(Decimal::ONE - self.slippage_rate)
            .ok_or_else(|| overflow("매도 체결가"))?;
        let notional = price
            .checked_mul(quantity)
            .ok_or_else(|| overflow("체결 금액"))?;
        let exit_commission = notional
            .checked_mul(self.commission_rate)
            .ok_or_else(|| overflow("수수료"))?;

        let entry_share = if quantity == held {
            position.entry_commission
        } else {
            position
                .entry_commission
                .checked_mul(quantity)
                .and_then(|c| c.checked_div(held))
                .ok_or_else(|| overflow("진입 수수료 배분"))?
        };

        let gross = price
            .checked_sub(position.avg_price)
            .and_then(|diff| diff.checked_mul(quantity))
            .ok_or_else(|| overflow("실현 손익"))?;
        let commission = exit_commission
            .checked_add(entry_share)
            .ok_or_else(|| overflow("수수료"))?;
        let pnl = gross
            .checked_sub(commission)
            .ok_or_else(|| overflow("실현 손익"))?;
        let cost_basis = position
            .avg_price
            .checked_mul(quantity)
            .ok_or_else(|| overflow("원가"))?;

        let trade = Trade {
            id: self.next_trade_id(),
            symbol: symbol.clone(),
            side: Side::Buy,
            entry_price: position.avg_price,
            exit_price: price,
            quantity,
            entry_time: position.opened_at,
            exit_time: time,
            commission,
            pnl,
            return_pct: return_pct(pnl, cost_basis),
        };

        self.cash = self
            .cash
            .checked_add(notional - exit_commission)
            .ok_or_else(|| overflow("현금"))?;
        self.add_costs(exit_commission, close - price, quantity)?;

        if quantity == held {
            self.positions.remove(symbol);
        } else if let Some(position) = self.positions.get_mut(symbol) {
            position.quantity -= quantity;
            position.entry_commission -= entry_share;
        }

        Ok(Some(trade))
    }

    fn add_costs(
        &mut self,
        commission: Decimal,
        slippage_per_unit: Decimal,
        quantity: Decimal,
    ) -> BacktestResult<()> {
        self.total_commission = self
            .total_commission
            .checked_add(commission)
            .ok_or_else(|| overflow("누적 수수료"))?;
        self.total_slippage = slippage_per_unit
            .checked_mul(quantity)
            .and_then(|cost| self.total_slippage.checked_add(cost))
            .ok_or_else(|| overflow("누적 슬리피지"))?;
        Ok(())
    }

    /// 모든 보유 포지션을 최근 종가로 청산합니다.
    pub fn close_all(
        &mut self,
        marks: &HashMap<Symbol, (Decimal, DateTime<Utc>)>,
    ) -> BacktestResult<Vec<Trade>> {
        let symbols: Vec<Symbol> = self.positions.keys().cloned().collect();
        let mut trades = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            let Some(&(close, time)) = marks.get(&symbol) else {
                return Err(BacktestError::SimulationFailure(format!(
                    "{} 청산 가격이 없습니다",
                    symbol
                )));
            };
            if let Some(trade) = self.sell(&symbol, close, time, None)? {
                trades.push(trade);
            }
        }

        Ok(trades)
    }

    fn round_quantity(&self, quantity: Decimal) -> Decimal {
        let dp = if self.fractional_shares { FRACTIONAL_DP } else { 0 };
        quantity.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
    }

    fn next_trade_id(&mut self) -> Uuid {
        self.trade_seq += 1;
        Uuid::from_u128(self.run_id.as_u128().wrapping_add(u128::from(self.trade_seq)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use trader_core::DateRange;

    fn samsung() -> Symbol {
        Symbol::kr_stock("005930")
    }

    fn config() -> BacktestConfig {
        BacktestConfig::new(
            "buy_and_hold",
            vec![samsung()],
            DateRange::from_days(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 30),
        )
        .with_initial_capital(dec!(1000000))
        .with_commission_rate(dec!(0.001))
        .with_slippage_rate(dec!(0.01))
    }

    fn t(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day)
    }

    #[test]
    fn test_buy_fill_price_and_commission() {
        let mut account = Account::new(&config());
        let fill = account
            .buy(&samsung(), dec!(1000), t(0), OrderSize::Quantity(dec!(10)), dec!(1000000))
            .unwrap()
            .unwrap();

        // 매수는 불리하게: 1000 × 1.01
        assert_eq!(fill.price, dec!(1010));
        assert_eq!(fill.commission, dec!(10.1));
        assert_eq!(account.cash(), dec!(1000000) - dec!(10100) - dec!(10.1));
        assert_eq!(account.total_slippage(), dec!(100));
    }

    #[test]
    fn test_round_trip_pnl() {
        let mut account = Account::new(&config());
        account
            .buy(&samsung(), dec!(1000), t(0), OrderSize::Quantity(dec!(10)), dec!(1000000))
            .unwrap();
        let trade = account
            .sell(&samsung(), dec!(1200), t(5), None)
            .unwrap()
            .unwrap();

        // 매도는 1200 × 0.99 = 1188
        assert_eq!(trade.exit_price, dec!(1188));
        assert_eq!(trade.entry_price, dec!(1010));
        // (1188 - 1010) × 10 - 11.88 - 10.1
        assert_eq!(trade.pnl, dec!(1780) - dec!(11.88) - dec!(10.1));
        assert_eq!(trade.commission, dec!(21.98));
        assert_eq!(trade.entry_time, t(0));
        assert_eq!(trade.exit_time, t(5));
        assert_eq!(account.open_positions(), 0);
        assert_eq!(account.cash(), dec!(1000000) + trade.pnl);
    }

    #[test]
    fn test_average_cost_on_add() {
        let cfg = config().with_slippage_rate(dec!(0));
        let mut account = Account::new(&cfg);
        account
            .buy(&samsung(), dec!(100), t(0), OrderSize::Quantity(dec!(10)), dec!(0))
            .unwrap();
        account
            .buy(&samsung(), dec!(200), t(1), OrderSize::Quantity(dec!(10)), dec!(0))
            .unwrap();

        let position = account.position(&samsung()).unwrap();
        assert_eq!(position.quantity, dec!(20));
        assert_eq!(position.avg_price, dec!(150));
        assert_eq!(position.opened_at, t(0));
    }

    #[test]
    fn test_partial_sell_allocates_entry_commission() {
        let cfg = config().with_slippage_rate(dec!(0));
        let mut account = Account::new(&cfg);
        account
            .buy(&samsung(), dec!(100), t(0), OrderSize::Quantity(dec!(10)), dec!(0))
            .unwrap();
        let trade = account
            .sell(&samsung(), dec!(110), t(1), Some(dec!(4)))
            .unwrap()
            .unwrap();

        // 진입 수수료 1.0 중 40% 배분 + 청산 수수료 0.44
        assert_eq!(trade.commission, dec!(0.84));
        assert_eq!(trade.pnl, dec!(40) - dec!(0.84));
        let remaining = account.position(&samsung()).unwrap();
        assert_eq!(remaining.quantity, dec!(6));
        assert_eq!(remaining.entry_commission, dec!(0.6));
    }

    #[test]
    fn test_default_sizing_uses_whole_shares() {
        let mut account = Account::new(&config());
        let fill = account
            .buy(&samsung(), dec!(70000), t(0), OrderSize::Default, dec!(1000000))
            .unwrap()
            .unwrap();

        // 1,000,000 / (70700 × 1.001) = 14.13… → 14주
        assert_eq!(fill.quantity, dec!(14));
        assert!(account.cash() >= Decimal::ZERO);
    }

    #[test]
    fn test_ignored_orders() {
        let mut account = Account::new(&config());
        // 포지션 없이 매도
        assert!(account
            .sell(&samsung(), dec!(1000), t(0), None)
            .unwrap()
            .is_none());
        // 현금으로 1주도 살 수 없음
        assert!(account
            .buy(&samsung(), dec!(5000000), t(0), OrderSize::Default, dec!(1000000))
            .unwrap()
            .is_none());
        // 0 비중
        assert!(account
            .buy(&samsung(), dec!(1000), t(0), OrderSize::Weight(dec!(0)), dec!(1000000))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_quantity_capped_by_cash() {
        let mut account = Account::new(&config());
        let fill = account
            .buy(&samsung(), dec!(1000), t(0), OrderSize::Quantity(dec!(100000)), dec!(1000000))
            .unwrap()
            .unwrap();
        assert!(fill.quantity < dec!(1000));
        assert!(account.cash() >= Decimal::ZERO);
    }

    #[test]
    fn test_equity_marks_to_market() {
        let cfg = config().with_slippage_rate(dec!(0)).with_commission_rate(dec!(0));
        let mut account = Account::new(&cfg);
        account
            .buy(&samsung(), dec!(100), t(0), OrderSize::Quantity(dec!(10)), dec!(0))
            .unwrap();

        let mut marks = HashMap::new();
        marks.insert(samsung(), dec!(120));
        assert_eq!(account.equity(&marks).unwrap(), dec!(1000200));
    }

    #[test]
    fn test_default_sizing_overflow_is_simulation_failure() {
        // 검증을 거치지 않은 설정으로 계좌를 직접 만들면 한도를 넘는 비율도 들어올 수 있음
        let config = config()
            .with_initial_capital(Decimal::MAX)
            .with_position_size_pct(dec!(1.5));
        let mut account = Account::new(&config);

        let result = account.buy(&samsung(), dec!(1000), t(0), OrderSize::Default, Decimal::MAX);
        assert!(matches!(result, Err(BacktestError::SimulationFailure(_))));
        assert_eq!(account.open_positions(), 0);
    }

    #[test]
    fn test_sell_cash_overflow_is_simulation_failure() {
        let config = config().with_initial_capital(Decimal::MAX);
        let mut account = Account::new(&config);
        let half = Decimal::MAX / dec!(2);

        account
            .buy(&samsung(), half, t(0), OrderSize::Quantity(dec!(1)), Decimal::MAX)
            .unwrap()
            .unwrap();

        let result = account.sell(&samsung(), Decimal::MAX, t(1), None);
        assert!(matches!(result, Err(BacktestError::SimulationFailure(_))));
    }

    #[test]
    fn test_trade_ids_are_deterministic() {
        let cfg = config();
        let run = |cfg: &BacktestConfig| {
            let mut account = Account::new(cfg);
            account
                .buy(&samsung(), dec!(1000), t(0), OrderSize::Quantity(dec!(1)), dec!(0))
                .unwrap();
            account.sell(&samsung(), dec!(1000), t(1), None).unwrap().unwrap().id
        };
        assert_eq!(run(&cfg), run(&cfg));
    }
}
