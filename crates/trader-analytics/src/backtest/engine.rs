//! 봉 재생 시뮬레이터 (백테스트 엔진)
//!
//! 심볼별 봉을 불러와 시각 순으로 하나의 스트림으로 합친 뒤 한 봉씩 재생합니다.
//! 각 봉에서 전략은 그 봉에서 끝나는 윈도우만 보고 결정을 내립니다 (미래 봉 비공개).
//! 결정은 같은 봉의 종가로 모의 체결되고, 같은 시각의 봉을 모두 처리한 뒤
//! 자산 곡선에 한 점을 기록합니다. 기간이 끝나면 남은 포지션을 마지막 종가로 청산합니다.
//!
//! 재생 루프에는 대기 지점이 없습니다. 비동기 실행은 작업 레지스트리가 담당합니다.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use trader_core::{Kline, Symbol};
use trader_data::BarDataProvider;
use trader_strategy::{Decision, SignalAction, Strategy, StrategyRegistry};

use super::accounting::{Account, EquityPoint, OrderSize, Trade};
use super::config::BacktestConfig;
use super::report::BacktestReport;
use crate::error::{BacktestError, BacktestResult};
use crate::performance::{MetricsConfig, PerformanceMetrics};

/// 진행률 수신자.
///
/// 작업 레지스트리가 구현하며, 시뮬레이터와 외곽 루프가 (완료, 전체) 단위로 보고합니다.
pub trait ProgressSink: Send + Sync {
    /// 진행률을 보고합니다.
    fn report(&self, current: u64, total: u64);
}

/// 실행 제어 (취소 토큰 + 진행률 수신자).
#[derive(Clone, Default)]
pub struct RunControl {
    /// 취소 토큰. 봉마다 한 번 확인합니다.
    pub cancel: CancellationToken,
    /// 진행률 수신자
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl fmt::Debug for RunControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunControl")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl RunControl {
    /// 취소되지 않은 새 제어 객체.
    pub fn new() -> Self {
        Self::default()
    }

    /// 취소 토큰을 지정합니다.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 진행률 수신자를 지정합니다.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// 같은 취소 토큰을 공유하고 진행률은 보고하지 않는 복사본.
    ///
    /// 외곽 루프가 내부 실행의 봉 단위 진행률 대신 자체 단위로 보고할 때 씁니다.
    pub fn silent(&self) -> Self {
        Self {
            cancel: self.cancel.clone(),
            progress: None,
        }
    }

    /// 취소 여부.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 취소되었으면 `Cancelled`를 반환합니다.
    pub fn check(&self) -> BacktestResult<()> {
        if self.cancel.is_cancelled() {
            Err(BacktestError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// 진행률을 보고합니다.
    pub fn report(&self, current: u64, total: u64) {
        if let Some(progress) = &self.progress {
            progress.report(current, total);
        }
    }
}

/// 백테스팅 엔진
///
/// 데이터 제공자와 전략 레지스트리에만 의존하며 구체 전략 타입은 알지 못합니다.
/// 실행 간 공유하는 가변 상태가 없으므로 `Arc`로 여러 작업에서 동시에 사용할 수 있습니다.
pub struct BacktestEngine {
    provider: Arc<dyn BarDataProvider>,
    sources: HashMap<String, Arc<dyn BarDataProvider>>,
    registry: Arc<StrategyRegistry>,
    metrics_config: MetricsConfig,
}

impl fmt::Debug for BacktestEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sources: Vec<&String> = self.sources.keys().collect();
        sources.sort();
        f.debug_struct("BacktestEngine")
            .field("provider", &self.provider.name())
            .field("sources", &sources)
            .field("registry", &self.registry)
            .field("metrics_config", &self.metrics_config)
            .finish()
    }
}

impl BacktestEngine {
    /// 새로운 백테스트 엔진을 생성합니다.
    pub fn new(provider: Arc<dyn BarDataProvider>, registry: Arc<StrategyRegistry>) -> Self {
        Self {
            provider,
            sources: HashMap::new(),
            registry,
            metrics_config: MetricsConfig::default(),
        }
    }

    /// 이름으로 선택 가능한 추가 데이터 소스를 등록합니다.
    pub fn with_data_source(
        mut self,
        name: impl Into<String>,
        provider: Arc<dyn BarDataProvider>,
    ) -> Self {
        self.sources.insert(name.into(), provider);
        self
    }

    /// 지표 계산 정책을 설정합니다.
    pub fn with_metrics_config(mut self, config: MetricsConfig) -> Self {
        self.metrics_config = config;
        self
    }

    /// 지표 계산 정책.
    pub fn metrics_config(&self) -> &MetricsConfig {
        &self.metrics_config
    }

    /// 전략 레지스트리.
    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// ID 또는 별칭으로 전략을 조회합니다.
    pub fn strategy(&self, id: &str) -> BacktestResult<Arc<dyn Strategy>> {
        Ok(self.registry.get(id)?)
    }

    /// 백테스트를 실행합니다.
    pub fn run(&self, config: &BacktestConfig) -> BacktestResult<BacktestReport> {
        self.run_with_control(config, &RunControl::default())
    }

    /// 취소·진행률 제어와 함께 백테스트를 실행합니다.
    ///
    /// # 오류
    ///
    /// - `InvalidConfig`: 설정 검증 실패, 알 수 없는 데이터 소스
    /// - `Strategy`: 알 수 없는 전략, 잘못된 파라미터 (루프 진입 전 검증)
    /// - `InsufficientData`: 심볼의 봉 수가 전략 최소 봉 수 미만
    /// - `SimulationFailure`: 재생 중 전략 평가 실패, 연산 오버플로
    /// - `Cancelled`: 취소 토큰이 봉 처리 전에 취소됨
    #[instrument(
        name = "backtest",
        skip_all,
        fields(strategy = %config.strategy_id, run_id = %config.id)
    )]
    pub fn run_with_control(
        &self,
        config: &BacktestConfig,
        control: &RunControl,
    ) -> BacktestResult<BacktestReport> {
        let started = Instant::now();
        config.validate()?;

        // 파라미터는 루프 밖에서 한 번만 검증
        let strategy = self.strategy(&config.strategy_id)?;
        let params = strategy.resolve_params(&config.params)?;
        let min_bars = strategy.min_bars(&params).max(1);
        let provider = self.provider_for(config)?;

        let series = self.load_series(provider.as_ref(), config, min_bars)?;
        let schedule = merge_schedule(&series);
        let total = schedule.len() as u64;

        info!(
            symbols = config.symbols.len(),
            bars = schedule.len(),
            range = %config.range,
            params = %params,
            "백테스트 시작"
        );

        let mut account = Account::new(config);
        let mut marks: HashMap<Symbol, Decimal> = HashMap::with_capacity(config.symbols.len());
        let mut last_bars: HashMap<Symbol, (Decimal, DateTime<Utc>)> =
            HashMap::with_capacity(config.symbols.len());
        let mut trades: Vec<Trade> = Vec::new();
        let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(schedule.len() + 1);

        if let Some(&(s, b)) = schedule.first() {
            equity_curve.push(EquityPoint {
                timestamp: series[s][b].open_time,
                equity: config.initial_capital,
            });
        }

        let mut processed = 0usize;
        let mut cursor = 0usize;
        while cursor < schedule.len() {
            let (s, b) = schedule[cursor];
            let group_time = series[s][b].open_time;
            let mut group_close = series[s][b].close_time;

            // 같은 시각의 봉은 설정의 심볼 순서대로 처리
            while cursor < schedule.len() {
                let (s, b) = schedule[cursor];
                let bar = &series[s][b];
                if bar.open_time != group_time {
                    break;
                }

                control.check()?;

                let symbol = &config.symbols[s];
                marks.insert(symbol.clone(), bar.close);
                last_bars.insert(symbol.clone(), (bar.close, bar.close_time));

                let window = &series[s][..=b];
                if window.len() >= min_bars {
                    let decision = strategy.evaluate(window, &params).map_err(|e| {
                        BacktestError::SimulationFailure(format!(
                            "{} {} 전략 평가 실패: {}",
                            symbol, bar.open_time, e
                        ))
                    })?;
                    if let Some(trade) =
                        apply_decision(&mut account, symbol, bar, &decision, &marks)?
                    {
                        trades.push(trade);
                    }
                }

                group_close = group_close.max(bar.close_time);
                processed += 1;
                cursor += 1;
                control.report(processed as u64, total);
            }

            equity_curve.push(EquityPoint {
                timestamp: group_close,
                equity: account.equity(&marks)?,
            });
        }

        // 미청산 포지션 강제 청산
        let forced = account.close_all(&last_bars)?;
        if !forced.is_empty() {
            debug!(count = forced.len(), "기간 종료 강제 청산");
        }
        trades.extend(forced);

        let final_capital = account.cash();
        if let Some(last) = equity_curve.last_mut() {
            last.equity = final_capital;
        }

        let metrics = PerformanceMetrics::calculate(
            &trades,
            &equity_curve,
            config.initial_capital,
            &self.metrics_config,
        );
        let metrics_by_symbol = self.metrics_by_symbol(config, &trades);
        let total_return_pct = final_capital
            .checked_sub(config.initial_capital)
            .and_then(|gain| gain.checked_div(config.initial_capital))
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(|| {
                BacktestError::SimulationFailure("총 수익률 계산 중 오버플로".to_string())
            })?;

        info!(
            trades = trades.len(),
            final_capital = %final_capital,
            summary = %metrics.summary(),
            "백테스트 완료"
        );

        Ok(BacktestReport {
            config: config.clone(),
            final_capital,
            total_return_pct,
            trades,
            equity_curve,
            metrics,
            metrics_by_symbol,
            total_commission: account.total_commission(),
            total_slippage: account.total_slippage(),
            bars_processed: processed,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn provider_for(&self, config: &BacktestConfig) -> BacktestResult<Arc<dyn BarDataProvider>> {
        match config.data_source.as_deref() {
            None => Ok(Arc::clone(&self.provider)),
            Some(name) if name == self.provider.name() => Ok(Arc::clone(&self.provider)),
            Some(name) => self.sources.get(name).cloned().ok_or_else(|| {
                BacktestError::InvalidConfig(format!("알 수 없는 데이터 소스: {}", name))
            }),
        }
    }

    fn load_series(
        &self,
        provider: &dyn BarDataProvider,
        config: &BacktestConfig,
        min_bars: usize,
    ) -> BacktestResult<Vec<Vec<Kline>>> {
        config
            .symbols
            .iter()
            .map(|symbol| {
                let mut bars = provider.get_bars(symbol, config.timeframe, &config.range)?;
                bars.sort_by_key(|k| k.open_time);

                if bars.len() < min_bars {
                    return Err(BacktestError::InsufficientData {
                        symbol: symbol.to_string(),
                        required: min_bars,
                        available: bars.len(),
                    });
                }

                debug!(symbol = %symbol, bars = bars.len(), source = provider.name(), "봉 데이터 로드");
                Ok(bars)
            })
            .collect()
    }

    /// 심볼별 성과를 계산합니다. 자본은 심볼 수로 균등 배분한 것으로 봅니다.
    fn metrics_by_symbol(
        &self,
        config: &BacktestConfig,
        trades: &[Trade],
    ) -> std::collections::BTreeMap<String, PerformanceMetrics> {
        let capital_share = config.initial_capital / Decimal::from(config.symbols.len());

        config
            .symbols
            .iter()
            .map(|symbol| {
                let symbol_trades: Vec<Trade> = trades
                    .iter()
                    .filter(|t| &t.symbol == symbol)
                    .cloned()
                    .collect();
                let metrics = PerformanceMetrics::from_trades(
                    &symbol_trades,
                    capital_share,
                    &self.metrics_config,
                );
                (symbol.to_string(), metrics)
            })
            .collect()
    }
}

/// 심볼별 봉 목록을 (시각, 설정 내 심볼 순서)로 정렬한 단일 재생 순서로 합칩니다.
fn merge_schedule(series: &[Vec<Kline>]) -> Vec<(usize, usize)> {
    let mut schedule: Vec<(usize, usize)> = series
        .iter()
        .enumerate()
        .flat_map(|(s, bars)| (0..bars.len()).map(move |b| (s, b)))
        .collect();
    schedule.sort_by(|&(sa, ba), &(sb, bb)| {
        series[sa][ba]
            .open_time
            .cmp(&series[sb][bb].open_time)
            .then(sa.cmp(&sb))
    });
    schedule
}

/// 전략 결정을 현재 봉 종가로 체결합니다.
fn apply_decision(
    account: &mut Account,
    symbol: &Symbol,
    bar: &Kline,
    decision: &Decision,
    marks: &HashMap<Symbol, Decimal>,
) -> BacktestResult<Option<Trade>> {
    match decision.action {
        SignalAction::Buy => {
            let size = match (decision.quantity, decision.weight) {
                (Some(quantity), _) => OrderSize::Quantity(quantity),
                (None, Some(weight)) => OrderSize::Weight(weight),
                (None, None) => OrderSize::Default,
            };
            let equity = account.equity(marks)?;
            if let Some(fill) = account.buy(symbol, bar.close, bar.close_time, size, equity)? {
                debug!(
                    symbol = %symbol,
                    price = %fill.price,
                    quantity = %fill.quantity,
                    "매수 체결"
                );
            }
            Ok(None)
        }
        SignalAction::Sell => {
            let trade = account.sell(symbol, bar.close, bar.close_time, decision.quantity)?;
            if let Some(trade) = &trade {
                debug!(
                    symbol = %symbol,
                    price = %trade.exit_price,
                    pnl = %trade.pnl,
                    "매도 체결"
                );
            }
            Ok(trade)
        }
        SignalAction::Hold => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BacktestError;
    use chrono::{Duration, NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU64, Ordering};
    use trader_core::{DateRange, Timeframe};
    use trader_data::InMemoryBarProvider;
    use trader_strategy::{ParamSpec, StrategyParams, StrategyResult};

    /// 윈도우 길이로 매매 시점을 정하는 테스트 전략.
    struct ScriptedStrategy;

    impl Strategy for ScriptedStrategy {
        fn id(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "Scripted"
        }

        fn description(&self) -> &str {
            "2번째 봉 매수, 5번째 봉 매도"
        }

        fn schema(&self) -> Vec<ParamSpec> {
            vec![ParamSpec::int("quantity", 10, 1, 1000, "매수 수량")]
        }

        fn min_bars(&self, _params: &StrategyParams) -> usize {
            2
        }

        fn evaluate(&self, window: &[Kline], params: &StrategyParams) -> StrategyResult<Decision> {
            Ok(match window.len() {
                2 => Decision::buy().with_quantity(Decimal::from(params.get_int("quantity")?)),
                5 => Decision::sell(),
                _ => Decision::hold(),
            })
        }
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn create_test_klines(symbol: &Symbol, closes: &[i64]) -> Vec<Kline> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let price = Decimal::from(c);
                let open_time = base + Duration::days(i as i64);
                Kline::new(
                    symbol.clone(),
                    Timeframe::D1,
                    open_time,
                    price,
                    price * dec!(1.01),
                    price * dec!(0.99),
                    price,
                    dec!(1000),
                    open_time + Duration::days(1),
                )
            })
            .collect()
    }

    fn engine(klines: Vec<Kline>) -> BacktestEngine {
        let mut registry = StrategyRegistry::with_builtins();
        registry.register(Arc::new(ScriptedStrategy), &[]);
        let provider = InMemoryBarProvider::new().with_klines(klines);
        BacktestEngine::new(Arc::new(provider), Arc::new(registry))
    }

    fn config(strategy: &str, symbols: Vec<Symbol>) -> BacktestConfig {
        BacktestConfig::new(strategy, symbols, DateRange::from_days(start(), 30))
            .with_initial_capital(dec!(1000000))
            .with_commission_rate(dec!(0))
            .with_slippage_rate(dec!(0))
    }

    #[test]
    fn test_scripted_round_trip() {
        let samsung = Symbol::kr_stock("005930");
        let engine = engine(create_test_klines(&samsung, &[100, 100, 110, 120, 130, 125, 125]));

        let report = engine.run(&config("scripted", vec![samsung])).unwrap();

        // 2번째 봉 종가 100에 매수 → 5번째 봉 종가 130에 매도
        assert_eq!(report.trades.len(), 1);
        let trade = &report.trades[0];
        assert_eq!(trade.entry_price, dec!(100));
        assert_eq!(trade.exit_price, dec!(130));
        assert_eq!(trade.pnl, dec!(300));
        assert_eq!(report.final_capital, dec!(1000300));
        assert_eq!(report.total_return_pct, dec!(0.03));
        assert_eq!(report.bars_processed, 7);
        // 초기 자본 점 + 봉마다 한 점
        assert_eq!(report.equity_curve.len(), 8);
        assert_eq!(report.equity_curve[0].equity, dec!(1000000));
        // 3번째 봉 종가 110으로 평가
        assert_eq!(report.equity_curve[3].equity, dec!(1000100));
    }

    #[test]
    fn test_open_position_forced_closed() {
        let samsung = Symbol::kr_stock("005930");
        let engine = engine(create_test_klines(&samsung, &[100, 100, 105, 110]));

        let report = engine.run(&config("scripted", vec![samsung])).unwrap();

        assert_eq!(report.trades.len(), 1);
        assert_eq!(report.trades[0].exit_price, dec!(110));
        assert_eq!(report.equity_curve.last().unwrap().equity, report.final_capital);
        assert_eq!(report.final_capital, dec!(1000100));
    }

    #[test]
    fn test_multi_symbol_interleaves_by_time() {
        let a = Symbol::kr_stock("005930");
        let b = Symbol::kr_stock("000660");
        let mut klines = create_test_klines(&a, &[100, 101, 102, 103, 104]);
        klines.extend(create_test_klines(&b, &[50, 51, 52, 53, 54]));
        let engine = engine(klines);

        let report = engine
            .run(&config("buy_and_hold", vec![a.clone(), b.clone()]))
            .unwrap();

        assert_eq!(report.bars_processed, 10);
        // 시각당 한 점 + 초기 점
        assert_eq!(report.equity_curve.len(), 6);
        assert!(report
            .equity_curve
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(report.trades.len(), 2);
        assert!(report.metrics_by_symbol.contains_key("005930/KRW"));
        assert!(report.metrics_by_symbol.contains_key("000660/KRW"));
    }

    #[test]
    fn test_insufficient_data() {
        let samsung = Symbol::kr_stock("005930");
        let engine = engine(create_test_klines(&samsung, &[100, 101, 102]));
        let config = config("sma_crossover", vec![samsung]);

        match engine.run(&config) {
            Err(BacktestError::InsufficientData {
                required,
                available,
                ..
            }) => {
                assert_eq!(required, 21);
                assert_eq!(available, 3);
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.trades.len())),
        }
    }

    #[test]
    fn test_configuration_errors() {
        let samsung = Symbol::kr_stock("005930");
        let engine = engine(create_test_klines(&samsung, &[100, 101, 102]));

        let unknown = config("macd", vec![samsung.clone()]);
        assert!(engine.run(&unknown).unwrap_err().is_configuration_error());

        let bad_param = config("sma", vec![samsung.clone()]).with_param("lookback", 5i64);
        assert!(engine.run(&bad_param).unwrap_err().is_configuration_error());

        let bad_source = config("buy_and_hold", vec![samsung.clone()]).with_data_source("kis");
        assert!(matches!(
            engine.run(&bad_source),
            Err(BacktestError::InvalidConfig(_))
        ));

        let named_default = config("buy_and_hold", vec![samsung]).with_data_source("memory");
        assert!(engine.run(&named_default).is_ok());
    }

    #[test]
    fn test_cancelled_before_first_bar() {
        let samsung = Symbol::kr_stock("005930");
        let engine = engine(create_test_klines(&samsung, &[100, 101, 102]));
        let control = RunControl::new();
        control.cancel.cancel();

        let result = engine.run_with_control(&config("buy_and_hold", vec![samsung]), &control);
        assert!(matches!(result, Err(BacktestError::Cancelled)));
    }

    #[test]
    fn test_progress_reported_per_bar() {
        struct Counter(AtomicU64, AtomicU64);
        impl ProgressSink for Counter {
            fn report(&self, current: u64, total: u64) {
                self.0.store(current, Ordering::SeqCst);
                self.1.store(total, Ordering::SeqCst);
            }
        }

        let samsung = Symbol::kr_stock("005930");
        let engine = engine(create_test_klines(&samsung, &[100, 101, 102, 103]));
        let counter = Arc::new(Counter(AtomicU64::new(0), AtomicU64::new(0)));
        let control = RunControl::new().with_progress(counter.clone());

        engine
            .run_with_control(&config("buy_and_hold", vec![samsung]), &control)
            .unwrap();

        assert_eq!(counter.0.load(Ordering::SeqCst), 4);
        assert_eq!(counter.1.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_summary_not_empty() {
        let samsung = Symbol::kr_stock("005930");
        let engine = engine(create_test_klines(&samsung, &[100, 101, 102, 103]));
        let report = engine.run(&config("buy_and_hold", vec![samsung])).unwrap();
        let summary = report.summary();
        assert!(summary.contains("총 수익률"));
        assert!(summary.contains("buy_and_hold"));
    }
}
