//! 몬테카를로 재표본 통합 테스트.

use rand::rngs::StdRng;
use rand::SeedableRng;

use trader_analytics::monte_carlo::{
    MonteCarloConfig, MonteCarloMethod, MonteCarloSimulator, Resampler,
};

/// 10개 거래의 수익률 (비율).
const RETURNS: [f64; 10] = [0.05, -0.02, 0.03, 0.04, -0.01, 0.02, -0.03, 0.06, -0.02, 0.01];

fn compounded_pct(returns: &[f64]) -> f64 {
    (returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0) * 100.0
}

fn bootstrap(simulations: usize) -> MonteCarloConfig {
    MonteCarloConfig::default()
        .with_method(MonteCarloMethod::Bootstrap)
        .with_simulations(simulations)
        .with_seed(42)
}

#[test]
fn test_bootstrap_scenario_is_reproducible() {
    let simulator = MonteCarloSimulator::new(bootstrap(10_000));

    let first = simulator.simulate_returns(&RETURNS).unwrap();
    let second = simulator.simulate_returns(&RETURNS).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.simulations, 10_000);
    assert!(first.ci_lower_pct <= first.median_return_pct);
    assert!(first.median_return_pct <= first.ci_upper_pct);
    assert!(first.worst_return_pct <= first.ci_lower_pct);
    assert!(first.ci_upper_pct <= first.best_return_pct);
    assert!((0.0..=1.0).contains(&first.probability_of_profit));
    assert_eq!(
        first.histogram.iter().map(|b| b.count).sum::<usize>(),
        10_000
    );
}

#[test]
fn test_bootstrap_mean_converges_to_original() {
    let result = MonteCarloSimulator::new(bootstrap(10_000))
        .simulate_returns(&RETURNS)
        .unwrap();

    let original = compounded_pct(&RETURNS);
    assert!((result.original_return_pct - original).abs() < 1e-9);
    // 복원 추출 평균은 (1 + 평균 수익률)^n 쪽으로 약간 치우침
    assert!(
        (result.mean_return_pct - original).abs() < 1.5,
        "mean {} vs original {}",
        result.mean_return_pct,
        original
    );
}

#[test]
fn test_different_seeds_differ() {
    let a = MonteCarloSimulator::new(bootstrap(500))
        .simulate_returns(&RETURNS)
        .unwrap();
    let b = MonteCarloSimulator::new(bootstrap(500).with_seed(7))
        .simulate_returns(&RETURNS)
        .unwrap();
    assert_ne!(a.mean_return_pct, b.mean_return_pct);
}

#[test]
fn test_permutation_preserves_trade_multiset() {
    let config = MonteCarloConfig::default()
        .with_method(MonteCarloMethod::Permutation)
        .with_seed(3);
    let resampler = Resampler::new(&RETURNS, &config);
    let mut rng = StdRng::seed_from_u64(3);

    let mut expected = RETURNS.to_vec();
    expected.sort_by(f64::total_cmp);

    for _ in 0..200 {
        let mut path = resampler.next_path(&mut rng);
        path.sort_by(f64::total_cmp);
        assert_eq!(path, expected);
    }
}

#[test]
fn test_permutation_final_return_is_order_invariant() {
    let result = MonteCarloSimulator::new(
        MonteCarloConfig::default()
            .with_method(MonteCarloMethod::Permutation)
            .with_simulations(1_000)
            .with_seed(9),
    )
    .simulate_returns(&RETURNS)
    .unwrap();

    let original = compounded_pct(&RETURNS);
    assert!((result.mean_return_pct - original).abs() < 1e-6);
    assert!((result.worst_return_pct - result.best_return_pct).abs() < 1e-6);
    // 최종 수익률은 같아도 낙폭은 순서에 따라 달라짐
    assert!(result.worst_max_drawdown_pct >= result.median_max_drawdown_pct);
}

#[test]
fn test_block_permutation_keeps_blocks_contiguous() {
    let config = MonteCarloConfig::default()
        .with_method(MonteCarloMethod::Permutation)
        .with_blocks(5);
    let resampler = Resampler::new(&RETURNS, &config);
    let mut rng = StdRng::seed_from_u64(1);

    for _ in 0..50 {
        let path = resampler.next_path(&mut rng);
        let first_half = &RETURNS[..5];
        let second_half = &RETURNS[5..];
        assert!(path[..5] == *first_half || path[..5] == *second_half);
    }
}

#[test]
fn test_parametric_statistics() {
    let result = MonteCarloSimulator::new(
        MonteCarloConfig::default()
            .with_method(MonteCarloMethod::Parametric)
            .with_simulations(5_000)
            .with_seed(11),
    )
    .simulate_returns(&RETURNS)
    .unwrap();

    assert!(result.std_dev_return_pct > 0.0);
    assert!(result.mean_return_pct > 0.0);
    assert!(result.worst_return_pct > -100.0);
}

#[test]
fn test_empty_trades_yield_zero_distribution() {
    let result = MonteCarloSimulator::new(bootstrap(100))
        .simulate_returns(&[])
        .unwrap();

    assert_eq!(result.simulations, 100);
    assert_eq!(result.mean_return_pct, 0.0);
    assert_eq!(result.probability_of_profit, 0.0);
    let config = bootstrap(100);
    assert_eq!(result.histogram.len(), config.distribution_bins);
    assert_eq!(
        result.histogram.iter().map(|b| b.count).sum::<usize>(),
        100
    );
}
