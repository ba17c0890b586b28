mod common;

use efg_cfr::{
    run_solver,
    solvers::{
        cfr::{
            CfrArgs,
            CfrSolver,
        },
        icfr::{
            IcfrArgs,
            IcfrSolver,
        },
        reconstruction_cfr::{
            ReconstructionCfrArgs,
            ReconstructionCfrSolver,
        },
        sample_cfr::{
            SampleCfrArgs,
            SampleCfrSolver,
        },
    },
    Solver,
};
use more_asserts::{
    assert_le,
    assert_lt,
};

use common::*;

#[test]
fn test_cfr_dominant_strategies() {
    init_logger();
    let mut solver = CfrSolver::new(dominant_strategy_game(), CfrArgs::default());
    let result = run_solver(&mut solver, 10000, 1000, |_| {}).unwrap();

    assert_eq!(result.timeline.len(), 10);
    let last = result.timeline.last().unwrap();
    for e in &last.epsilon {
        assert_lt!(*e, 0.01);
    }
    assert_lt!((result.utility[0] - 0.5).abs(), 0.01);
    assert_lt!((result.utility[1] + 0.5).abs(), 0.01);
}

#[test]
fn test_cfr_kuhn() {
    init_logger();
    let mut solver = CfrSolver::new(kuhn(), CfrArgs::default());
    let result = run_solver(&mut solver, 2000, 0, |_| {}).unwrap();
    assert!(result.timeline.is_empty());
    assert_lt!((result.utility[0] - KUHN_VALUE).abs(), 0.03);

    let epsilon = efg_cfr::eval::marginal_epsilon(solver.tree_ref(), &efg_cfr::strategy::AverageStrategy);
    for e in epsilon {
        assert_lt!(e, 0.05);
    }
}

#[test]
fn test_cfr_plus_kuhn() {
    init_logger();
    let mut solver = CfrSolver::new(
        kuhn(),
        CfrArgs {
            cfr_plus: true,
        },
    );
    let result = run_solver(&mut solver, 1000, 1000, |_| {}).unwrap();
    for e in &result.timeline[0].epsilon {
        assert_lt!(*e, 0.05);
    }
    for info_set in solver.tree_ref().info_sets() {
        assert!(info_set.cumulative_regret.iter().all(|r| *r >= 0.0));
    }
}

#[test]
fn test_checkpoint_callback() {
    init_logger();
    let mut solver = CfrSolver::new(matching_pennies(), CfrArgs::default());
    let mut seen = vec![];
    let result = run_solver(&mut solver, 10, 3, |c| seen.push(c.iteration)).unwrap();
    assert_eq!(seen, vec![3, 6, 9]);
    assert_eq!(result.timeline.len(), 3);
    assert!(result.timeline.iter().all(|c| c.joint.is_none()));
}

#[test]
fn test_sample_cfr_dominant_strategies() {
    init_logger();
    let args = SampleCfrArgs {
        bootstrap_iterations: 100,
        ..Default::default()
    };
    let mut solver = SampleCfrSolver::new(dominant_strategy_game(), args);
    let result = run_solver(&mut solver, 2000, 500, |_| {}).unwrap();

    let last = result.timeline.last().unwrap();
    for e in &last.epsilon {
        assert_lt!(*e, 0.1);
    }
    let stats = last.joint.as_ref().unwrap();
    assert_le!(stats.support_size, 2 * solver.tree_ref().num_actions());
    assert_eq!(stats.frequency_count, 2000.0);
    assert_lt!((result.utility[0] - 0.5).abs(), 0.1);
}

#[test]
fn test_sample_cfr_is_deterministic() {
    let mut a = SampleCfrSolver::new(kuhn(), SampleCfrArgs::default());
    let mut b = SampleCfrSolver::new(kuhn(), SampleCfrArgs::default());
    for _ in 0..50 {
        a.train_one_epoch().unwrap();
        b.train_one_epoch().unwrap();
        assert_eq!(a.last_plan(), b.last_plan());
    }
    assert_eq!(a.joint().unwrap().iter().collect::<Vec<_>>(), b.joint().unwrap().iter().collect::<Vec<_>>());
}

#[test]
fn test_reconstruction_cfr_dominant_strategies() {
    init_logger();
    let mut solver = ReconstructionCfrSolver::new(dominant_strategy_game(), ReconstructionCfrArgs::default());
    let result = run_solver(&mut solver, 1000, 1000, |_| {}).unwrap();

    let last = &result.timeline[0];
    for e in &last.epsilon {
        assert_lt!(*e, 0.05);
    }
    for e in last.marginal_epsilon.as_ref().unwrap() {
        assert_lt!(*e, 0.05);
    }
    assert!(last.reconstruction_time.is_some());
    assert_lt!((result.utility[0] - 0.5).abs(), 0.05);
}

#[test]
fn test_reconstruction_cfr_players_together() {
    init_logger();
    let args = ReconstructionCfrArgs {
        players_together: true,
        select_optimal_plan: false,
        ..Default::default()
    };
    let mut solver = ReconstructionCfrSolver::new(coordination(), args);
    let result = run_solver(&mut solver, 200, 200, |_| {}).unwrap();
    let joint = solver.joint().unwrap();
    assert!(!joint.is_empty());
    assert_le!(joint.frequency_count(), 200.0 + 1e-9);
    assert_lt!(200.0 - joint.frequency_count(), 1.0);
    assert_eq!(result.timeline.len(), 1);
}

#[test]
fn test_icfr_dominant_strategies() {
    init_logger();
    let mut solver = IcfrSolver::new(dominant_strategy_game(), IcfrArgs::default());
    let result = run_solver(&mut solver, 2000, 2000, |_| {}).unwrap();

    let last = &result.timeline[0];
    for e in &last.epsilon {
        assert_lt!(*e, 0.1);
    }
    assert_lt!((result.utility[0] - 0.5).abs(), 0.1);
    assert_eq!(last.joint.as_ref().unwrap().frequency_count, 2000.0);
}

#[test]
fn test_icfr_kuhn_runs_and_is_deterministic() {
    let mut a = IcfrSolver::new(kuhn(), IcfrArgs::default());
    let mut b = IcfrSolver::new(kuhn(), IcfrArgs::default());
    for _ in 0..30 {
        a.train_one_epoch().unwrap();
        b.train_one_epoch().unwrap();
        assert_eq!(a.last_plan(), b.last_plan());
    }
    assert!(a.external_minimizer_count() > 0);
    for info_set in a.tree_ref().info_sets() {
        let sum: f64 = info_set.average_strategy().iter().sum();
        assert_lt!((sum - 1.0).abs(), 1e-9);
    }
}
