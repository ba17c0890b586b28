use std::time::{
    Duration,
    Instant,
};

use clap::Args;
use log::{
    debug,
    info,
};

use crate::{
    error::SolverError,
    joint::JointStrategy,
    solver_tree::SolverTree,
};

pub mod cfr;
pub mod icfr;
pub mod reconstruction_cfr;
pub mod sample_cfr;

/// What a solver reports about its current solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Per player gain of a best response. Joint solvers measure it against their joint strategy.
    pub epsilon: Vec<f64>,
    pub utility: Vec<f64>,
    /// Epsilon of the average behavioural strategies, for solvers that also keep a joint.
    pub marginal_epsilon: Option<Vec<f64>>,
    /// Time spent reconstructing joint plans since the previous evaluation.
    pub reconstruction_time: Option<Duration>,
}

pub trait Solver {
    type SolverArgs: Args;

    fn new(tree: SolverTree, args: Self::SolverArgs) -> Self;
    fn tree_ref(&self) -> &SolverTree;

    /// Runs before the first counted iteration.
    fn warm_up(&mut self) -> Result<(), SolverError> {
        Ok(())
    }

    fn train_one_epoch(&mut self) -> Result<(), SolverError>;
    fn evaluate(&mut self) -> Result<Evaluation, SolverError>;

    /// Utility of the solution as it stands.
    fn utility(&self) -> Vec<f64>;

    fn joint(&self) -> Option<&JointStrategy> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointStats {
    pub support_size: usize,
    /// Sum of the plan weights.
    pub frequency_count: f64,
    /// `frequency_count` per iteration.
    pub relative_size: f64,
    pub max_plan_frequency: f64,
}

impl JointStats {
    fn new(joint: &JointStrategy, iteration: usize) -> Self {
        JointStats {
            support_size: joint.len(),
            frequency_count: joint.frequency_count(),
            relative_size: joint.frequency_count() / iteration.max(1) as f64,
            max_plan_frequency: joint.max_plan_frequency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub iteration: usize,
    /// Training time since the previous checkpoint.
    pub elapsed: Duration,
    pub epsilon: Vec<f64>,
    pub utility: Vec<f64>,
    pub marginal_epsilon: Option<Vec<f64>>,
    pub joint: Option<JointStats>,
    pub reconstruction_time: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct SolveResult {
    pub utility: Vec<f64>,
    pub timeline: Vec<Checkpoint>,
    pub total_duration: Duration,
}

/// Runs `iterations` epochs of `solver`, evaluating it every `check_every` iterations (never
/// when zero) and handing each checkpoint to `on_checkpoint`. Stops at the first error.
pub fn run_solver<S, F>(
    solver: &mut S,
    iterations: usize,
    check_every: usize,
    mut on_checkpoint: F,
) -> Result<SolveResult, SolverError>
where
    S: Solver,
    F: FnMut(&Checkpoint),
{
    let start = Instant::now();
    solver.warm_up()?;

    let mut timeline = vec![];
    let mut last_checkpoint = Instant::now();
    for i in 1..=iterations {
        solver.train_one_epoch()?;

        if check_every > 0 && i % check_every == 0 {
            let elapsed = last_checkpoint.elapsed();
            let evaluation = solver.evaluate()?;
            let checkpoint = Checkpoint {
                iteration: i,
                elapsed,
                epsilon: evaluation.epsilon,
                utility: evaluation.utility,
                marginal_epsilon: evaluation.marginal_epsilon,
                joint: solver.joint().map(|j| JointStats::new(j, i)),
                reconstruction_time: evaluation.reconstruction_time,
            };
            info!(
                "iteration {}: epsilon {:?} utility {:?} ({})",
                i,
                checkpoint.epsilon,
                checkpoint.utility,
                humantime::format_duration(elapsed)
            );
            if let Some(stats) = &checkpoint.joint {
                debug!("joint: {:?}", stats);
            }
            on_checkpoint(&checkpoint);
            timeline.push(checkpoint);
            last_checkpoint = Instant::now();
        }
    }

    let total_duration = start.elapsed();
    let utility = solver.utility();
    info!(
        "finished {} iterations in {}, utility {:?}",
        iterations,
        humantime::format_duration(total_duration),
        utility
    );
    Ok(SolveResult {
        utility,
        timeline,
        total_duration,
    })
}
