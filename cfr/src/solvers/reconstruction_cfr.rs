use std::time::{
    Duration,
    Instant,
};

use clap::{
    ArgAction,
    Args,
};
use log::debug;
use rand::SeedableRng;
use wyhash::WyRng;

use crate::{
    error::SolverError,
    eval::{
        check_equilibrium,
        joint_utility,
        marginal_epsilon,
    },
    joint::JointStrategy,
    reconstruction::{
        build_joint_from_marginals,
        build_joint_from_marginals_players_together,
    },
    solver_tree::SolverTree,
    solvers::{
        cfr::cfr_sweep,
        Evaluation,
        Solver,
    },
    strategy::{
        AverageStrategy,
        CurrentStrategy,
    },
};

#[derive(Args, Debug, Clone)]
pub struct ReconstructionCfrArgs {
    /// Rebuild a joint distribution from the current strategies every this many iterations.
    #[clap(long, value_parser, default_value_t = 1)]
    pub reconstruct_every: usize,

    /// Decompose a single realization form over all players instead of one per player.
    #[clap(long)]
    pub players_together: bool,

    /// Pick the heaviest supporting plan instead of the first positive one.
    #[clap(long, action = ArgAction::Set, default_value_t = true)]
    pub select_optimal_plan: bool,

    #[clap(long)]
    pub cfr_plus: bool,

    #[clap(long, short, value_parser, default_value_t = 42)]
    pub seed: u64,
}

impl Default for ReconstructionCfrArgs {
    fn default() -> Self {
        ReconstructionCfrArgs {
            reconstruct_every: 1,
            players_together: false,
            select_optimal_plan: true,
            cfr_plus: false,
            seed: 42,
        }
    }
}

/// CFR whose current strategies are periodically turned into joint plans (CFR-JR).
pub struct ReconstructionCfrSolver {
    tree: SolverTree,
    args: ReconstructionCfrArgs,
    rng: WyRng,
    joint: JointStrategy,
    reconstruction_time: Duration,
    iteration: usize,
}

impl ReconstructionCfrSolver {
    fn reconstruct(&mut self) -> Result<(), SolverError> {
        let start = Instant::now();
        let distribution = if self.args.players_together {
            build_joint_from_marginals_players_together(
                &self.tree,
                &CurrentStrategy,
                self.args.select_optimal_plan,
                &mut self.rng,
            )?
        } else {
            build_joint_from_marginals(&self.tree, &CurrentStrategy, self.args.select_optimal_plan, &mut self.rng)?
        };
        self.joint.add_joint_distribution(distribution);
        self.reconstruction_time += start.elapsed();
        Ok(())
    }
}

impl Solver for ReconstructionCfrSolver {
    type SolverArgs = ReconstructionCfrArgs;

    fn new(tree: SolverTree, args: Self::SolverArgs) -> Self {
        ReconstructionCfrSolver {
            tree,
            rng: WyRng::seed_from_u64(args.seed),
            args,
            joint: JointStrategy::new(),
            reconstruction_time: Duration::ZERO,
            iteration: 0,
        }
    }

    fn tree_ref(&self) -> &SolverTree {
        &self.tree
    }

    fn train_one_epoch(&mut self) -> Result<(), SolverError> {
        self.iteration += 1;
        cfr_sweep(&mut self.tree, self.args.cfr_plus);

        if self.args.reconstruct_every > 0 && self.iteration % self.args.reconstruct_every == 0 {
            self.reconstruct()?;
            debug!("cfr-jr iteration {}: {} plans", self.iteration, self.joint.len());
        }
        Ok(())
    }

    fn evaluate(&mut self) -> Result<Evaluation, SolverError> {
        let reconstruction_time = std::mem::take(&mut self.reconstruction_time);
        Ok(Evaluation {
            epsilon: check_equilibrium(&self.tree, &self.joint),
            utility: joint_utility(&self.tree, &self.joint),
            marginal_epsilon: Some(marginal_epsilon(&self.tree, &AverageStrategy)),
            reconstruction_time: Some(reconstruction_time),
        })
    }

    fn utility(&self) -> Vec<f64> {
        joint_utility(&self.tree, &self.joint)
    }

    fn joint(&self) -> Option<&JointStrategy> {
        Some(&self.joint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{
        Branch,
        GameTree,
    };

    fn matching_pennies() -> SolverTree {
        let mut tree = GameTree::new(2, 0);
        let h = tree.add_node(0, 1, Some(1), Branch::action()).unwrap();
        let t = tree.add_node(0, 1, Some(1), Branch::action()).unwrap();
        tree.add_leaf(h, vec![1.0, -1.0], Branch::action()).unwrap();
        tree.add_leaf(h, vec![-1.0, 1.0], Branch::action()).unwrap();
        tree.add_leaf(t, vec![-1.0, 1.0], Branch::action()).unwrap();
        tree.add_leaf(t, vec![1.0, -1.0], Branch::action()).unwrap();
        SolverTree::build(tree).unwrap()
    }

    #[test]
    fn test_reconstruct_every() {
        let args = ReconstructionCfrArgs {
            reconstruct_every: 3,
            ..Default::default()
        };
        let mut solver = ReconstructionCfrSolver::new(matching_pennies(), args);
        solver.train_one_epoch().unwrap();
        solver.train_one_epoch().unwrap();
        assert!(solver.joint().unwrap().is_empty());
        solver.train_one_epoch().unwrap();
        assert!((solver.joint().unwrap().frequency_count() - 1.0).abs() < 1e-9);

        let evaluation = solver.evaluate().unwrap();
        assert!(evaluation.marginal_epsilon.is_some());
        assert!(evaluation.reconstruction_time.is_some());
        assert_eq!(solver.evaluate().unwrap().reconstruction_time, Some(Duration::ZERO));
    }
}
