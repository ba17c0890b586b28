use std::collections::HashMap;

use clap::Args;
use log::{
    debug,
    trace,
};
use rand::SeedableRng;
use wyhash::WyRng;

use crate::{
    error::SolverError,
    eval::{
        check_equilibrium,
        joint_utility,
        marginal_epsilon,
    },
    info_set::{
        Reachability,
        Signal,
    },
    joint::{
        reduce_action_plan,
        ActionPlan,
        JointStrategy,
    },
    regret::{
        ExternalRegretMinimizer,
        InternalRegretMinimizer,
        RegretMinimizer,
    },
    solver_tree::SolverTree,
    solvers::{
        Evaluation,
        Solver,
    },
    strategy::AverageStrategy,
    tree::{
        InfoSetId,
        NodeKind,
    },
};

#[derive(Args, Debug, Clone)]
pub struct IcfrArgs {
    #[clap(long, short, value_parser, default_value_t = 42)]
    pub seed: u64,
}

impl Default for IcfrArgs {
    fn default() -> Self {
        IcfrArgs {
            seed: 42,
        }
    }
}

/// Which players left the sampled plan on the way to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deviation {
    Nobody,
    Only(usize),
    Several,
}

impl Deviation {
    fn add(self, player: usize) -> Self {
        match self {
            Deviation::Nobody => Deviation::Only(player),
            Deviation::Only(p) if p == player => self,
            _ => Deviation::Several,
        }
    }

    /// True when every player but `player` followed the plan.
    fn allows(self, player: usize) -> bool {
        match self {
            Deviation::Nobody => true,
            Deviation::Only(p) => p == player,
            Deviation::Several => false,
        }
    }
}

/// Internal-regret CFR for extensive-form correlated equilibria.
///
/// Information sets on the recommended path use a swap-regret minimizer. Once a player has
/// deviated, its information sets below the deviation use external minimizers keyed by the
/// first deviation, created the first time they are needed.
pub struct IcfrSolver {
    tree: SolverTree,
    rng: WyRng,
    internal: Vec<InternalRegretMinimizer>,
    external: HashMap<(Signal, InfoSetId), ExternalRegretMinimizer>,
    joint: JointStrategy,
    last_plan: Option<ActionPlan>,
    iteration: usize,
}

impl IcfrSolver {
    pub fn external_minimizer_count(&self) -> usize {
        self.external.len()
    }

    pub fn has_external_minimizer(&self, signal: Signal, info_set: InfoSetId) -> bool {
        self.external.contains_key(&(signal, info_set))
    }

    /// The reduced plan sampled by the last iteration.
    pub fn last_plan(&self) -> Option<&ActionPlan> {
        self.last_plan.as_ref()
    }

    fn reachability(&self, idx: usize) -> Reachability {
        for &(label, action) in self.tree.info_set(idx).sequence.iter() {
            let recommended = self.tree.index_of(label).and_then(|j| self.tree.info_set(j).transient.action);
            if let Some(recommended) = recommended {
                if recommended != action {
                    return Reachability::External((label, recommended));
                }
            }
        }
        Reachability::Internal
    }

    fn sample_recommendations(&mut self) -> Result<(), SolverError> {
        for idx in 0..self.tree.info_sets().len() {
            let reachability = self.reachability(idx);
            let (label, action_count) = {
                let info_set = self.tree.info_set(idx);
                (info_set.id, info_set.action_count)
            };
            let action = match reachability {
                Reachability::External(signal) => self
                    .external
                    .entry((signal, label))
                    .or_insert_with(|| {
                        trace!("creating external minimizer for {} after {:?}", label, signal);
                        ExternalRegretMinimizer::new(action_count)
                    })
                    .recommend(&mut self.rng)?,
                _ => self.internal[idx].recommend(&mut self.rng)?,
            };

            let info_set = &mut self.tree.info_sets_mut()[idx];
            info_set.transient.reachability = reachability;
            info_set.transient.action = Some(action);
            info_set.cumulative_strategy[action] += 1.0;
        }
        Ok(())
    }

    /// Utility of every action at every information set when everyone else follows the
    /// recommendations, weighted by chance.
    fn compute_utilities(&mut self) {
        let num_players = self.tree.num_players();
        let (game, node_info_set, info_sets) = self.tree.parts_mut();
        let recommended = |id: usize| node_info_set[id].and_then(|idx| info_sets[idx].transient.action);

        // Children are created after their parent, so ids order the tree top-down.
        let mut chance_reach = vec![1.0; game.node_count()];
        let mut deviation = vec![Deviation::Nobody; game.node_count()];
        for node in game.nodes() {
            let id = node.id;
            for (a, &child) in node.children.iter().enumerate() {
                match &node.kind {
                    NodeKind::Chance {
                        distribution,
                    } => {
                        chance_reach[child] = chance_reach[id] * distribution[a];
                        deviation[child] = deviation[id];
                    }
                    NodeKind::Decision {
                        player, ..
                    } => {
                        chance_reach[child] = chance_reach[id];
                        deviation[child] =
                            if recommended(id) == Some(a) { deviation[id] } else { deviation[id].add(*player) };
                    }
                    NodeKind::Leaf {
                        ..
                    } => {}
                }
            }
        }

        let mut values = vec![vec![0.0; num_players]; game.node_count()];
        for node in game.nodes().iter().rev() {
            values[node.id] = match &node.kind {
                NodeKind::Leaf {
                    utility,
                } => utility.clone(),
                NodeKind::Chance {
                    distribution,
                } => {
                    let mut v = vec![0.0; num_players];
                    for (&child, p) in node.children.iter().zip(distribution) {
                        for (acc, x) in v.iter_mut().zip(&values[child]) {
                            *acc += p * x;
                        }
                    }
                    v
                }
                NodeKind::Decision {
                    ..
                } => match recommended(node.id) {
                    Some(a) => values[node.children[a]].clone(),
                    None => vec![0.0; num_players],
                },
            };
        }

        for info_set in info_sets.iter_mut() {
            for &n in &info_set.nodes {
                if !deviation[n].allows(info_set.player) {
                    continue;
                }
                for (a, &child) in game.node(n).children.iter().enumerate() {
                    info_set.transient.utility[a] += chance_reach[n] * values[child][info_set.player];
                }
            }
        }
    }

    fn observe(&mut self) {
        for (idx, info_set) in self.tree.info_sets().iter().enumerate() {
            let utility = &info_set.transient.utility;
            match info_set.transient.reachability {
                Reachability::Internal => self.internal[idx].observe(utility),
                Reachability::External(signal) => {
                    if let Some(rm) = self.external.get_mut(&(signal, info_set.id)) {
                        rm.observe(utility);
                    }
                }
                Reachability::Unreached => {}
            }
        }
    }
}

impl Solver for IcfrSolver {
    type SolverArgs = IcfrArgs;

    fn new(tree: SolverTree, args: Self::SolverArgs) -> Self {
        let internal = tree.info_sets().iter().map(|i| InternalRegretMinimizer::new(i.action_count)).collect();
        IcfrSolver {
            tree,
            rng: WyRng::seed_from_u64(args.seed),
            internal,
            external: HashMap::new(),
            joint: JointStrategy::new(),
            last_plan: None,
            iteration: 0,
        }
    }

    fn tree_ref(&self) -> &SolverTree {
        &self.tree
    }

    fn train_one_epoch(&mut self) -> Result<(), SolverError> {
        self.iteration += 1;
        self.tree.reset_transients();
        self.sample_recommendations()?;
        self.compute_utilities();
        self.observe();

        let plan: ActionPlan = self
            .tree
            .info_sets()
            .iter()
            .filter_map(|i| i.transient.action.map(|a| (i.id, a)))
            .collect();
        let reduced = reduce_action_plan(&plan, &self.tree);
        self.joint.add_action_plan(reduced.clone(), 1.0);
        debug!(
            "icfr iteration {}: {} plans, {} external minimizers",
            self.iteration,
            self.joint.len(),
            self.external.len()
        );
        self.last_plan = Some(reduced);
        Ok(())
    }

    fn evaluate(&mut self) -> Result<Evaluation, SolverError> {
        Ok(Evaluation {
            epsilon: check_equilibrium(&self.tree, &self.joint),
            utility: joint_utility(&self.tree, &self.joint),
            marginal_epsilon: Some(marginal_epsilon(&self.tree, &AverageStrategy)),
            reconstruction_time: None,
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

    // Player 0 picks a side and then decides again on that side; player 1 moves last.
    fn two_stage() -> SolverTree {
        let mut tree = GameTree::new(2, 0);
        for side in [1, 2] {
            let n = tree.add_node(0, 0, Some(side), Branch::action()).unwrap();
            for a in 0..2 {
                let m = tree.add_node(n, 1, Some(3), Branch::action()).unwrap();
                tree.add_leaf(m, vec![(side + a) as f64, 1.0], Branch::action()).unwrap();
                tree.add_leaf(m, vec![0.0, a as f64], Branch::action()).unwrap();
            }
        }
        SolverTree::build(tree).unwrap()
    }

    #[test]
    fn test_deviation() {
        assert!(Deviation::Nobody.allows(1));
        assert!(Deviation::Nobody.add(1).allows(1));
        assert!(!Deviation::Nobody.add(0).allows(1));
        assert_eq!(Deviation::Nobody.add(0).add(1), Deviation::Several);
    }

    #[test]
    fn test_external_minimizers_are_created_lazily() {
        let mut solver = IcfrSolver::new(two_stage(), IcfrArgs::default());
        assert_eq!(solver.external_minimizer_count(), 0);
        solver.train_one_epoch().unwrap();

        let root = solver.tree_ref().info_set(solver.tree_ref().index_of(0).unwrap());
        let chosen = root.transient.action.unwrap();
        let (followed, skipped) = if chosen == 0 { (1, 2) } else { (2, 1) };
        assert_eq!(solver.external_minimizer_count(), 1);
        assert!(solver.has_external_minimizer((0, chosen), skipped));
        assert!(!solver.has_external_minimizer((0, chosen), followed));

        let followed_set = solver.tree_ref().info_set(solver.tree_ref().index_of(followed).unwrap());
        assert_eq!(followed_set.transient.reachability, Reachability::Internal);
    }

    #[test]
    fn test_every_info_set_is_visited_once_per_iteration() {
        let mut solver = IcfrSolver::new(two_stage(), IcfrArgs::default());
        for _ in 0..25 {
            solver.train_one_epoch().unwrap();
        }
        for info_set in solver.tree_ref().info_sets() {
            assert_eq!(info_set.cumulative_strategy.iter().sum::<f64>(), 25.0);
        }
        assert_eq!(solver.joint().unwrap().frequency_count(), 25.0);
    }

    #[test]
    fn test_same_seed_same_plans() {
        let mut a = IcfrSolver::new(two_stage(), IcfrArgs::default());
        let mut b = IcfrSolver::new(two_stage(), IcfrArgs::default());
        for _ in 0..20 {
            a.train_one_epoch().unwrap();
            b.train_one_epoch().unwrap();
            assert_eq!(a.last_plan(), b.last_plan());
        }
    }
}
