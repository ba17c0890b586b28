use clap::Args;
use log::debug;

use crate::{
    error::SolverError,
    eval::marginal_epsilon,
    info_set::InformationSet,
    solver_tree::SolverTree,
    solvers::{
        Evaluation,
        Solver,
    },
    strategy::AverageStrategy,
    tree::{
        GameTree,
        NodeId,
        NodeKind,
    },
};

#[derive(Args, Debug, Clone, Default)]
pub struct CfrArgs {
    /// Clamp cumulative regrets at zero (CFR+).
    #[clap(long)]
    pub cfr_plus: bool,
}

/// Probability of reaching a node, split by contributor.
#[derive(Debug, Clone)]
pub(crate) struct Reach {
    pub players: Vec<f64>,
    pub chance: f64,
}

impl Reach {
    pub fn new(num_players: usize) -> Self {
        Reach {
            players: vec![1.0; num_players],
            chance: 1.0,
        }
    }

    /// Reach of everyone but `player`, chance included.
    pub fn others(&self, player: usize) -> f64 {
        self.players.iter().enumerate().filter(|(p, _)| *p != player).map(|(_, r)| r).product::<f64>()
            * self.chance
    }
}

struct Traversal<'a> {
    tree: &'a GameTree,
    node_info_set: &'a [Option<usize>],
    info_sets: &'a mut [InformationSet],
    cfr_plus: bool,
}

impl<'a> Traversal<'a> {
    fn cfr(&mut self, id: NodeId, target: usize, reach: Reach) -> f64 {
        let tree: &'a GameTree = self.tree;
        let node = tree.node(id);
        let player = match &node.kind {
            NodeKind::Leaf {
                utility,
            } => return utility[target],
            NodeKind::Chance {
                distribution,
            } => {
                let mut v = 0.0;
                for (&child, &p) in node.children.iter().zip(distribution) {
                    let mut next = reach.clone();
                    next.chance *= p;
                    v += p * self.cfr(child, target, next);
                }
                return v;
            }
            NodeKind::Decision {
                player, ..
            } => *player,
        };
        let idx = match self.node_info_set[id] {
            Some(idx) => idx,
            None => return 0.0,
        };

        let strategy = self.info_sets[idx].current_strategy.clone();
        let mut values = vec![0.0; node.children.len()];
        let mut v = 0.0;
        for (a, &child) in node.children.iter().enumerate() {
            let mut next = reach.clone();
            next.players[player] *= strategy[a];
            values[a] = self.cfr(child, target, next);
            v += strategy[a] * values[a];
        }

        if player == target {
            let others = reach.others(target);
            let info_set = &mut self.info_sets[idx];
            for a in 0..values.len() {
                let regret = info_set.cumulative_regret[a] + others * (values[a] - v);
                info_set.cumulative_regret[a] = if self.cfr_plus { regret.max(0.0) } else { regret };
                info_set.cumulative_strategy[a] += reach.players[target] * strategy[a];
            }
        }
        v
    }
}

/// One full CFR iteration: a traversal per player, then regret matching everywhere.
pub(crate) fn cfr_sweep(tree: &mut SolverTree, cfr_plus: bool) {
    let num_players = tree.num_players();
    let (game, node_info_set, info_sets) = tree.parts_mut();
    let mut traversal = Traversal {
        tree: game,
        node_info_set,
        info_sets,
        cfr_plus,
    };
    for p in 0..num_players {
        traversal.cfr(game.root(), p, Reach::new(num_players));
    }
    for info_set in traversal.info_sets.iter_mut() {
        info_set.update_current_strategy();
    }
}

/// Vanilla CFR, or CFR+ with `--cfr-plus`.
pub struct CfrSolver {
    tree: SolverTree,
    cfr_plus: bool,
    iteration: usize,
}

impl Solver for CfrSolver {
    type SolverArgs = CfrArgs;

    fn new(tree: SolverTree, args: Self::SolverArgs) -> Self {
        CfrSolver {
            tree,
            cfr_plus: args.cfr_plus,
            iteration: 0,
        }
    }

    fn tree_ref(&self) -> &SolverTree {
        &self.tree
    }

    fn train_one_epoch(&mut self) -> Result<(), SolverError> {
        self.iteration += 1;
        cfr_sweep(&mut self.tree, self.cfr_plus);
        debug!("cfr iteration {} done", self.iteration);
        Ok(())
    }

    fn evaluate(&mut self) -> Result<Evaluation, SolverError> {
        Ok(Evaluation {
            epsilon: marginal_epsilon(&self.tree, &AverageStrategy),
            utility: self.tree.expected_utility(),
            marginal_epsilon: None,
            reconstruction_time: None,
        })
    }

    fn utility(&self) -> Vec<f64> {
        self.tree.expected_utility()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Branch;

    // Rock-paper-scissors as a sequential game where player 1 does not observe player 0.
    fn rock_paper_scissors() -> SolverTree {
        let mut tree = GameTree::new(2, 0);
        let payoff = [[0.0, -1.0, 1.0], [1.0, 0.0, -1.0], [-1.0, 1.0, 0.0]];
        for row in payoff {
            let n = tree.add_node(0, 1, Some(1), Branch::action()).unwrap();
            for u in row {
                tree.add_leaf(n, vec![u, -u], Branch::action()).unwrap();
            }
        }
        SolverTree::build(tree).unwrap()
    }

    #[test]
    fn test_reach_others_includes_chance() {
        let reach = Reach {
            players: vec![0.5, 0.25, 0.1],
            chance: 0.5,
        };
        assert!((reach.others(1) - 0.025).abs() < 1e-12);
    }

    #[test]
    fn test_cfr_plus_regrets_are_non_negative() {
        let mut solver = CfrSolver::new(
            rock_paper_scissors(),
            CfrArgs {
                cfr_plus: true,
            },
        );
        for _ in 0..50 {
            solver.train_one_epoch().unwrap();
            for info_set in solver.tree_ref().info_sets() {
                assert!(info_set.cumulative_regret.iter().all(|r| *r >= 0.0));
            }
        }
    }

    #[test]
    fn test_rock_paper_scissors_converges() {
        let mut solver = CfrSolver::new(rock_paper_scissors(), CfrArgs::default());
        for _ in 0..2000 {
            solver.train_one_epoch().unwrap();
        }
        let evaluation = solver.evaluate().unwrap();
        for e in evaluation.epsilon {
            assert!(e < 0.01, "epsilon {}", e);
        }
        for info_set in solver.tree_ref().info_sets() {
            for p in info_set.average_strategy() {
                assert!((p - 1.0 / 3.0).abs() < 0.01);
            }
        }
    }
}
