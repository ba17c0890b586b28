use clap::{
    ArgAction,
    Args,
};
use log::{
    debug,
    info,
};
use rand::SeedableRng;
use rand_distr::{
    Distribution,
    WeightedIndex,
};
use wyhash::WyRng;

use crate::{
    error::SolverError,
    eval::{
        check_equilibrium,
        joint_utility,
    },
    info_set::InformationSet,
    joint::{
        reduce_action_plan,
        ActionPlan,
        JointStrategy,
    },
    solver_tree::SolverTree,
    solvers::{
        Evaluation,
        Solver,
    },
    tree::{
        GameTree,
        NodeId,
        NodeKind,
    },
};

#[derive(Args, Debug, Clone)]
pub struct SampleCfrArgs {
    #[clap(long, short, value_parser, default_value_t = 42)]
    pub seed: u64,

    /// Iterations that only train the strategies, before plans are collected.
    #[clap(long, value_parser, default_value_t = 0)]
    pub bootstrap_iterations: usize,

    /// Keep at most twice as many plans as the game has actions.
    #[clap(long, action = ArgAction::Set, default_value_t = true)]
    pub bound_joint_size: bool,

    #[clap(long, action = ArgAction::Set, default_value_t = true)]
    pub cfr_plus: bool,
}

impl Default for SampleCfrArgs {
    fn default() -> Self {
        SampleCfrArgs {
            seed: 42,
            bootstrap_iterations: 0,
            bound_joint_size: true,
            cfr_plus: true,
        }
    }
}

fn weighted_sample(rng: &mut WyRng, probs: &[f64]) -> usize {
    let dist = WeightedIndex::new(probs).unwrap_or_else(|e| {
        panic!("Invalid weights: e: {} probs: {:?}", e, probs);
    });
    dist.sample(rng)
}

/// One sampled action per information set (by dense index) and one outcome per chance node
/// (by node id).
struct SampledPlan {
    actions: Vec<usize>,
    chance: Vec<usize>,
}

struct Traversal<'a> {
    tree: &'a GameTree,
    node_info_set: &'a [Option<usize>],
    info_sets: &'a mut [InformationSet],
    sampled: &'a SampledPlan,
    cfr_plus: bool,
}

impl<'a> Traversal<'a> {
    fn scfr(&mut self, id: NodeId, target: usize, reach: Vec<f64>) -> f64 {
        let tree: &'a GameTree = self.tree;
        let node = tree.node(id);
        let player = match &node.kind {
            NodeKind::Leaf {
                utility,
            } => return utility[target],
            NodeKind::Chance {
                ..
            } => return self.scfr(node.children[self.sampled.chance[id]], target, reach),
            NodeKind::Decision {
                player, ..
            } => *player,
        };
        let idx = match self.node_info_set[id] {
            Some(idx) => idx,
            None => return 0.0,
        };
        let sampled = self.sampled.actions[idx];

        if reach.iter().all(|r| *r == 0.0) {
            return self.scfr(node.children[sampled], target, reach);
        }

        let mut values = vec![0.0; node.children.len()];
        for (a, &child) in node.children.iter().enumerate() {
            let mut next = reach.clone();
            if a != sampled {
                next[player] = 0.0;
            }
            values[a] = self.scfr(child, target, next);
        }
        let v = values[sampled];

        if player == target {
            let others: f64 = reach.iter().enumerate().filter(|(p, _)| *p != target).map(|(_, r)| r).product();
            let info_set = &mut self.info_sets[idx];
            for a in 0..values.len() {
                let regret = info_set.cumulative_regret[a] + others * (values[a] - v);
                info_set.cumulative_regret[a] = if self.cfr_plus { regret.max(0.0) } else { regret };
                info_set.cumulative_strategy[a] += reach[target] * info_set.current_strategy[a];
            }
        }
        v
    }
}

/// Externally-sampled CFR: every iteration follows a single sampled joint plan and collects it
/// into a joint strategy.
pub struct SampleCfrSolver {
    tree: SolverTree,
    args: SampleCfrArgs,
    rng: WyRng,
    joint: JointStrategy,
    last_plan: Option<ActionPlan>,
    iteration: usize,
}

impl SampleCfrSolver {
    /// The reduced plan sampled by the last iteration.
    pub fn last_plan(&self) -> Option<&ActionPlan> {
        self.last_plan.as_ref()
    }

    fn sample(&mut self) -> (SampledPlan, ActionPlan) {
        let actions: Vec<usize> =
            self.tree.info_sets().iter().map(|i| weighted_sample(&mut self.rng, &i.current_strategy)).collect();
        let game = self.tree.tree();
        let mut chance = vec![0; game.node_count()];
        for node in game.nodes() {
            if let NodeKind::Chance {
                distribution,
            } = &node.kind
            {
                chance[node.id] = weighted_sample(&mut self.rng, distribution);
            }
        }
        let plan =
            self.tree.info_sets().iter().zip(&actions).map(|(info_set, &a)| (info_set.id, a)).collect();
        (
            SampledPlan {
                actions,
                chance,
            },
            plan,
        )
    }

    /// Samples a plan, runs a traversal per player and updates the current strategies.
    fn step(&mut self) -> ActionPlan {
        let (sampled, plan) = self.sample();
        let num_players = self.tree.num_players();
        let (game, node_info_set, info_sets) = self.tree.parts_mut();
        let mut traversal = Traversal {
            tree: game,
            node_info_set,
            info_sets,
            sampled: &sampled,
            cfr_plus: self.args.cfr_plus,
        };
        for p in 0..num_players {
            traversal.scfr(game.root(), p, vec![1.0; num_players]);
        }
        for info_set in traversal.info_sets.iter_mut() {
            info_set.update_current_strategy();
        }
        plan
    }
}

impl Solver for SampleCfrSolver {
    type SolverArgs = SampleCfrArgs;

    fn new(tree: SolverTree, args: Self::SolverArgs) -> Self {
        let joint = if args.bound_joint_size {
            JointStrategy::with_max_plan_count(2 * tree.num_actions())
        } else {
            JointStrategy::new()
        };
        SampleCfrSolver {
            rng: WyRng::seed_from_u64(args.seed),
            tree,
            args,
            joint,
            last_plan: None,
            iteration: 0,
        }
    }

    fn tree_ref(&self) -> &SolverTree {
        &self.tree
    }

    fn warm_up(&mut self) -> Result<(), SolverError> {
        for _ in 0..self.args.bootstrap_iterations {
            self.step();
        }
        if self.args.bootstrap_iterations > 0 {
            info!("bootstrapped for {} iterations", self.args.bootstrap_iterations);
        }
        Ok(())
    }

    fn train_one_epoch(&mut self) -> Result<(), SolverError> {
        self.iteration += 1;
        let plan = self.step();
        let reduced = reduce_action_plan(&plan, &self.tree);
        self.joint.add_action_plan(reduced.clone(), 1.0);
        debug!("scfr iteration {}: {} plans", self.iteration, self.joint.len());
        self.last_plan = Some(reduced);
        Ok(())
    }

    fn evaluate(&mut self) -> Result<Evaluation, SolverError> {
        Ok(Evaluation {
            epsilon: check_equilibrium(&self.tree, &self.joint),
            utility: joint_utility(&self.tree, &self.joint),
            marginal_epsilon: None,
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
