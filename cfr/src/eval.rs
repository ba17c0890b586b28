use log::debug;

use crate::{
    joint::JointStrategy,
    solver_tree::SolverTree,
    strategy::Strategy,
    tree::NodeKind,
};

/// Expected utility of every player when everyone plays `strategy`.
pub fn expected_utility<St: Strategy>(tree: &SolverTree, strategy: &St) -> Vec<f64> {
    let game = tree.tree();
    let behaviours: Vec<Vec<f64>> = tree.info_sets().iter().map(|i| strategy.safe_get_strategy(i)).collect();

    let mut utility = vec![0.0; tree.num_players()];
    let mut stack = vec![(game.root(), 1.0)];
    while let Some((id, prob)) = stack.pop() {
        let node = game.node(id);
        match &node.kind {
            NodeKind::Leaf {
                utility: u,
            } => {
                for (acc, x) in utility.iter_mut().zip(u) {
                    *acc += prob * x;
                }
            }
            NodeKind::Chance {
                distribution,
            } => {
                for (&child, p) in node.children.iter().zip(distribution) {
                    stack.push((child, prob * p));
                }
            }
            NodeKind::Decision {
                ..
            } => {
                if let Some(idx) = tree.info_set_of(id) {
                    for (&child, p) in node.children.iter().zip(&behaviours[idx]) {
                        if *p > 0.0 {
                            stack.push((child, prob * p));
                        }
                    }
                }
            }
        }
    }
    utility
}

/// Pushes `strategy` of every player but `player` (and chance) down to the leaves. Returns the
/// marginalised utility of `player`, indexed by node id.
pub fn marginalize_player<St: Strategy>(tree: &SolverTree, strategy: &St, player: usize) -> Vec<f64> {
    let game = tree.tree();
    let mut values = vec![0.0; game.node_count()];
    let mut stack = vec![(game.root(), 1.0)];
    while let Some((id, prob)) = stack.pop() {
        let node = game.node(id);
        match &node.kind {
            NodeKind::Leaf {
                utility,
            } => values[id] += prob * utility[player],
            NodeKind::Chance {
                distribution,
            } => {
                for (&child, p) in node.children.iter().zip(distribution) {
                    stack.push((child, prob * p));
                }
            }
            NodeKind::Decision {
                player: acting, ..
            } if *acting == player => {
                stack.extend(node.children.iter().map(|&c| (c, prob)));
            }
            NodeKind::Decision {
                ..
            } => {
                if let Some(idx) = tree.info_set_of(id) {
                    let s = strategy.safe_get_strategy(tree.info_set(idx));
                    for (&child, p) in node.children.iter().zip(&s) {
                        if *p > 0.0 {
                            stack.push((child, prob * p));
                        }
                    }
                }
            }
        }
    }
    values
}

/// Same as [`marginalize_player`] for a distribution over joint action plans.
pub fn marginalize_player_from_joint(tree: &SolverTree, joint: &JointStrategy, player: usize) -> Vec<f64> {
    let game = tree.tree();
    let mut values = vec![0.0; game.node_count()];
    for (plan, frequency) in joint.iter_frequencies() {
        let mut stack = vec![(game.root(), frequency)];
        while let Some((id, prob)) = stack.pop() {
            let node = game.node(id);
            match &node.kind {
                NodeKind::Leaf {
                    utility,
                } => values[id] += prob * utility[player],
                NodeKind::Chance {
                    distribution,
                } => {
                    for (&child, p) in node.children.iter().zip(distribution) {
                        stack.push((child, prob * p));
                    }
                }
                NodeKind::Decision {
                    player: acting,
                    info_set,
                } => {
                    if *acting == player {
                        stack.extend(node.children.iter().map(|&c| (c, prob)));
                    } else if let Some(&action) = plan.get(info_set) {
                        stack.push((node.children[action], prob));
                    }
                }
            }
        }
    }
    values
}

/// Value of the best response of `player` against the marginalised leaf utilities `values`.
pub fn best_response_value(tree: &SolverTree, player: usize, values: &[f64]) -> f64 {
    // Children always have a larger index than their parent, so a reverse sweep sees them first.
    let mut best = vec![0.0; tree.info_sets().len()];
    for &idx in tree.player_info_sets(player).iter().rev() {
        let info_set = tree.info_set(idx);
        best[idx] = (0..info_set.action_count)
            .map(|a| {
                let below: f64 = info_set.children_info_sets[a].iter().map(|&c| best[c]).sum();
                let leaves: f64 = info_set.children_leaves[a].iter().map(|&l| values[l]).sum();
                below + leaves
            })
            .fold(f64::NEG_INFINITY, f64::max);
    }
    tree.root_info_sets(player).map(|idx| best[idx]).sum()
}

/// How much each player gains by best responding to the others playing `strategy`.
pub fn marginal_epsilon<St: Strategy>(tree: &SolverTree, strategy: &St) -> Vec<f64> {
    let utility = expected_utility(tree, strategy);
    let epsilon: Vec<f64> = (0..tree.num_players())
        .map(|p| {
            let values = marginalize_player(tree, strategy, p);
            best_response_value(tree, p, &values) - utility[p]
        })
        .collect();
    debug!("marginal epsilon: {:?}", epsilon);
    epsilon
}

/// Expected utility of every player when a joint plan is drawn from `joint`.
pub fn joint_utility(tree: &SolverTree, joint: &JointStrategy) -> Vec<f64> {
    let mut utility = vec![0.0; tree.num_players()];
    for (plan, frequency) in joint.iter_frequencies() {
        for (acc, u) in utility.iter_mut().zip(tree.utility_from_action_plan(plan)) {
            *acc += frequency * u;
        }
    }
    utility
}

/// How much each player gains by ignoring the recommendations of `joint` and best responding.
pub fn check_equilibrium(tree: &SolverTree, joint: &JointStrategy) -> Vec<f64> {
    let utility = joint_utility(tree, joint);
    let epsilon: Vec<f64> = (0..tree.num_players())
        .map(|p| {
            let values = marginalize_player_from_joint(tree, joint, p);
            best_response_value(tree, p, &values) - utility[p]
        })
        .collect();
    debug!("joint epsilon: {:?}", epsilon);
    epsilon
}
