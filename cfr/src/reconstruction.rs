use std::time::Instant;

use itertools::Itertools;
use log::debug;
use rand::Rng;

use crate::{
    error::SolverError,
    joint::{
        reduce_action_plan,
        ActionPlan,
    },
    solver_tree::SolverTree,
    strategy::Strategy,
    tree::{
        NodeId,
        NodeKind,
    },
};

/// Leaves whose realization weight is at most this are considered covered.
const LEAF_TOLERANCE: f64 = 0.001;

/// Realization weight of every leaf (indexed by node id) when only the decisions of `player`
/// are weighted by `strategy`. With `None` every player's decisions are weighted. Chance is
/// never factored in.
pub fn realization_form<St: Strategy>(tree: &SolverTree, player: Option<usize>, strategy: &St) -> Vec<f64> {
    let game = tree.tree();
    let behaviours: Vec<Vec<f64>> = tree.info_sets().iter().map(|i| strategy.safe_get_strategy(i)).collect();

    let mut omega = vec![0.0; game.node_count()];
    let mut stack = vec![(game.root(), 1.0)];
    while let Some((id, prob)) = stack.pop() {
        let node = game.node(id);
        match node.kind {
            NodeKind::Leaf {
                ..
            } => omega[id] = prob,
            NodeKind::Decision {
                player: acting, ..
            } if player.map_or(true, |p| p == acting) => {
                if let Some(idx) = tree.info_set_of(id) {
                    for (&child, p) in node.children.iter().zip(&behaviours[idx]) {
                        stack.push((child, prob * p));
                    }
                }
            }
            _ => stack.extend(node.children.iter().map(|&c| (c, prob))),
        }
    }
    omega
}

/// Information sets and leaves directly below `action` at the information set `idx`, looking
/// through chance nodes. Used when every player is reconstructed at once.
fn successors(tree: &SolverTree, idx: usize, action: usize) -> (Vec<usize>, Vec<NodeId>) {
    let game = tree.tree();
    let mut info_sets = vec![];
    let mut leaves = vec![];
    let mut stack: Vec<NodeId> = tree.info_set(idx).nodes.iter().map(|&n| game.node(n).children[action]).collect();
    while let Some(id) = stack.pop() {
        let node = game.node(id);
        if node.is_leaf() {
            leaves.push(id);
        } else if node.is_chance() {
            stack.extend(&node.children);
        } else if let Some(child) = tree.info_set_of(id) {
            info_sets.push(child);
        }
    }
    info_sets.sort_unstable();
    info_sets.dedup();
    (info_sets, leaves)
}

fn action_successors(tree: &SolverTree, player: Option<usize>, idx: usize, action: usize) -> (Vec<usize>, Vec<NodeId>) {
    match player {
        Some(_) => {
            let info_set = tree.info_set(idx);
            (info_set.children_info_sets[action].clone(), info_set.children_leaves[action].clone())
        }
        None => successors(tree, idx, action),
    }
}

/// The plan of `player` that goes through `leaf` and, everywhere else, takes the action whose
/// worst reachable leaf has the largest weight. Returns the plan and its weight, the minimum
/// `omega` over the leaves it does not cut off.
fn supporting_plan(tree: &SolverTree, player: Option<usize>, leaf: NodeId, omega: &[f64]) -> (ActionPlan, f64) {
    let mut memo: Vec<Option<(usize, f64)>> = vec![None; tree.info_sets().len()];
    for &(label, action) in tree.sequence(leaf, player).iter() {
        if let Some(idx) = tree.index_of(label) {
            memo[idx] = Some((action, omega[leaf]));
        }
    }

    let info_sets: Vec<usize> = match player {
        Some(p) => tree.player_info_sets(p).to_vec(),
        None => (0..tree.info_sets().len()).collect(),
    };

    // Post-order over the successor graph, children resolved before their parents.
    let mut visiting = vec![false; tree.info_sets().len()];
    for &root in &info_sets {
        if memo[root].is_some() {
            continue;
        }
        let mut stack = vec![(root, false)];
        while let Some((idx, expanded)) = stack.pop() {
            if memo[idx].is_some() {
                continue;
            }
            let info_set = tree.info_set(idx);
            let edges: Vec<(Vec<usize>, Vec<NodeId>)> =
                (0..info_set.action_count).map(|a| action_successors(tree, player, idx, a)).collect();
            if !expanded {
                visiting[idx] = true;
                stack.push((idx, true));
                for (children, _) in &edges {
                    stack.extend(children.iter().filter(|&&c| memo[c].is_none() && !visiting[c]).map(|&c| (c, false)));
                }
                continue;
            }

            let mut best: Option<(usize, f64)> = None;
            for (a, (children, leaves)) in edges.into_iter().enumerate() {
                let mut a_omega: f64 = 1.0;
                for c in children {
                    if let Some((_, w)) = memo[c] {
                        a_omega = a_omega.min(w);
                    }
                }
                for l in leaves {
                    a_omega = a_omega.min(omega[l]);
                }
                if best.map_or(true, |(_, w)| a_omega > w) {
                    best = Some((a, a_omega));
                }
            }
            memo[idx] = best;
            visiting[idx] = false;
        }
    }

    let plan: ActionPlan =
        info_sets.iter().filter_map(|&idx| memo[idx].map(|(a, _)| (tree.info_set(idx).id, a))).collect();
    let weight = tree
        .terminals_under_plan(player, &plan)
        .iter()
        .map(|&t| omega[t])
        .fold(f64::INFINITY, f64::min);
    (plan, if weight.is_finite() { weight } else { 0.0 })
}

/// Peels supporting plans off `omega` until every leaf is covered.
fn decompose<R: Rng + ?Sized>(
    tree: &SolverTree,
    player: Option<usize>,
    omega: &mut [f64],
    select_optimal_plan: bool,
    rng: &mut R,
) -> Result<Vec<(ActionPlan, f64)>, SolverError> {
    let leaves = tree.leaves();
    let mut distribution = vec![];

    loop {
        let start = if select_optimal_plan || leaves.is_empty() { 0 } else { rng.gen_range(0..leaves.len()) };
        let mut best: Option<(ActionPlan, f64)> = None;
        for k in 0..leaves.len() {
            let leaf = leaves[(start + k) % leaves.len()];
            if omega[leaf] <= 0.0 {
                continue;
            }
            let (plan, weight) = supporting_plan(tree, player, leaf, omega);
            if weight > best.as_ref().map_or(0.0, |(_, w)| *w) {
                best = Some((plan, weight));
                if !select_optimal_plan {
                    break;
                }
            }
        }

        let (plan, weight) = match best {
            Some(best) => best,
            None => {
                return Err(SolverError::ReconstructionExhaustion {
                    player,
                    leaf_weights: leaves.iter().map(|&l| (l, omega[l])).filter(|(_, w)| *w > LEAF_TOLERANCE).collect(),
                })
            }
        };

        for t in tree.terminals_under_plan(player, &plan) {
            omega[t] -= weight;
        }
        distribution.push((plan, weight));

        if leaves.iter().all(|&l| omega[l] <= LEAF_TOLERANCE) {
            return Ok(distribution);
        }
    }
}

/// Turns the behavioural `strategy` of every player into a distribution over reduced joint
/// plans: each player's realization form is decomposed into pure plans and the per-player
/// distributions are combined by cross product.
pub fn build_joint_from_marginals<St: Strategy, R: Rng + ?Sized>(
    tree: &SolverTree,
    strategy: &St,
    select_optimal_plan: bool,
    rng: &mut R,
) -> Result<Vec<(ActionPlan, f64)>, SolverError> {
    let start = Instant::now();
    let mut per_player = Vec::with_capacity(tree.num_players());
    for p in 0..tree.num_players() {
        let mut omega = realization_form(tree, Some(p), strategy);
        per_player.push(decompose(tree, Some(p), &mut omega, select_optimal_plan, rng)?);
    }

    let joint: Vec<(ActionPlan, f64)> = per_player
        .iter()
        .map(|d| d.iter())
        .multi_cartesian_product()
        .map(|parts| {
            let mut plan = ActionPlan::new();
            let mut weight = 1.0;
            for (p, w) in parts {
                plan.extend(p.iter().map(|(&k, &v)| (k, v)));
                weight *= w;
            }
            (reduce_action_plan(&plan, tree), weight)
        })
        .collect();

    debug!(
        "reconstructed {} joint plans from {:?} per-player plans in {:?}",
        joint.len(),
        per_player.iter().map(|d| d.len()).collect::<Vec<_>>(),
        start.elapsed()
    );
    Ok(joint)
}

/// Like [`build_joint_from_marginals`], with a single realization form over all players.
pub fn build_joint_from_marginals_players_together<St: Strategy, R: Rng + ?Sized>(
    tree: &SolverTree,
    strategy: &St,
    select_optimal_plan: bool,
    rng: &mut R,
) -> Result<Vec<(ActionPlan, f64)>, SolverError> {
    let start = Instant::now();
    let mut omega = realization_form(tree, None, strategy);
    let joint: Vec<(ActionPlan, f64)> = decompose(tree, None, &mut omega, select_optimal_plan, rng)?
        .into_iter()
        .map(|(plan, weight)| (reduce_action_plan(&plan, tree), weight))
        .collect();
    debug!("reconstructed {} joint plans in {:?}", joint.len(), start.elapsed());
    Ok(joint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        strategy::Profile,
        tree::{
            Branch,
            GameTree,
        },
    };
    use rand::SeedableRng;
    use wyhash::WyRng;

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
    fn test_realization_form() {
        let tree = matching_pennies();
        let profile: Profile = [(0, vec![0.25, 0.75]), (1, vec![0.5, 0.5])].into_iter().collect();
        let omega = realization_form(&tree, Some(0), &profile);
        let leaves: Vec<f64> = tree.leaves().iter().map(|&l| omega[l]).collect();
        assert_eq!(leaves, vec![0.25, 0.25, 0.75, 0.75]);

        let omega = realization_form(&tree, None, &profile);
        let leaves: Vec<f64> = tree.leaves().iter().map(|&l| omega[l]).collect();
        assert_eq!(leaves, vec![0.125, 0.125, 0.375, 0.375]);
    }

    #[test]
    fn test_uniform_profile_decomposes_into_four_plans() {
        let tree = matching_pennies();
        let mut rng = WyRng::seed_from_u64(42);
        let joint = build_joint_from_marginals(&tree, &Profile::new(), true, &mut rng).unwrap();
        assert_eq!(joint.len(), 4);
        for (plan, weight) in &joint {
            assert_eq!(plan.len(), 2);
            assert!((weight - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_players_together() {
        let tree = matching_pennies();
        let mut rng = WyRng::seed_from_u64(42);
        let profile: Profile = [(0, vec![1.0, 0.0]), (1, vec![0.5, 0.5])].into_iter().collect();
        let joint = build_joint_from_marginals_players_together(&tree, &profile, false, &mut rng).unwrap();
        let total: f64 = joint.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(joint.iter().all(|(plan, _)| plan.get(&0) == Some(&0)));
    }

    /// Chance picks one of three branches: player 1 alone at `20`, player 0 at `10` (whose
    /// first action leads to `20` again), or a leaf. `20` gets the lower index.
    fn chance_then_either_player() -> (SolverTree, NodeId) {
        let third = 1.0 / 3.0;
        let mut tree = GameTree::with_chance_root(2);
        let x = tree.add_node(0, 1, Some(20), Branch::chance(third)).unwrap();
        tree.add_leaf(x, vec![1.0, 0.0], Branch::action()).unwrap();
        tree.add_leaf(x, vec![0.0, 1.0], Branch::action()).unwrap();
        let i = tree.add_node(0, 0, Some(10), Branch::chance(third)).unwrap();
        let x = tree.add_node(i, 1, Some(20), Branch::action()).unwrap();
        tree.add_leaf(x, vec![1.0, 0.0], Branch::action()).unwrap();
        tree.add_leaf(x, vec![0.0, 1.0], Branch::action()).unwrap();
        tree.add_leaf(i, vec![0.5, 0.5], Branch::action()).unwrap();
        let f = tree.add_leaf(0, vec![0.0, 0.0], Branch::chance(third)).unwrap();
        (SolverTree::build(tree).unwrap(), f)
    }

    #[test]
    fn test_players_together_resolves_later_successors_first() {
        let (tree, f) = chance_then_either_player();
        assert_eq!(tree.index_of(20), Some(0));
        assert_eq!(tree.index_of(10), Some(1));

        let profile: Profile = [(10, vec![0.0, 1.0]), (20, vec![0.5, 0.5])].into_iter().collect();
        let omega = realization_form(&tree, None, &profile);
        let (plan, weight) = supporting_plan(&tree, None, f, &omega);
        assert_eq!(plan.get(&10), Some(&1));
        assert!((weight - 0.5).abs() < 1e-12);

        let mut rng = WyRng::seed_from_u64(42);
        let joint = build_joint_from_marginals_players_together(&tree, &profile, true, &mut rng).unwrap();
        let total: f64 = joint.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(joint.iter().all(|(plan, _)| plan.get(&10) == Some(&1)));
    }

    #[test]
    fn test_exhaustion() {
        let tree = matching_pennies();
        let mut rng = WyRng::seed_from_u64(0);
        let leaves = tree.leaves().to_vec();
        let mut omega = vec![0.0; tree.tree().node_count()];
        omega[leaves[0]] = 0.5;

        let err = decompose(&tree, Some(0), &mut omega, true, &mut rng).unwrap_err();
        assert_eq!(
            err,
            SolverError::ReconstructionExhaustion {
                player: Some(0),
                leaf_weights: vec![(leaves[0], 0.5)]
            }
        );
    }
}
