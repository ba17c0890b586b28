use std::collections::HashMap;

use log::debug;
use rand::Rng;

use crate::{
    error::GameError,
    eval,
    info_set::InformationSet,
    joint::ActionPlan,
    regret::sample_index,
    strategy::AverageStrategy,
    tree::{
        GameTree,
        InfoSetId,
        NodeId,
        NodeKind,
        Sequence,
    },
};

const CHANCE_TOLERANCE: f64 = 1e-9;

/// A validated game tree plus the information sets and the solver state attached to them.
#[derive(Debug, Clone)]
pub struct SolverTree {
    tree: GameTree,
    info_sets: Vec<InformationSet>,
    index: HashMap<InfoSetId, usize>,
    node_info_set: Vec<Option<usize>>,
    by_player: Vec<Vec<usize>>,
    leaves: Vec<NodeId>,
    num_actions: usize,
}

impl SolverTree {
    /// Validates `tree` and groups its decision nodes into information sets.
    ///
    /// Information sets are indexed in the order a depth-first walk first meets them, so every
    /// information set on the sequence of another one has a smaller index.
    pub fn build(tree: GameTree) -> Result<Self, GameError> {
        let num_players = tree.num_players();
        let mut info_sets: Vec<InformationSet> = vec![];
        let mut index: HashMap<InfoSetId, usize> = HashMap::new();
        let mut node_info_set = vec![None; tree.node_count()];
        let mut leaves = vec![];

        let mut stack = vec![tree.root()];
        while let Some(id) = stack.pop() {
            let node = tree.node(id);
            match &node.kind {
                NodeKind::Leaf {
                    utility,
                } => {
                    if utility.len() != num_players {
                        return Err(GameError::UtilityLength {
                            node: id,
                            expected: num_players,
                            actual: utility.len(),
                        });
                    }
                    leaves.push(id);
                }
                NodeKind::Chance {
                    distribution,
                } => {
                    let total_prob: f64 = distribution.iter().sum();
                    if distribution.len() != node.children.len()
                        || distribution.iter().any(|p| !(0.0..=1.0).contains(p))
                        || !((total_prob - 1.0).abs() <= CHANCE_TOLERANCE)
                    {
                        return Err(GameError::ChanceDistribution {
                            node: id,
                            total_prob,
                            children: node.children.len(),
                            probabilities: distribution.len(),
                        });
                    }
                }
                NodeKind::Decision {
                    player,
                    info_set,
                } => {
                    let (player, label) = (*player, *info_set);
                    if node.children.is_empty() {
                        return Err(GameError::NoActions(id));
                    }
                    if player >= num_players {
                        return Err(GameError::InvalidPlayer {
                            player,
                            num_players,
                        });
                    }
                    let sequence = tree.sequence(id, Some(player));

                    let idx = match index.get(&label) {
                        Some(&idx) => {
                            let existing = &info_sets[idx];
                            if existing.player != player {
                                return Err(GameError::PlayerMismatch {
                                    info_set: label,
                                    expected: existing.player,
                                    actual: player,
                                });
                            }
                            if existing.action_count != node.children.len() {
                                return Err(GameError::ActionCountMismatch {
                                    info_set: label,
                                    expected: existing.action_count,
                                    actual: node.children.len(),
                                });
                            }
                            if existing.sequence != sequence {
                                let mut nodes = existing.nodes.clone();
                                nodes.push(id);
                                return Err(GameError::PerfectRecall {
                                    info_set: label,
                                    nodes,
                                });
                            }
                            idx
                        }
                        None => {
                            let idx = info_sets.len();
                            info_sets.push(InformationSet::new(label, player, node.children.len(), sequence));
                            index.insert(label, idx);
                            idx
                        }
                    };
                    info_sets[idx].nodes.push(id);
                    node_info_set[id] = Some(idx);
                }
            }
            stack.extend(node.children.iter().rev());
        }
        leaves.sort_unstable();

        let mut by_player = vec![vec![]; num_players];
        for (idx, info_set) in info_sets.iter().enumerate() {
            by_player[info_set.player].push(idx);
        }

        for idx in 0..info_sets.len() {
            for action in 0..info_sets[idx].action_count {
                let (children, leaves) = children_below(&tree, &node_info_set, &info_sets[idx], action);
                info_sets[idx].children_info_sets[action] = children;
                info_sets[idx].children_leaves[action] = leaves;
            }
        }

        let num_actions = info_sets.iter().map(|i| i.action_count).sum();
        debug!(
            "built solver tree: {} nodes, {} leaves, {} information sets, {} actions",
            tree.node_count(),
            leaves.len(),
            info_sets.len(),
            num_actions
        );

        Ok(SolverTree {
            tree,
            info_sets,
            index,
            node_info_set,
            by_player,
            leaves,
            num_actions,
        })
    }

    #[inline]
    pub fn tree(&self) -> &GameTree {
        &self.tree
    }

    #[inline]
    pub fn num_players(&self) -> usize {
        self.tree.num_players()
    }

    pub fn info_sets(&self) -> &[InformationSet] {
        &self.info_sets
    }

    pub fn info_sets_mut(&mut self) -> &mut [InformationSet] {
        &mut self.info_sets
    }

    #[inline]
    pub fn info_set(&self, idx: usize) -> &InformationSet {
        &self.info_sets[idx]
    }

    /// Dense index of the information set labelled `label`.
    pub fn index_of(&self, label: InfoSetId) -> Option<usize> {
        self.index.get(&label).copied()
    }

    /// Dense index of the information set `node` belongs to, `None` for chance nodes and leaves.
    #[inline]
    pub fn info_set_of(&self, node: NodeId) -> Option<usize> {
        self.node_info_set[node]
    }

    pub fn player_info_sets(&self, player: usize) -> &[usize] {
        &self.by_player[player]
    }

    /// Information sets of `player` with an empty sequence.
    pub fn root_info_sets(&self, player: usize) -> impl Iterator<Item = usize> + '_ {
        self.by_player[player].iter().copied().filter(|&i| self.info_sets[i].sequence.is_empty())
    }

    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn sequence(&self, node: NodeId, player: Option<usize>) -> Sequence {
        self.tree.sequence(node, player)
    }

    /// Splits the tree into its read-only structure and the mutable information sets.
    pub fn parts_mut(&mut self) -> (&GameTree, &[Option<usize>], &mut [InformationSet]) {
        (&self.tree, &self.node_info_set, &mut self.info_sets)
    }

    pub fn reset_transients(&mut self) {
        self.info_sets.iter_mut().for_each(|i| i.reset_for_iteration());
    }

    /// Samples one action per information set from the current strategies.
    pub fn sample_action_plan<R: Rng + ?Sized>(&self, rng: &mut R) -> ActionPlan {
        self.info_sets.iter().map(|i| (i.id, sample_index(&i.current_strategy, rng))).collect()
    }

    /// Expected utility when every player follows `plan`, with chance at its distribution.
    /// Branches leading to an information set missing from the plan contribute nothing.
    pub fn utility_from_action_plan(&self, plan: &ActionPlan) -> Vec<f64> {
        let mut utility = vec![0.0; self.num_players()];
        let mut stack = vec![(self.tree.root(), 1.0)];
        while let Some((id, prob)) = stack.pop() {
            let node = self.tree.node(id);
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
                    info_set, ..
                } => {
                    if let Some(&action) = plan.get(info_set) {
                        stack.push((node.children[action], prob));
                    }
                }
            }
        }
        utility
    }

    /// Leaves reachable from the root when `player` (every player when `None`) follows `plan`
    /// and all other branches are open.
    pub fn terminals_under_plan(&self, player: Option<usize>, plan: &ActionPlan) -> Vec<NodeId> {
        let mut terminals = vec![];
        let mut stack = vec![self.tree.root()];
        while let Some(id) = stack.pop() {
            let node = self.tree.node(id);
            match node.kind {
                NodeKind::Leaf {
                    ..
                } => terminals.push(id),
                NodeKind::Decision {
                    player: acting,
                    info_set,
                } if player.map_or(true, |p| p == acting) => {
                    if let Some(&action) = plan.get(&info_set) {
                        stack.push(node.children[action]);
                    }
                }
                _ => stack.extend(node.children.iter().rev()),
            }
        }
        terminals
    }

    /// Expected utility of every player under the average strategies.
    pub fn expected_utility(&self) -> Vec<f64> {
        eval::expected_utility(self, &AverageStrategy)
    }
}

fn children_below(
    tree: &GameTree,
    node_info_set: &[Option<usize>],
    info_set: &InformationSet,
    action: usize,
) -> (Vec<usize>, Vec<NodeId>) {
    let mut info_sets = vec![];
    let mut leaves = vec![];
    let mut stack: Vec<NodeId> = info_set.nodes.iter().map(|&n| tree.node(n).children[action]).collect();
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        match node.kind {
            NodeKind::Leaf {
                ..
            } => leaves.push(id),
            NodeKind::Decision {
                player, ..
            } if player == info_set.player => {
                if let Some(idx) = node_info_set[id] {
                    info_sets.push(idx);
                }
            }
            _ => stack.extend(&node.children),
        }
    }
    info_sets.sort_unstable();
    info_sets.dedup();
    leaves.sort_unstable();
    leaves.dedup();
    (info_sets, leaves)
}
