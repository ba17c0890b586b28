use std::fmt::Display;

use crate::tree::{
    InfoSetId,
    NodeId,
};

/// Errors raised while building or validating a game tree.
///
/// These describe a structurally broken input; none of them can be recovered from by
/// retrying.
#[derive(Debug, Clone, PartialEq)]
pub enum GameError {
    /// Two nodes of the same information set have different sequences for the acting player.
    PerfectRecall {
        info_set: InfoSetId,
        nodes: Vec<NodeId>,
    },
    /// A leaf utility vector does not have one entry per player.
    UtilityLength {
        node: NodeId,
        expected: usize,
        actual: usize,
    },
    /// A chance node distribution does not sum to one or does not match its children.
    ChanceDistribution {
        node: NodeId,
        total_prob: f64,
        children: usize,
        probabilities: usize,
    },
    /// Nodes of the same information set have a different number of actions.
    ActionCountMismatch {
        info_set: InfoSetId,
        expected: usize,
        actual: usize,
    },
    /// Nodes of the same information set belong to different players.
    PlayerMismatch {
        info_set: InfoSetId,
        expected: usize,
        actual: usize,
    },
    /// A child was attached to a leaf.
    LeafParent(NodeId),
    /// A child of a chance node was added without a probability.
    MissingProbability(NodeId),
    /// A decision node was given a player outside `0..num_players`.
    InvalidPlayer {
        player: usize,
        num_players: usize,
    },
    /// A node id that does not exist in the tree.
    UnknownNode(NodeId),
    /// A decision node without any action.
    NoActions(NodeId),
}

impl Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameError::PerfectRecall {
                info_set,
                nodes,
            } => write!(
                f,
                "not a game with perfect recall: nodes {:?} of information set {} have different sequences",
                nodes, info_set
            ),
            GameError::UtilityLength {
                node,
                expected,
                actual,
            } => write!(f, "leaf {} has {} utilities but the game has {} players", node, actual, expected),
            GameError::ChanceDistribution {
                node,
                total_prob,
                children,
                probabilities,
            } => write!(
                f,
                "chance node {} has {} probabilities for {} children summing to {}",
                node, probabilities, children, total_prob
            ),
            GameError::ActionCountMismatch {
                info_set,
                expected,
                actual,
            } => write!(
                f,
                "information set {} has nodes with {} and {} actions",
                info_set, expected, actual
            ),
            GameError::PlayerMismatch {
                info_set,
                expected,
                actual,
            } => write!(
                f,
                "information set {} has nodes of player {} and player {}",
                info_set, expected, actual
            ),
            GameError::LeafParent(node) => write!(f, "leaf {} cannot have children", node),
            GameError::MissingProbability(node) => {
                write!(f, "child of chance node {} needs a probability", node)
            }
            GameError::InvalidPlayer {
                player,
                num_players,
            } => write!(f, "player {} is out of range for a {}-player game", player, num_players),
            GameError::UnknownNode(node) => write!(f, "node {} does not exist", node),
            GameError::NoActions(node) => write!(f, "decision node {} has no actions", node),
        }
    }
}

impl std::error::Error for GameError {}

/// Errors raised while running a solver.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverError {
    /// The stationary distribution of an internal regret minimizer could not be found.
    NumericalDegeneracy {
        matrix: Vec<Vec<f64>>,
    },
    /// Reconstruction ran out of positive supporting plans while some leaf still has weight.
    ReconstructionExhaustion {
        player: Option<usize>,
        leaf_weights: Vec<(NodeId, f64)>,
    },
    Game(GameError),
}

impl Display for SolverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolverError::NumericalDegeneracy {
                matrix,
            } => write!(f, "no non-negative stationary distribution for strategy matrix {:?}", matrix),
            SolverError::ReconstructionExhaustion {
                player,
                leaf_weights,
            } => {
                match player {
                    Some(p) => write!(f, "reconstruction for player {} is exhausted", p)?,
                    None => write!(f, "reconstruction for all players is exhausted")?,
                }
                write!(f, "; remaining leaf weights: {:?}", leaf_weights)
            }
            SolverError::Game(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for SolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SolverError::Game(err) => Some(err),
            _ => None,
        }
    }
}

impl From<GameError> for SolverError {
    fn from(err: GameError) -> Self {
        SolverError::Game(err)
    }
}
