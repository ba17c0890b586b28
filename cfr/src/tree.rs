use std::fmt::Display;

use log::trace;

use crate::error::GameError;

pub type NodeId = usize;

/// Raw information set label as handed out by the game builder. Labels may repeat across
/// nodes; every node sharing a label belongs to the same information set.
pub type InfoSetId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Decision {
        player: usize,
        info_set: InfoSetId,
    },
    Chance {
        distribution: Vec<f64>,
    },
    Leaf {
        utility: Vec<f64>,
    },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub depth: usize,
    pub parent: Option<NodeId>,
    /// Index of this node among the children of its parent.
    pub incoming_action: Option<usize>,
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub action_names: Vec<String>,
}

impl Node {
    fn new(id: NodeId, kind: NodeKind, parent: Option<&Node>) -> Self {
        Node {
            id,
            depth: parent.map_or(0, |p| p.depth + 1),
            parent: parent.map(|p| p.id),
            incoming_action: parent.map(|p| p.children.len()),
            kind,
            children: vec![],
            action_names: vec![],
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    #[inline]
    pub fn is_chance(&self) -> bool {
        matches!(self.kind, NodeKind::Chance { .. })
    }

    pub fn info_set(&self) -> Option<InfoSetId> {
        match self.kind {
            NodeKind::Decision {
                info_set, ..
            } => Some(info_set),
            _ => None,
        }
    }

    pub fn utility(&self) -> Option<&[f64]> {
        match &self.kind {
            NodeKind::Leaf {
                utility,
            } => Some(utility),
            _ => None,
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            NodeKind::Decision {
                player,
                info_set,
            } => write!(f, "Player {} - Infoset {} - Node {}", player, info_set, self.id)?,
            NodeKind::Chance {
                ..
            } => write!(f, "Chance {}", self.id)?,
            NodeKind::Leaf {
                utility,
            } => write!(f, "Leaf {} {:?}", self.id, utility)?,
        }
        if let (Some(parent), Some(action)) = (self.parent, self.incoming_action) {
            write!(f, " (children of Node {} via action {})", parent, action)?;
        }
        Ok(())
    }
}

/// How a new node hangs off its parent: the probability (required under chance nodes) and an
/// optional action name.
#[derive(Debug, Clone, Default)]
pub struct Branch {
    probability: Option<f64>,
    name: Option<String>,
}

impl Branch {
    pub fn action() -> Self {
        Self::default()
    }

    pub fn chance(probability: f64) -> Self {
        Branch {
            probability: Some(probability),
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The ordered list of `(information set, action)` decisions on the path from the root to a
/// node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Sequence(Vec<(InfoSetId, usize)>);

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, info_set: InfoSetId, action: usize) {
        self.0.push((info_set, action));
    }

    pub fn get(&self, info_set: InfoSetId) -> Option<usize> {
        self.0.iter().find(|(i, _)| *i == info_set).map(|(_, a)| *a)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(InfoSetId, usize)> {
        self.0.iter()
    }
}

impl FromIterator<(InfoSetId, usize)> for Sequence {
    fn from_iter<T: IntoIterator<Item = (InfoSetId, usize)>>(iter: T) -> Self {
        Sequence(iter.into_iter().collect())
    }
}

impl Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (info_set, action)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", info_set, action)?;
        }
        write!(f, "}}")
    }
}

/// Extensive-form game tree for an arbitrary number of players plus chance.
///
/// Nodes live in an arena and their id is their index, so ids are dense and stable.
#[derive(Debug, Clone)]
pub struct GameTree {
    num_players: usize,
    root: NodeId,
    nodes: Vec<Node>,
    next_info_set: InfoSetId,
    max_depth: usize,
}

impl GameTree {
    /// Creates a tree whose root is a decision node of `first_player` in information set 0.
    pub fn new(num_players: usize, first_player: usize) -> Self {
        let root = Node::new(
            0,
            NodeKind::Decision {
                player: first_player,
                info_set: 0,
            },
            None,
        );
        GameTree {
            num_players,
            root: 0,
            nodes: vec![root],
            next_info_set: 1,
            max_depth: 0,
        }
    }

    /// Creates a tree whose root is a chance node.
    pub fn with_chance_root(num_players: usize) -> Self {
        let root = Node::new(
            0,
            NodeKind::Chance {
                distribution: vec![],
            },
            None,
        );
        GameTree {
            num_players,
            root: 0,
            nodes: vec![root],
            next_info_set: 0,
            max_depth: 0,
        }
    }

    #[inline]
    pub fn num_players(&self) -> usize {
        self.num_players
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Adds a decision node for `player` under `parent`. A fresh information set label is
    /// generated when `info_set` is `None`.
    pub fn add_node(
        &mut self,
        parent: NodeId,
        player: usize,
        info_set: Option<InfoSetId>,
        branch: Branch,
    ) -> Result<NodeId, GameError> {
        if player >= self.num_players {
            return Err(GameError::InvalidPlayer {
                player,
                num_players: self.num_players,
            });
        }
        let info_set = match info_set {
            Some(label) => {
                self.next_info_set = self.next_info_set.max(label + 1);
                label
            }
            None => {
                let label = self.next_info_set;
                self.next_info_set += 1;
                label
            }
        };
        self.attach(
            parent,
            NodeKind::Decision {
                player,
                info_set,
            },
            branch,
        )
    }

    pub fn add_chance_node(&mut self, parent: NodeId, branch: Branch) -> Result<NodeId, GameError> {
        self.attach(
            parent,
            NodeKind::Chance {
                distribution: vec![],
            },
            branch,
        )
    }

    pub fn add_leaf(
        &mut self,
        parent: NodeId,
        utility: Vec<f64>,
        branch: Branch,
    ) -> Result<NodeId, GameError> {
        if utility.len() != self.num_players {
            return Err(GameError::UtilityLength {
                node: self.nodes.len(),
                expected: self.num_players,
                actual: utility.len(),
            });
        }
        self.attach(
            parent,
            NodeKind::Leaf {
                utility,
            },
            branch,
        )
    }

    fn attach(&mut self, parent: NodeId, kind: NodeKind, branch: Branch) -> Result<NodeId, GameError> {
        let id = self.nodes.len();
        let parent_node = self.nodes.get(parent).ok_or(GameError::UnknownNode(parent))?;
        let child = Node::new(id, kind, Some(parent_node));
        let action = parent_node.children.len();

        let default_name = match &parent_node.kind {
            NodeKind::Leaf {
                ..
            } => return Err(GameError::LeafParent(parent)),
            NodeKind::Chance {
                ..
            } => {
                if branch.probability.is_none() {
                    return Err(GameError::MissingProbability(parent));
                }
                format!("c.{}", action)
            }
            NodeKind::Decision {
                info_set, ..
            } => format!("{}.{}", info_set, action),
        };

        let parent_node = &mut self.nodes[parent];
        if let NodeKind::Chance {
            distribution,
        } = &mut parent_node.kind
        {
            distribution.push(branch.probability.unwrap_or_default());
        }
        parent_node.children.push(id);
        parent_node.action_names.push(branch.name.unwrap_or(default_name));

        self.max_depth = self.max_depth.max(child.depth);
        trace!("added {}", child);
        self.nodes.push(child);
        Ok(id)
    }

    /// Returns the decisions of `player` (of every player when `None`) on the path from the
    /// root to `node`. Chance nodes are never part of a sequence.
    pub fn sequence(&self, node: NodeId, player: Option<usize>) -> Sequence {
        let mut pairs = vec![];
        let mut current = &self.nodes[node];
        while let (Some(parent), Some(action)) = (current.parent, current.incoming_action) {
            let parent = &self.nodes[parent];
            if let NodeKind::Decision {
                player: acting,
                info_set,
            } = parent.kind
            {
                if player.map_or(true, |p| p == acting) {
                    pairs.push((info_set, action));
                }
            }
            current = parent;
        }
        pairs.reverse();
        Sequence(pairs)
    }
}
