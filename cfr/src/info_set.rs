use std::fmt::Display;

use more_asserts::debug_assert_ge;

use crate::{
    regret::{
        normalize,
        regret_matching,
    },
    tree::{
        InfoSetId,
        NodeId,
        Sequence,
    },
};

/// The first own deviation `(information set, recommended action)` on a sequence.
pub type Signal = (InfoSetId, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Reachability {
    #[default]
    Unreached,
    /// Every own recommendation on the sequence was followed.
    Internal,
    External(Signal),
}

/// Per-iteration scratch state.
#[derive(Debug, Clone, Default)]
pub struct Transient {
    pub reachability: Reachability,
    pub action: Option<usize>,
    pub utility: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct InformationSet {
    pub id: InfoSetId,
    pub player: usize,
    pub action_count: usize,
    pub sequence: Sequence,
    pub nodes: Vec<NodeId>,
    /// Dense indices of the same-player information sets directly below each action.
    pub children_info_sets: Vec<Vec<usize>>,
    /// Leaves below each action reached without another decision of this player.
    pub children_leaves: Vec<Vec<NodeId>>,

    pub cumulative_regret: Vec<f64>,
    pub cumulative_strategy: Vec<f64>,
    pub current_strategy: Vec<f64>,

    pub transient: Transient,
}

impl InformationSet {
    pub fn new(id: InfoSetId, player: usize, action_count: usize, sequence: Sequence) -> Self {
        InformationSet {
            id,
            player,
            action_count,
            sequence,
            nodes: vec![],
            children_info_sets: vec![vec![]; action_count],
            children_leaves: vec![vec![]; action_count],
            cumulative_regret: vec![0.0; action_count],
            cumulative_strategy: vec![0.0; action_count],
            current_strategy: vec![1.0 / action_count as f64; action_count],
            transient: Transient {
                utility: vec![0.0; action_count],
                ..Default::default()
            },
        }
    }

    pub fn update_current_strategy(&mut self) {
        self.current_strategy = regret_matching(&self.cumulative_regret);
        for p in &self.current_strategy {
            debug_assert_ge!(*p, 0.0);
        }
    }

    pub fn average_strategy(&self) -> Vec<f64> {
        normalize(&self.cumulative_strategy)
    }

    pub fn reset_for_iteration(&mut self) {
        self.transient.reachability = Reachability::Unreached;
        self.transient.action = None;
        self.transient.utility.iter_mut().for_each(|u| *u = 0.0);
    }
}

impl Display for InformationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Infoset {} (player {}) {}", self.id, self.player, self.sequence)?;

        write!(f, " Avg Strategy[")?;
        for p in self.average_strategy() {
            write!(f, "{:.03}, ", p)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategies() {
        let mut info_set = InformationSet::new(3, 1, 2, Sequence::new());
        assert_eq!(info_set.average_strategy(), vec![0.5, 0.5]);

        info_set.cumulative_regret = vec![-1.0, 2.0];
        info_set.update_current_strategy();
        assert_eq!(info_set.current_strategy, vec![0.0, 1.0]);

        info_set.cumulative_strategy = vec![1.0, 3.0];
        assert_eq!(info_set.average_strategy(), vec![0.25, 0.75]);
    }

    #[test]
    fn test_reset_for_iteration() {
        let mut info_set = InformationSet::new(0, 0, 2, Sequence::new());
        info_set.transient.reachability = Reachability::External((4, 1));
        info_set.transient.action = Some(1);
        info_set.transient.utility[0] = 2.0;
        info_set.reset_for_iteration();
        assert_eq!(info_set.transient.reachability, Reachability::Unreached);
        assert_eq!(info_set.transient.action, None);
        assert_eq!(info_set.transient.utility, vec![0.0, 0.0]);
    }
}
