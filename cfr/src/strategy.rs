use std::collections::HashMap;

use crate::{
    info_set::InformationSet,
    tree::InfoSetId,
};

/// Explicit behavioural profile, keyed by information set label.
pub type Profile = HashMap<InfoSetId, Vec<f64>>;

pub trait Strategy {
    fn get_strategy(&self, info_set: &InformationSet) -> Option<Vec<f64>>;

    fn safe_get_strategy(&self, info_set: &InformationSet) -> Vec<f64> {
        match self.get_strategy(info_set) {
            Some(s) => s,
            None => vec![1.0 / info_set.action_count as f64; info_set.action_count],
        }
    }
}

/// The strategy produced by the last regret matching step.
pub struct CurrentStrategy;

impl Strategy for CurrentStrategy {
    fn get_strategy(&self, info_set: &InformationSet) -> Option<Vec<f64>> {
        Some(info_set.current_strategy.clone())
    }
}

pub struct AverageStrategy;

impl Strategy for AverageStrategy {
    fn get_strategy(&self, info_set: &InformationSet) -> Option<Vec<f64>> {
        Some(info_set.average_strategy())
    }
}

impl Strategy for Profile {
    fn get_strategy(&self, info_set: &InformationSet) -> Option<Vec<f64>> {
        self.get(&info_set.id).cloned()
    }
}
