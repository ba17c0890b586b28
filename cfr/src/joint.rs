use std::collections::BTreeMap;

use log::trace;

use crate::{
    solver_tree::SolverTree,
    tree::InfoSetId,
};

/// One action per information set label.
pub type ActionPlan = BTreeMap<InfoSetId, usize>;

/// A weighted distribution over reduced joint action plans.
#[derive(Debug, Clone, Default)]
pub struct JointStrategy {
    plans: BTreeMap<ActionPlan, f64>,
    frequency_count: f64,
    max_plan_count: Option<usize>,
}

impl JointStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// A joint strategy holding at most `max_plan_count` plans.
    pub fn with_max_plan_count(max_plan_count: usize) -> Self {
        JointStrategy {
            max_plan_count: Some(max_plan_count),
            ..Default::default()
        }
    }

    /// Adds `weight` to `plan`. When the strategy is full and `plan` is new, the least frequent
    /// plan is evicted first.
    pub fn add_action_plan(&mut self, plan: ActionPlan, weight: f64) {
        if let Some(w) = self.plans.get_mut(&plan) {
            *w += weight;
            self.frequency_count += weight;
            return;
        }

        if let Some(max) = self.max_plan_count {
            if self.plans.len() >= max {
                let mut least: Option<(&ActionPlan, f64)> = None;
                for (p, &w) in &self.plans {
                    if least.map_or(true, |(_, lw)| w < lw) {
                        least = Some((p, w));
                    }
                }
                if let Some((p, _)) = least {
                    let p = p.clone();
                    if let Some(w) = self.plans.remove(&p) {
                        trace!("evicting {} ({})", encode_action_plan(&p), w);
                        self.frequency_count -= w;
                    }
                }
            }
        }

        self.plans.insert(plan, weight);
        self.frequency_count += weight;
    }

    pub fn add_joint_distribution<I>(&mut self, distribution: I)
    where
        I: IntoIterator<Item = (ActionPlan, f64)>,
    {
        for (plan, weight) in distribution {
            self.add_action_plan(plan, weight);
        }
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    pub fn frequency_count(&self) -> f64 {
        self.frequency_count
    }

    pub fn max_plan_count(&self) -> Option<usize> {
        self.max_plan_count
    }

    pub fn weight(&self, plan: &ActionPlan) -> Option<f64> {
        self.plans.get(plan).copied()
    }

    /// Plans with their raw weights, in plan order.
    pub fn iter(&self) -> impl Iterator<Item = (&ActionPlan, f64)> {
        self.plans.iter().map(|(p, &w)| (p, w))
    }

    /// Plans with their weights normalised by the frequency count.
    pub fn iter_frequencies(&self) -> impl Iterator<Item = (&ActionPlan, f64)> {
        let total = self.frequency_count;
        self.plans.iter().map(move |(p, &w)| (p, if total > 0.0 { w / total } else { 0.0 }))
    }

    /// Largest single plan weight relative to the frequency count.
    pub fn max_plan_frequency(&self) -> f64 {
        if self.frequency_count <= 0.0 {
            return 0.0;
        }
        self.plans.values().fold(0.0_f64, |m, &w| m.max(w)) / self.frequency_count
    }
}

/// Encodes `plan` as `a{label}.{action}` entries concatenated in label order.
pub fn encode_action_plan(plan: &ActionPlan) -> String {
    plan.iter().map(|(info_set, action)| format!("a{}.{}", info_set, action)).collect()
}

/// Inverse of [`encode_action_plan`]. Returns `None` on malformed input.
pub fn decode_action_plan(s: &str) -> Option<ActionPlan> {
    let mut entries = s.split('a');
    if !entries.next()?.is_empty() {
        return None;
    }
    entries
        .map(|entry| {
            let (info_set, action) = entry.split_once('.')?;
            Some((info_set.parse().ok()?, action.parse().ok()?))
        })
        .collect()
}

/// Keeps only the information sets each player reaches by following its own part of `plan`.
pub fn reduce_action_plan(plan: &ActionPlan, tree: &SolverTree) -> ActionPlan {
    let mut reduced = ActionPlan::new();
    let mut stack: Vec<usize> =
        (0..tree.num_players()).flat_map(|p| tree.root_info_sets(p).collect::<Vec<_>>()).collect();
    while let Some(idx) = stack.pop() {
        let info_set = tree.info_set(idx);
        if let Some(&action) = plan.get(&info_set.id) {
            if reduced.insert(info_set.id, action).is_none() {
                stack.extend(&info_set.children_info_sets[action]);
            }
        }
    }
    reduced
}
