use log::trace;
use more_asserts::debug_assert_ge;
use rand::Rng;

use crate::error::SolverError;

const NULL_SPACE_TOLERANCE: f64 = 1e-9;

/// Positive part of `regret`, normalised. Uniform when no action has positive regret.
pub fn regret_matching(regret: &[f64]) -> Vec<f64> {
    let mut sum = 0.0;
    for r in regret {
        sum += r.max(0.0);
    }
    if sum <= 0.0 {
        let s = 1.0 / regret.len() as f64;
        return vec![s; regret.len()];
    }
    regret.iter().map(|r| r.max(0.0) / sum).collect()
}

/// Normalises `weights` to a distribution, falling back to uniform when they sum to zero.
pub fn normalize(weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        let s = 1.0 / weights.len() as f64;
        return vec![s; weights.len()];
    }
    weights.iter().map(|w| w / sum).collect()
}

/// Draws an index from `probs` with a single uniform sample and a binary search over the
/// cumulative distribution. Actions with zero probability are never returned.
pub fn sample_index<R: Rng + ?Sized>(probs: &[f64], rng: &mut R) -> usize {
    debug_assert!(!probs.is_empty());
    let mut cumulative = Vec::with_capacity(probs.len());
    let mut acc = 0.0;
    for p in probs {
        debug_assert_ge!(*p, 0.0);
        acc += p;
        cumulative.push(acc);
    }
    let r: f64 = rng.gen::<f64>() * acc;
    cumulative.partition_point(|&c| c <= r).min(probs.len() - 1)
}

pub trait RegretMinimizer {
    fn action_count(&self) -> usize;

    /// Computes the next strategy and samples an action from it.
    fn recommend<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize, SolverError>;

    /// Feeds back the utility of every action for the last recommendation.
    fn observe(&mut self, utility: &[f64]);

    fn average_strategy(&self) -> Vec<f64>;
}

#[derive(Debug, Clone)]
pub struct ExternalRegretMinimizer {
    regret: Vec<f64>,
    strategy_sum: Vec<f64>,
    last_recommended: Option<usize>,
}

impl ExternalRegretMinimizer {
    pub fn new(action_count: usize) -> Self {
        ExternalRegretMinimizer {
            regret: vec![0.0; action_count],
            strategy_sum: vec![0.0; action_count],
            last_recommended: None,
        }
    }

    pub fn regret(&self) -> &[f64] {
        &self.regret
    }

    pub fn last_recommended(&self) -> Option<usize> {
        self.last_recommended
    }

    fn next_strategy(&mut self) -> Vec<f64> {
        let strategy = regret_matching(&self.regret);
        for (sum, p) in self.strategy_sum.iter_mut().zip(&strategy) {
            *sum += p;
        }
        strategy
    }
}

impl RegretMinimizer for ExternalRegretMinimizer {
    fn action_count(&self) -> usize {
        self.regret.len()
    }

    fn recommend<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize, SolverError> {
        let strategy = self.next_strategy();
        let action = sample_index(&strategy, rng);
        self.last_recommended = Some(action);
        Ok(action)
    }

    fn observe(&mut self, utility: &[f64]) {
        debug_assert_eq!(utility.len(), self.regret.len());
        let last = match self.last_recommended {
            Some(last) => last,
            None => return,
        };
        let baseline = utility[last];
        for (r, u) in self.regret.iter_mut().zip(utility) {
            *r += u - baseline;
        }
    }

    fn average_strategy(&self) -> Vec<f64> {
        normalize(&self.strategy_sum)
    }
}

/// Swap-regret minimizer: one regret row per action, recommending from the stationary
/// distribution of the row strategies.
#[derive(Debug, Clone)]
pub struct InternalRegretMinimizer {
    regret: Vec<Vec<f64>>,
    strategy_sum: Vec<Vec<f64>>,
    recommendation_sum: Vec<f64>,
    row_recommended: Vec<usize>,
    stationary: Vec<f64>,
    last_recommended: Option<usize>,
}

impl InternalRegretMinimizer {
    pub fn new(action_count: usize) -> Self {
        InternalRegretMinimizer {
            regret: vec![vec![0.0; action_count]; action_count],
            strategy_sum: vec![vec![0.0; action_count]; action_count],
            recommendation_sum: vec![0.0; action_count],
            row_recommended: vec![0; action_count],
            stationary: vec![1.0 / action_count as f64; action_count],
            last_recommended: None,
        }
    }

    pub fn regret(&self) -> &[Vec<f64>] {
        &self.regret
    }

    /// Sum of the row strategy matrices computed so far.
    pub fn strategy_sum(&self) -> &[Vec<f64>] {
        &self.strategy_sum
    }

    /// The mixed strategy behind the last recommendation.
    pub fn current_strategy(&self) -> &[f64] {
        &self.stationary
    }

    pub fn last_recommended(&self) -> Option<usize> {
        self.last_recommended
    }
}

impl RegretMinimizer for InternalRegretMinimizer {
    fn action_count(&self) -> usize {
        self.regret.len()
    }

    fn recommend<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize, SolverError> {
        let mut rows = Vec::with_capacity(self.regret.len());
        for (i, row_regret) in self.regret.iter().enumerate() {
            let row = regret_matching(row_regret);
            self.row_recommended[i] = sample_index(&row, rng);
            for (sum, p) in self.strategy_sum[i].iter_mut().zip(&row) {
                *sum += p;
            }
            rows.push(row);
        }

        self.stationary = stationary_distribution(&rows)?;
        for (sum, p) in self.recommendation_sum.iter_mut().zip(&self.stationary) {
            *sum += p;
        }
        let action = sample_index(&self.stationary, rng);
        self.last_recommended = Some(action);
        Ok(action)
    }

    fn observe(&mut self, utility: &[f64]) {
        debug_assert_eq!(utility.len(), self.regret.len());
        for (i, row_regret) in self.regret.iter_mut().enumerate() {
            let weight = self.stationary[i];
            let baseline = weight * utility[self.row_recommended[i]];
            for (r, u) in row_regret.iter_mut().zip(utility) {
                *r += weight * u - baseline;
            }
        }
    }

    fn average_strategy(&self) -> Vec<f64> {
        normalize(&self.recommendation_sum)
    }
}

/// Stationary distribution `p = Mᵀp` of the row-stochastic matrix `rows`.
///
/// Computes a basis of the null space of `Mᵀ − I` and returns the first basis vector that,
/// after sign correction, has no negative entry.
pub fn stationary_distribution(rows: &[Vec<f64>]) -> Result<Vec<f64>, SolverError> {
    let n = rows.len();
    let mut a: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| rows[j][i] - if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    let pivots = reduced_row_echelon(&mut a);
    let free_columns = (0..n).filter(|c| !pivots.contains(c));

    for free in free_columns {
        let mut v = vec![0.0; n];
        v[free] = 1.0;
        for (r, &pivot) in pivots.iter().enumerate() {
            v[pivot] = -a[r][free];
        }

        let sum: f64 = v.iter().sum();
        if sum.abs() <= NULL_SPACE_TOLERANCE {
            continue;
        }
        if sum < 0.0 {
            v.iter_mut().for_each(|x| *x = -*x);
        }
        if v.iter().any(|x| *x < -NULL_SPACE_TOLERANCE) {
            trace!("rejecting null vector {:?}", v);
            continue;
        }
        let sum = sum.abs();
        return Ok(v.iter().map(|x| x.max(0.0) / sum).collect());
    }

    Err(SolverError::NumericalDegeneracy {
        matrix: rows.to_vec(),
    })
}

/// Reduces `a` in place to reduced row echelon form and returns the pivot column of every
/// non-zero row.
fn reduced_row_echelon(a: &mut [Vec<f64>]) -> Vec<usize> {
    let rows = a.len();
    let cols = a.first().map_or(0, |r| r.len());
    let scale = a.iter().flatten().fold(1.0_f64, |m, x| m.max(x.abs()));
    let tolerance = NULL_SPACE_TOLERANCE * scale;

    let mut pivots = vec![];
    let mut row = 0;
    for col in 0..cols {
        if row == rows {
            break;
        }
        let best = (row..rows)
            .max_by(|&x, &y| a[x][col].abs().total_cmp(&a[y][col].abs()))
            .unwrap_or(row);
        if a[best][col].abs() <= tolerance {
            for r in a.iter_mut().skip(row) {
                r[col] = 0.0;
            }
            continue;
        }
        a.swap(row, best);

        let pivot = a[row][col];
        a[row].iter_mut().for_each(|x| *x /= pivot);
        let pivot_row = a[row].clone();
        for (r, other) in a.iter_mut().enumerate() {
            let factor = other[col];
            if r == row || factor == 0.0 {
                continue;
            }
            for (x, p) in other.iter_mut().zip(&pivot_row) {
                *x -= factor * p;
            }
        }
        pivots.push(col);
        row += 1;
    }
    pivots
}
