//! Counterfactual regret minimization for multi-player extensive-form games.
//!
//! A game is described as a [`GameTree`], validated once into a [`SolverTree`] and then
//! handed to one of the engines in [`solvers`]. Engines that target correlated equilibria
//! also build a [`JointStrategy`] over reduced joint action plans.

pub mod error;
pub mod eval;
pub mod info_set;
pub mod joint;
pub mod reconstruction;
pub mod regret;
pub mod solver_tree;
pub mod solvers;
pub mod strategy;
pub mod tree;

pub use error::{
    GameError,
    SolverError,
};
pub use joint::{
    ActionPlan,
    JointStrategy,
};
pub use solver_tree::SolverTree;
pub use solvers::{
    run_solver,
    Checkpoint,
    SolveResult,
    Solver,
};
pub use tree::{
    Branch,
    GameTree,
};
