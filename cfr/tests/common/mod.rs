#![allow(dead_code)]

use efg_cfr::{
    Branch,
    GameTree,
    SolverTree,
};
use itertools::Itertools;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Chance flips a fair coin, player 0 sees it and picks `a` or `b`, player 1 picks `x` or `y`
/// seeing nothing. `a` and `y` are dominant, so the game value for player 0 is 0.5.
pub fn dominant_strategy_game() -> SolverTree {
    let payoffs = [[3.0, 1.0, 0.0, -1.0], [2.0, 0.0, 1.0, -2.0]];
    let mut tree = GameTree::with_chance_root(2);
    for (coin, row) in payoffs.iter().enumerate() {
        let p0 = tree.add_node(0, 0, Some(1 + coin), Branch::chance(0.5)).unwrap();
        for action in 0..2 {
            let p1 = tree.add_node(p0, 1, Some(3), Branch::action().named(["a", "b"][action])).unwrap();
            for response in 0..2 {
                let u = row[2 * action + response];
                tree.add_leaf(p1, vec![u, -u], Branch::action().named(["x", "y"][response])).unwrap();
            }
        }
    }
    SolverTree::build(tree).unwrap()
}

pub const KUHN_VALUE: f64 = -1.0 / 18.0;

/// Information set label for `player` holding `card` after `history` ("", "p", "b", "pb").
fn kuhn_label(player: usize, card: usize, history: &str) -> usize {
    let h = match history {
        "" => 0,
        "p" => 1,
        "b" => 2,
        _ => 3,
    };
    1 + player * 100 + card * 10 + h
}

/// Two-player Kuhn poker with a three card deck. Action 0 is pass, action 1 is bet.
pub fn kuhn() -> SolverTree {
    let mut tree = GameTree::with_chance_root(2);
    for deal in (0..3).permutations(2) {
        let (c0, c1) = (deal[0], deal[1]);
        let showdown = |stake: f64| if c0 > c1 { vec![stake, -stake] } else { vec![-stake, stake] };

        let root = tree.add_node(0, 0, Some(kuhn_label(0, c0, "")), Branch::chance(1.0 / 6.0)).unwrap();

        let p = tree.add_node(root, 1, Some(kuhn_label(1, c1, "p")), Branch::action().named("p")).unwrap();
        tree.add_leaf(p, showdown(1.0), Branch::action().named("p")).unwrap();
        let pb = tree.add_node(p, 0, Some(kuhn_label(0, c0, "pb")), Branch::action().named("b")).unwrap();
        tree.add_leaf(pb, vec![-1.0, 1.0], Branch::action().named("p")).unwrap();
        tree.add_leaf(pb, showdown(2.0), Branch::action().named("b")).unwrap();

        let b = tree.add_node(root, 1, Some(kuhn_label(1, c1, "b")), Branch::action().named("b")).unwrap();
        tree.add_leaf(b, vec![1.0, -1.0], Branch::action().named("p")).unwrap();
        tree.add_leaf(b, showdown(2.0), Branch::action().named("b")).unwrap();
    }
    SolverTree::build(tree).unwrap()
}

/// Player 1 guesses player 0's coin without seeing it.
pub fn matching_pennies() -> SolverTree {
    let mut tree = GameTree::new(2, 0);
    for side in 0..2 {
        let n = tree.add_node(0, 1, Some(1), Branch::action()).unwrap();
        for guess in 0..2 {
            let u = if side == guess { 1.0 } else { -1.0 };
            tree.add_leaf(n, vec![u, -u], Branch::action()).unwrap();
        }
    }
    SolverTree::build(tree).unwrap()
}

/// Both players want to meet but prefer different places.
pub fn coordination() -> SolverTree {
    let mut tree = GameTree::new(2, 0);
    for place in 0..2 {
        let n = tree.add_node(0, 1, Some(1), Branch::action()).unwrap();
        for other in 0..2 {
            let u = match (place, other) {
                (0, 0) => vec![2.0, 1.0],
                (1, 1) => vec![1.0, 2.0],
                _ => vec![0.0, 0.0],
            };
            tree.add_leaf(n, u, Branch::action()).unwrap();
        }
    }
    SolverTree::build(tree).unwrap()
}
