//! Small hand-built models used across the test suites.
//!
//! All mocks come back configured for global alignment (free begin at the
//! root, no internal begins or ends); tests that exercise local behaviour
//! override entries with [`Cm::set_local_begin`]/[`Cm::set_local_end`].

use cmlink_core::BitScore;

use crate::model::{Cm, NodeKind};
use crate::state::{Emission, State, StateType};

/// Pair emission vector with `default` everywhere except the given entries.
///
/// Indices follow the canonical AA..UU order: AU = 3, CG = 6, GC = 9, UA = 12.
pub fn pair_scores(entries: &[(usize, f64)], default: f64) -> [BitScore; 16] {
    let mut v = [BitScore(default); 16];
    for &(i, s) in entries {
        v[i] = BitScore(s);
    }
    v
}

/// Single emission vector (A, C, G, U order) with overrides.
pub fn single_scores(entries: &[(usize, f64)], default: f64) -> [BitScore; 4] {
    let mut v = [BitScore(default); 4];
    for &(i, s) in entries {
        v[i] = BitScore(s);
    }
    v
}

/// The smallest interesting model: one base pair.
///
/// `S(0) -> MP(1) -> E(2)`, zero-score transitions; the pair emission
/// favours A-U (2.0) over C-G/G-C (1.5) and U-A (1.0), everything else -1.0.
pub fn single_pair() -> Cm {
    single_pair_with(pair_scores(&[(3, 2.0), (6, 1.5), (9, 1.5), (12, 1.0)], -1.0))
}

/// Like [`single_pair`] but with caller-chosen pair emission scores.
pub fn single_pair_with(emissions: [BitScore; 16]) -> Cm {
    let states = vec![
        State::new(0, StateType::S, 0, vec![(1, BitScore::ZERO)], Emission::None),
        State::new(
            1,
            StateType::MP,
            1,
            vec![(2, BitScore::ZERO)],
            Emission::Pair(emissions),
        ),
        State::new(2, StateType::E, 2, vec![], Emission::None),
    ];
    let kinds = vec![NodeKind::Root, NodeKind::MatP, NodeKind::End];
    let mut cm = Cm::new("single-pair", states, kinds).expect("mock must validate");
    cm.configure_global();
    cm
}

/// A short stem-loop: two stacked pairs closing a single left emission.
///
/// `S(0) -> MP(1) -> MP(2) -> ML(3) -> E(4)`.
pub fn hairpin() -> Cm {
    hairpin_with(
        pair_scores(&[(6, 2.0), (9, 1.0)], -2.0),
        pair_scores(&[(3, 1.5), (12, 1.5)], -2.0),
        single_scores(&[(0, 1.0)], -0.5),
    )
}

/// Like [`hairpin`] but with caller-chosen emission scores.
pub fn hairpin_with(mp1: [BitScore; 16], mp2: [BitScore; 16], ml: [BitScore; 4]) -> Cm {
    let states = vec![
        State::new(0, StateType::S, 0, vec![(1, BitScore(-0.1))], Emission::None),
        State::new(
            1,
            StateType::MP,
            1,
            vec![(2, BitScore(-0.2))],
            Emission::Pair(mp1),
        ),
        State::new(
            2,
            StateType::MP,
            2,
            vec![(3, BitScore(-0.3))],
            Emission::Pair(mp2),
        ),
        State::new(
            3,
            StateType::ML,
            3,
            vec![(4, BitScore::ZERO)],
            Emission::Single(ml),
        ),
        State::new(4, StateType::E, 4, vec![], Emission::None),
    ];
    let kinds = vec![
        NodeKind::Root,
        NodeKind::MatP,
        NodeKind::MatP,
        NodeKind::MatL,
        NodeKind::End,
    ];
    let mut cm = Cm::new("hairpin", states, kinds).expect("mock must validate");
    cm.configure_global();
    cm
}

/// A bifurcated model: a paired stem on the left, a single emission on
/// the right.
///
/// `S(0) -> B(1)`, left `S(2) -> MP(3) -> E(4)`, right `S(5) -> ML(6) -> E(7)`.
pub fn branched() -> Cm {
    let states = vec![
        State::new(0, StateType::S, 0, vec![(1, BitScore::ZERO)], Emission::None),
        State::new(
            1,
            StateType::B,
            1,
            vec![(2, BitScore::ZERO), (5, BitScore::ZERO)],
            Emission::None,
        ),
        State::new(2, StateType::S, 2, vec![(3, BitScore::ZERO)], Emission::None),
        State::new(
            3,
            StateType::MP,
            3,
            vec![(4, BitScore::ZERO)],
            Emission::Pair(pair_scores(&[(3, 2.0), (6, 1.5)], -1.0)),
        ),
        State::new(4, StateType::E, 4, vec![], Emission::None),
        State::new(5, StateType::S, 5, vec![(6, BitScore::ZERO)], Emission::None),
        State::new(
            6,
            StateType::ML,
            6,
            vec![(7, BitScore::ZERO)],
            Emission::Single(single_scores(&[(2, 1.0)], -0.5)),
        ),
        State::new(7, StateType::E, 7, vec![], Emission::None),
    ];
    let kinds = vec![
        NodeKind::Root,
        NodeKind::Bif,
        NodeKind::BegL,
        NodeKind::MatP,
        NodeKind::End,
        NodeKind::BegR,
        NodeKind::MatL,
        NodeKind::End,
    ];
    let mut cm = Cm::new("branched", states, kinds).expect("mock must validate");
    cm.configure_global();
    cm
}

/// A model with an insert self-loop.
///
/// `S(0) -> IL(1)` where `IL(1)` loops onto itself and continues to
/// `ML(2) -> E(3)`.
pub fn self_loop() -> Cm {
    let states = vec![
        State::new(0, StateType::S, 0, vec![(1, BitScore(-0.1))], Emission::None),
        State::new(
            1,
            StateType::IL,
            0,
            vec![(1, BitScore(-0.5)), (2, BitScore(-0.2))],
            Emission::Single(single_scores(&[], 0.5)),
        ),
        State::new(
            2,
            StateType::ML,
            1,
            vec![(3, BitScore::ZERO)],
            Emission::Single(single_scores(&[(0, 1.0)], -1.0)),
        ),
        State::new(3, StateType::E, 2, vec![], Emission::None),
    ];
    let kinds = vec![NodeKind::Root, NodeKind::MatL, NodeKind::End];
    let mut cm = Cm::new("self-loop", states, kinds).expect("mock must validate");
    cm.configure_global();
    cm
}
