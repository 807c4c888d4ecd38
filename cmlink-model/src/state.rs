//! States of a covariance model.

use std::fmt;

use cmlink_core::alphabet::{self, PAIR_EMISSIONS, SINGLE_EMISSIONS};
use cmlink_core::{BitScore, CmLinkError, Result};

/// Dense identifier of a state. State 0 is always the root.
pub type StateId = usize;

/// Dense identifier of the node a state belongs to.
pub type NodeId = usize;

/// The grammar role of a state.
///
/// `EL` never appears in a stored model; local ends are modelled by a
/// sentinel transition into the final `E` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StateType {
    /// Start state
    S,
    /// Delete state (silent)
    D,
    /// Pair-emitting match state
    MP,
    /// Left-emitting match state
    ML,
    /// Left-emitting insert state
    IL,
    /// Right-emitting match state
    MR,
    /// Right-emitting insert state
    IR,
    /// Bifurcation state
    B,
    /// End state (silent)
    E,
    /// Local end state (implicit)
    EL,
}

impl StateType {
    /// Parse the two-letter state code used in `.cm` files.
    pub fn parse(token: &str) -> Result<StateType> {
        match token {
            "S" => Ok(StateType::S),
            "D" => Ok(StateType::D),
            "MP" => Ok(StateType::MP),
            "ML" => Ok(StateType::ML),
            "IL" => Ok(StateType::IL),
            "MR" => Ok(StateType::MR),
            "IR" => Ok(StateType::IR),
            "B" => Ok(StateType::B),
            "E" => Ok(StateType::E),
            "EL" => Ok(StateType::EL),
            other => Err(CmLinkError::Parse(format!(
                "unknown state type '{}'",
                other
            ))),
        }
    }

    /// Whether the state emits a nucleotide to the left (ML or IL).
    pub fn emits_left(self) -> bool {
        matches!(self, StateType::ML | StateType::IL)
    }

    /// Whether the state emits a nucleotide to the right (MR or IR).
    pub fn emits_right(self) -> bool {
        matches!(self, StateType::MR | StateType::IR)
    }

    /// Whether the state is an insert state and may carry a self-loop.
    pub fn is_insert(self) -> bool {
        matches!(self, StateType::IL | StateType::IR)
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateType::S => "S",
            StateType::D => "D",
            StateType::MP => "MP",
            StateType::ML => "ML",
            StateType::IL => "IL",
            StateType::MR => "MR",
            StateType::IR => "IR",
            StateType::B => "B",
            StateType::E => "E",
            StateType::EL => "EL",
        };
        write!(f, "{}", s)
    }
}

/// Emission scores attached to a state.
///
/// Pair vectors are ordered AA, AC, ..., UU; single vectors A, C, G, U.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Emission {
    /// Silent state: no emission.
    None,
    /// One nucleotide, left or right of the enclosed subsequence.
    Single([BitScore; SINGLE_EMISSIONS]),
    /// A base pair enclosing the subsequence.
    Pair([BitScore; PAIR_EMISSIONS]),
}

/// A single CM state: type, owning node, outgoing transitions, emissions.
///
/// Transitions target strictly greater state IDs, except that insert
/// states may loop onto themselves.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct State {
    pub id: StateId,
    pub ty: StateType,
    pub node: NodeId,
    /// Ordered `(child, score)` transitions. For a `B` state exactly two,
    /// ordered (left, right).
    pub transitions: Vec<(StateId, BitScore)>,
    pub emission: Emission,
}

impl State {
    pub fn new(
        id: StateId,
        ty: StateType,
        node: NodeId,
        transitions: Vec<(StateId, BitScore)>,
        emission: Emission,
    ) -> State {
        State {
            id,
            ty,
            node,
            transitions,
            emission,
        }
    }

    /// Single emissions as `(nucleotide, score)` in canonical order.
    ///
    /// Empty for states without a single emission vector.
    pub fn single_emissions(&self) -> impl Iterator<Item = (char, BitScore)> + '_ {
        let scores: &[BitScore] = match &self.emission {
            Emission::Single(v) => v,
            _ => &[],
        };
        scores
            .iter()
            .enumerate()
            .map(|(i, &s)| (alphabet::nucleotide(i), s))
    }

    /// Pair emissions as `(left, right, score)` in canonical order.
    ///
    /// Empty for states without a pair emission vector.
    pub fn pair_emissions(&self) -> impl Iterator<Item = (char, char, BitScore)> + '_ {
        let scores: &[BitScore] = match &self.emission {
            Emission::Pair(v) => v,
            _ => &[],
        };
        scores.iter().enumerate().map(|(i, &s)| {
            let (l, r) = alphabet::pair(i);
            (l, r, s)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_type_parse_roundtrip() {
        for token in ["S", "D", "MP", "ML", "IL", "MR", "IR", "B", "E", "EL"] {
            let ty = StateType::parse(token).unwrap();
            assert_eq!(ty.to_string(), token);
        }
        assert!(StateType::parse("XX").is_err());
    }

    #[test]
    fn emitter_families() {
        assert!(StateType::ML.emits_left());
        assert!(StateType::IL.emits_left());
        assert!(!StateType::MR.emits_left());
        assert!(StateType::MR.emits_right());
        assert!(StateType::IR.emits_right());
        assert!(StateType::IL.is_insert());
        assert!(!StateType::ML.is_insert());
    }

    #[test]
    fn single_emission_iteration() {
        let s = State::new(
            1,
            StateType::ML,
            1,
            vec![(2, BitScore::ZERO)],
            Emission::Single([
                BitScore(1.0),
                BitScore(-1.0),
                BitScore(-1.0),
                BitScore(-1.0),
            ]),
        );
        let ems: Vec<_> = s.single_emissions().collect();
        assert_eq!(ems.len(), 4);
        assert_eq!(ems[0], ('A', BitScore(1.0)));
        assert_eq!(ems[3], ('U', BitScore(-1.0)));
    }

    #[test]
    fn pair_emission_iteration() {
        let mut scores = [BitScore(-1.0); 16];
        scores[3] = BitScore(2.0); // A-U
        let s = State::new(
            1,
            StateType::MP,
            1,
            vec![(2, BitScore::ZERO)],
            Emission::Pair(scores),
        );
        let ems: Vec<_> = s.pair_emissions().collect();
        assert_eq!(ems.len(), 16);
        assert_eq!(ems[3], ('A', 'U', BitScore(2.0)));
    }

    #[test]
    fn silent_state_has_no_emissions() {
        let s = State::new(0, StateType::S, 0, vec![(1, BitScore::ZERO)], Emission::None);
        assert_eq!(s.single_emissions().count(), 0);
        assert_eq!(s.pair_emissions().count(), 0);
    }
}
