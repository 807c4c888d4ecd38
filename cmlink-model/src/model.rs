//! The validated in-memory covariance model.

use std::collections::HashMap;
use std::fmt;

use cmlink_core::{BitScore, CmLinkError, Result};

use crate::state::{Emission, NodeId, State, StateId, StateType};

/// The kind of a model node. Each state belongs to exactly one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeKind {
    Root,
    MatP,
    MatL,
    MatR,
    Bif,
    BegL,
    BegR,
    End,
}

impl NodeKind {
    /// Parse the node label used in `.cm` files.
    pub fn parse(token: &str) -> Result<NodeKind> {
        match token {
            "ROOT" => Ok(NodeKind::Root),
            "MATP" => Ok(NodeKind::MatP),
            "MATL" => Ok(NodeKind::MatL),
            "MATR" => Ok(NodeKind::MatR),
            "BIF" => Ok(NodeKind::Bif),
            "BEGL" => Ok(NodeKind::BegL),
            "BEGR" => Ok(NodeKind::BegR),
            "END" => Ok(NodeKind::End),
            other => Err(CmLinkError::Parse(format!("unknown node type '{}'", other))),
        }
    }
}

/// A covariance model: states keyed by dense IDs plus local begin/end maps.
///
/// State 0 is the root (type S); the state with the maximum ID is the sink
/// end state (type E). Missing local begin/end entries read as
/// [`BitScore::ABSENT`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cm {
    name: String,
    states: Vec<State>,
    node_kinds: Vec<NodeKind>,
    /// First state of each node, indexed by node ID.
    node_first: Vec<StateId>,
    local_begin: HashMap<StateId, BitScore>,
    local_end: HashMap<StateId, BitScore>,
}

impl Cm {
    /// Build and validate a model from its states and node kinds.
    ///
    /// States must arrive ordered by ID, densely from 0. Both local maps
    /// start empty; see [`Cm::configure_local`] and [`Cm::configure_global`].
    ///
    /// # Errors
    ///
    /// Returns [`CmLinkError::ModelShape`] if any structural invariant is
    /// violated.
    pub fn new(name: impl Into<String>, states: Vec<State>, node_kinds: Vec<NodeKind>) -> Result<Cm> {
        let mut node_first = vec![StateId::MAX; node_kinds.len()];
        for state in &states {
            if state.node >= node_kinds.len() {
                return Err(CmLinkError::ModelShape(format!(
                    "state {} references node {} but only {} nodes exist",
                    state.id,
                    state.node,
                    node_kinds.len()
                )));
            }
            if node_first[state.node] == StateId::MAX {
                node_first[state.node] = state.id;
            }
        }
        let cm = Cm {
            name: name.into(),
            states,
            node_kinds,
            node_first,
            local_begin: HashMap::new(),
            local_end: HashMap::new(),
        };
        cm.validate()?;
        Ok(cm)
    }

    /// Model name as reported in output lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of states.
    pub fn num_states(&self) -> usize {
        self.states.len()
    }

    /// The state with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range; IDs handed around internally are
    /// validated at construction.
    pub fn state(&self, id: StateId) -> &State {
        &self.states[id]
    }

    /// All states in ID order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// The sink end state: always the maximum ID.
    pub fn sink(&self) -> StateId {
        self.states.len() - 1
    }

    /// Kind of the given node.
    pub fn node_kind(&self, node: NodeId) -> NodeKind {
        self.node_kinds[node]
    }

    /// Local begin score into `id`, or [`BitScore::ABSENT`] if unset.
    pub fn local_begin(&self, id: StateId) -> BitScore {
        self.local_begin.get(&id).copied().unwrap_or(BitScore::ABSENT)
    }

    /// Local end score out of `id`, or [`BitScore::ABSENT`] if unset.
    pub fn local_end(&self, id: StateId) -> BitScore {
        self.local_end.get(&id).copied().unwrap_or(BitScore::ABSENT)
    }

    /// Set one local begin entry.
    pub fn set_local_begin(&mut self, id: StateId, score: BitScore) {
        self.local_begin.insert(id, score);
    }

    /// Set one local end entry.
    pub fn set_local_end(&mut self, id: StateId, score: BitScore) {
        self.local_end.insert(id, score);
    }

    /// Configure local begins and ends the way Infernal's local mode does.
    ///
    /// Probability mass `p_begin` is spread uniformly over the first state
    /// of every MATP/MATL/MATR/BIF node past the root; the root keeps
    /// `log2(1 - p_begin)`. Mass `p_end` is spread over the first state of
    /// every MATP/MATL/MATR/BEGL/BEGR node not directly followed by an END
    /// node.
    ///
    /// # Errors
    ///
    /// Returns an error unless both probabilities lie in `(0, 1)`.
    pub fn configure_local(&mut self, p_begin: f64, p_end: f64) -> Result<()> {
        if !(0.0..1.0).contains(&p_begin) || p_begin == 0.0 {
            return Err(CmLinkError::InvalidInput(
                "local begin probability must be in (0, 1)".into(),
            ));
        }
        if !(0.0..1.0).contains(&p_end) || p_end == 0.0 {
            return Err(CmLinkError::InvalidInput(
                "local end probability must be in (0, 1)".into(),
            ));
        }

        self.local_begin.clear();
        self.local_end.clear();

        let begin_targets: Vec<StateId> = (1..self.node_kinds.len())
            .filter(|&nd| {
                matches!(
                    self.node_kinds[nd],
                    NodeKind::MatP | NodeKind::MatL | NodeKind::MatR | NodeKind::Bif
                )
            })
            .map(|nd| self.node_first[nd])
            .collect();
        if !begin_targets.is_empty() {
            let each = BitScore((p_begin / begin_targets.len() as f64).log2());
            for id in begin_targets {
                self.local_begin.insert(id, each);
            }
        }
        self.local_begin.insert(0, BitScore((1.0 - p_begin).log2()));

        let end_sources: Vec<StateId> = (0..self.node_kinds.len())
            .filter(|&nd| {
                let eligible = matches!(
                    self.node_kinds[nd],
                    NodeKind::MatP
                        | NodeKind::MatL
                        | NodeKind::MatR
                        | NodeKind::BegL
                        | NodeKind::BegR
                );
                eligible && self.node_kinds.get(nd + 1) != Some(&NodeKind::End)
            })
            .map(|nd| self.node_first[nd])
            .collect();
        if !end_sources.is_empty() {
            let each = BitScore((p_end / end_sources.len() as f64).log2());
            for id in end_sources {
                self.local_end.insert(id, each);
            }
        }

        log::debug!(
            "{}: configured {} local begins, {} local ends",
            self.name,
            self.local_begin.len(),
            self.local_end.len()
        );
        Ok(())
    }

    /// Configure for global alignment: begin at the root for free, no
    /// internal begins or ends.
    pub fn configure_global(&mut self) {
        self.local_begin.clear();
        self.local_end.clear();
        self.local_begin.insert(0, BitScore::ZERO);
    }

    fn validate(&self) -> Result<()> {
        if self.states.is_empty() {
            return Err(CmLinkError::ModelShape("model has no states".into()));
        }
        for (i, state) in self.states.iter().enumerate() {
            if state.id != i {
                return Err(CmLinkError::ModelShape(format!(
                    "state IDs are not dense: expected {} found {}",
                    i, state.id
                )));
            }
        }

        for (nd, first) in self.node_first.iter().enumerate() {
            if *first == StateId::MAX {
                return Err(CmLinkError::ModelShape(format!(
                    "node {} has no states",
                    nd
                )));
            }
        }

        let root = &self.states[0];
        if root.ty != StateType::S {
            return Err(CmLinkError::ModelShape(format!(
                "root state must have type S, found {}",
                root.ty
            )));
        }
        let sink = &self.states[self.sink()];
        if sink.ty != StateType::E {
            return Err(CmLinkError::ModelShape(format!(
                "state at maximum ID must have type E, found {}",
                sink.ty
            )));
        }

        for state in &self.states {
            match state.ty {
                StateType::E | StateType::EL => {
                    if !state.transitions.is_empty() {
                        return Err(CmLinkError::ModelShape(format!(
                            "end state {} must not have transitions",
                            state.id
                        )));
                    }
                }
                StateType::B => {
                    if state.transitions.len() != 2 {
                        return Err(CmLinkError::ModelShape(format!(
                            "bifurcation state {} must have exactly two children, found {}",
                            state.id,
                            state.transitions.len()
                        )));
                    }
                    for &(child, _) in &state.transitions {
                        self.check_child(state, child)?;
                    }
                }
                _ => {
                    if state.transitions.is_empty() {
                        return Err(CmLinkError::ModelShape(format!(
                            "state {} ({}) has no transitions",
                            state.id, state.ty
                        )));
                    }
                    for &(child, _) in &state.transitions {
                        self.check_child(state, child)?;
                    }
                }
            }

            let emission_ok = match (&state.emission, state.ty) {
                (Emission::Pair(_), StateType::MP) => true,
                (Emission::Single(_), ty) if ty.emits_left() || ty.emits_right() => true,
                (Emission::None, ty) => !matches!(
                    ty,
                    StateType::MP | StateType::ML | StateType::IL | StateType::MR | StateType::IR
                ),
                _ => false,
            };
            if !emission_ok {
                return Err(CmLinkError::ModelShape(format!(
                    "state {} ({}) carries the wrong emission vector",
                    state.id, state.ty
                )));
            }
        }
        Ok(())
    }

    fn check_child(&self, state: &State, child: StateId) -> Result<()> {
        if child >= self.states.len() {
            return Err(CmLinkError::ModelShape(format!(
                "state {} points at nonexistent state {}",
                state.id, child
            )));
        }
        let self_loop_ok = state.ty.is_insert() && child == state.id;
        if child <= state.id && !self_loop_ok {
            return Err(CmLinkError::ModelShape(format!(
                "state {} transition must target a greater ID, found {}",
                state.id, child
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Cm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} states, {} nodes)",
            self.name,
            self.states.len(),
            self.node_kinds.len()
        )
    }
}
