//! The joint dynamic program over pairs of model states.
//!
//! A cell `(k1, k2)` holds the co-optimal witnesses of all joint parses
//! that start in state `k1` of the first model and state `k2` of the
//! second. Transitions target strictly greater state IDs (inserts may hold
//! their own index, never both sides at once), so filling in order of
//! decreasing `(k1, k2)` only ever reads cells that are already complete.
//!
//! Every state's transition list is extended with a sentinel jump to the
//! model's sink end state, scored by the state's local end entry; absent
//! entries carry the finite [`BitScore::ABSENT`] penalty, so the selector
//! discards them whenever any genuine parse exists.

use cmlink_core::{BitScore, Result};
use cmlink_model::{Cm, StateId, StateType};

use crate::algebra::{Algebra, Value};

/// Filled joint tables for one comparison.
pub struct JointTable {
    n2: usize,
    /// Co-optima per state pair.
    cells: Vec<Vec<(Value, Value)>>,
    /// The same cells wrapped through the local-begin rule.
    local: Vec<Vec<(Value, Value)>>,
}

impl JointTable {
    /// Co-optima of the cell `(k1, k2)`.
    pub fn arr(&self, k1: StateId, k2: StateId) -> &[(Value, Value)] {
        &self.cells[k1 * self.n2 + k2]
    }

    /// Local-begin-wrapped co-optima of the cell `(k1, k2)`.
    pub fn local(&self, k1: StateId, k2: StateId) -> &[(Value, Value)] {
        &self.local[k1 * self.n2 + k2]
    }

    /// The final answer: the wrapped cell at the two roots.
    pub fn root(&self) -> &[(Value, Value)] {
        self.local(0, 0)
    }
}

/// Run the joint dynamic program for two models under an algebra.
///
/// # Errors
///
/// Fails with [`cmlink_core::CmLinkError::Internal`] if a table cell ever
/// holds a witness of the wrong shape for the algebra.
pub fn joint_optima(
    m1: &Cm,
    m2: &Cm,
    algebra: &Algebra,
    fast_insertions: bool,
) -> Result<JointTable> {
    let mut filler = Filler {
        m1,
        m2,
        algebra,
        fast_insertions,
        n2: m2.num_states(),
        cells: vec![Vec::new(); m1.num_states() * m2.num_states()],
    };
    log::debug!(
        "joint table {} x {} states ({} vs {})",
        m1.num_states(),
        m2.num_states(),
        m1.name(),
        m2.name()
    );
    filler.fill()?;

    let local = filler.wrap_local_begins()?;
    Ok(JointTable {
        n2: m2.num_states(),
        cells: filler.cells,
        local,
    })
}

/// A state's transitions plus the sentinel local-end jump to the sink.
fn departures(cm: &Cm, k: StateId) -> Vec<(StateId, BitScore)> {
    let state = cm.state(k);
    let mut out = Vec::with_capacity(state.transitions.len() + 1);
    out.extend_from_slice(&state.transitions);
    out.push((cm.sink(), cm.local_end(k)));
    out
}

struct Filler<'a> {
    m1: &'a Cm,
    m2: &'a Cm,
    algebra: &'a Algebra,
    fast_insertions: bool,
    n2: usize,
    cells: Vec<Vec<(Value, Value)>>,
}

impl Filler<'_> {
    fn arr(&self, k1: StateId, k2: StateId) -> &[(Value, Value)] {
        &self.cells[k1 * self.n2 + k2]
    }

    fn fill(&mut self) -> Result<()> {
        for k1 in (0..self.m1.num_states()).rev() {
            for k2 in (0..self.m2.num_states()).rev() {
                let candidates = self.candidates(k1, k2)?;
                self.cells[k1 * self.n2 + k2] = self.algebra.opt(candidates)?;
            }
        }
        Ok(())
    }

    fn wrap_local_begins(&self) -> Result<Vec<Vec<(Value, Value)>>> {
        let alg = self.algebra;
        let mut local = vec![Vec::new(); self.cells.len()];
        for k1 in 0..self.m1.num_states() {
            let lb1 = self.m1.local_begin(k1);
            for k2 in 0..self.m2.num_states() {
                let lb2 = self.m2.local_begin(k2);
                let cell = self.arr(k1, k2);
                let mut wrapped = Vec::with_capacity(cell.len());
                for (v1, v2) in cell {
                    wrapped.push((
                        alg.local_begin(self.m1, k1, lb1, v1)?,
                        alg.local_begin(self.m2, k2, lb2, v2)?,
                    ));
                }
                local[k1 * self.n2 + k2] = alg.opt(wrapped)?;
            }
        }
        Ok(local)
    }

    /// All joint continuations of the state pair, by case analysis on the
    /// two state types.
    fn candidates(&self, k1: StateId, k2: StateId) -> Result<Vec<(Value, Value)>> {
        use StateType::*;

        let alg = self.algebra;
        let (m1, m2) = (self.m1, self.m2);
        let s1 = m1.state(k1);
        let s2 = m2.state(k2);
        let mut out = Vec::new();

        match (s1.ty, s2.ty) {
            (E, E) => out.push((alg.end(m1, k1), alg.end(m2, k2))),

            (S, S) => {
                for &(c1, t1) in &departures(m1, k1) {
                    for &(c2, t2) in &departures(m2, k2) {
                        for (v1, v2) in self.arr(c1, c2) {
                            out.push((
                                alg.start(m1, k1, t1, v1)?,
                                alg.start(m2, k2, t2, v2)?,
                            ));
                        }
                    }
                }
            }

            (D, D) => {
                for &(c1, t1) in &departures(m1, k1) {
                    for &(c2, t2) in &departures(m2, k2) {
                        for (v1, v2) in self.arr(c1, c2) {
                            out.push((
                                alg.delete(m1, k1, t1, v1)?,
                                alg.delete(m2, k2, t2, v2)?,
                            ));
                        }
                    }
                }
            }

            (MP, MP) => {
                let e1: Vec<_> = s1.pair_emissions().collect();
                let e2: Vec<_> = s2.pair_emissions().collect();
                for &(c1, t1) in &departures(m1, k1) {
                    for &(c2, t2) in &departures(m2, k2) {
                        for (v1, v2) in self.arr(c1, c2) {
                            for i in 0..e1.len() {
                                out.push((
                                    alg.match_pair(m1, k1, t1, e1[i], v1)?,
                                    alg.match_pair(m2, k2, t2, e2[i], v2)?,
                                ));
                            }
                        }
                    }
                }
            }

            (a, b) if a.emits_left() && b.emits_left() => {
                let e1: Vec<_> = s1.single_emissions().collect();
                let e2: Vec<_> = s2.single_emissions().collect();
                for &(c1, t1) in &departures(m1, k1) {
                    for &(c2, t2) in &departures(m2, k2) {
                        if self.insertion_forbidden(k1, c1, k2, c2) {
                            continue;
                        }
                        for (v1, v2) in self.arr(c1, c2) {
                            for i in 0..e1.len() {
                                let w1 = if a == ML {
                                    alg.match_left(m1, k1, t1, e1[i], v1)?
                                } else {
                                    alg.insert_left(m1, k1, t1, e1[i], v1)?
                                };
                                let w2 = if b == ML {
                                    alg.match_left(m2, k2, t2, e2[i], v2)?
                                } else {
                                    alg.insert_left(m2, k2, t2, e2[i], v2)?
                                };
                                out.push((w1, w2));
                            }
                        }
                    }
                }
            }

            (a, b) if a.emits_right() && b.emits_right() => {
                let e1: Vec<_> = s1.single_emissions().collect();
                let e2: Vec<_> = s2.single_emissions().collect();
                for &(c1, t1) in &departures(m1, k1) {
                    for &(c2, t2) in &departures(m2, k2) {
                        if self.insertion_forbidden(k1, c1, k2, c2) {
                            continue;
                        }
                        for (v1, v2) in self.arr(c1, c2) {
                            for i in 0..e1.len() {
                                let w1 = if a == MR {
                                    alg.match_right(m1, k1, t1, e1[i], v1)?
                                } else {
                                    alg.insert_right(m1, k1, t1, e1[i], v1)?
                                };
                                let w2 = if b == MR {
                                    alg.match_right(m2, k2, t2, e2[i], v2)?
                                } else {
                                    alg.insert_right(m2, k2, t2, e2[i], v2)?
                                };
                                out.push((w1, w2));
                            }
                        }
                    }
                }
            }

            // One model already ended: only the other side advances.
            (E, D) => {
                for &(c2, t2) in &departures(m2, k2) {
                    for (v1, v2) in self.arr(k1, c2) {
                        out.push((v1.clone(), alg.delete(m2, k2, t2, v2)?));
                    }
                }
            }
            (E, S) => {
                for &(c2, t2) in &departures(m2, k2) {
                    for (v1, v2) in self.arr(k1, c2) {
                        out.push((v1.clone(), alg.start(m2, k2, t2, v2)?));
                    }
                }
            }
            (D, E) => {
                for &(c1, t1) in &departures(m1, k1) {
                    for (v1, v2) in self.arr(c1, k2) {
                        out.push((alg.delete(m1, k1, t1, v1)?, v2.clone()));
                    }
                }
            }
            (S, E) => {
                for &(c1, t1) in &departures(m1, k1) {
                    for (v1, v2) in self.arr(c1, k2) {
                        out.push((alg.start(m1, k1, t1, v1)?, v2.clone()));
                    }
                }
            }

            (B, B) => {
                let (l1, _) = s1.transitions[0];
                let (r1, _) = s1.transitions[1];
                let (l2, _) = s2.transitions[0];
                let (r2, _) = s2.transitions[1];

                // Both bifurcations aligned subtree for subtree.
                for (a1, a2) in self.arr(l1, l2) {
                    for (b1, b2) in self.arr(r1, r2) {
                        out.push((
                            alg.branch(m1, k1, a1, b1)?,
                            alg.branch(m2, k2, a2, b2)?,
                        ));
                    }
                }
                // Crossed pairings: the unmatched subtree on each side
                // drops to a local end out of its start state.
                for (e1, e2) in self.arr(m1.sink(), m2.sink()) {
                    let gone_l1 = alg.delete(m1, l1, m1.local_end(l1), e1)?;
                    let gone_r2 = alg.delete(m2, r2, m2.local_end(r2), e2)?;
                    for (x1, x2) in self.arr(r1, l2) {
                        out.push((
                            alg.branch(m1, k1, &gone_l1, x1)?,
                            alg.branch(m2, k2, x2, &gone_r2)?,
                        ));
                    }

                    let gone_r1 = alg.delete(m1, r1, m1.local_end(r1), e1)?;
                    let gone_l2 = alg.delete(m2, l2, m2.local_end(l2), e2)?;
                    for (x1, x2) in self.arr(l1, r2) {
                        out.push((
                            alg.branch(m1, k1, x1, &gone_r1)?,
                            alg.branch(m2, k2, &gone_l2, x2)?,
                        ));
                    }
                }
            }

            // Bifurcation against anything else: choose one subtree, drop
            // the other to a local end; the partner state stays put.
            (B, _) => {
                let (l1, _) = s1.transitions[0];
                let (r1, _) = s1.transitions[1];
                let end1 = alg.end(m1, m1.sink());
                let gone_r1 = alg.delete(m1, r1, m1.local_end(r1), &end1)?;
                for (x1, x2) in self.arr(l1, k2) {
                    out.push((alg.branch(m1, k1, x1, &gone_r1)?, x2.clone()));
                }
                let gone_l1 = alg.delete(m1, l1, m1.local_end(l1), &end1)?;
                for (x1, x2) in self.arr(r1, k2) {
                    out.push((alg.branch(m1, k1, &gone_l1, x1)?, x2.clone()));
                }
            }
            (_, B) => {
                let (l2, _) = s2.transitions[0];
                let (r2, _) = s2.transitions[1];
                let end2 = alg.end(m2, m2.sink());
                let gone_r2 = alg.delete(m2, r2, m2.local_end(r2), &end2)?;
                for (x1, x2) in self.arr(k1, l2) {
                    out.push((x1.clone(), alg.branch(m2, k2, x2, &gone_r2)?));
                }
                let gone_l2 = alg.delete(m2, l2, m2.local_end(l2), &end2)?;
                for (x1, x2) in self.arr(k1, r2) {
                    out.push((x1.clone(), alg.branch(m2, k2, &gone_l2, x2)?));
                }
            }

            // A start state against a non-start: only the start advances.
            (S, _) => {
                for &(c1, t1) in &departures(m1, k1) {
                    for (v1, v2) in self.arr(c1, k2) {
                        out.push((alg.start(m1, k1, t1, v1)?, v2.clone()));
                    }
                }
            }
            (_, S) => {
                for &(c2, t2) in &departures(m2, k2) {
                    for (v1, v2) in self.arr(k1, c2) {
                        out.push((v1.clone(), alg.start(m2, k2, t2, v2)?));
                    }
                }
            }

            // No rule lets this pair of states continue together.
            _ => {}
        }
        Ok(out)
    }

    /// The insertion guard. A self-loop on both sides never shrinks the
    /// table index and is always forbidden; with `fast_insertions` any
    /// self-loop is cut.
    fn insertion_forbidden(&self, k1: StateId, c1: StateId, k2: StateId, c2: StateId) -> bool {
        let loop1 = c1 == k1;
        let loop2 = c2 == k2;
        (loop1 && loop2) || (self.fast_insertions && (loop1 || loop2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmlink_model::mocks;

    fn score_at(table: &JointTable, k1: StateId, k2: StateId) -> (BitScore, BitScore) {
        let cell = table.arr(k1, k2);
        assert_eq!(cell.len(), 1, "score algebra keeps a single co-optimum");
        (cell[0].0.score().unwrap(), cell[0].1.score().unwrap())
    }

    fn root_min(table: &JointTable) -> BitScore {
        let root = table.root();
        root[0]
            .0
            .score()
            .unwrap()
            .min(root[0].1.score().unwrap())
    }

    #[test]
    fn end_pair_is_the_base_case() {
        let m = mocks::single_pair();
        let table = joint_optima(&m, &m, &Algebra::MaxiMin, false).unwrap();
        let (s1, s2) = score_at(&table, 2, 2);
        assert_eq!(s1, BitScore::ZERO);
        assert_eq!(s2, BitScore::ZERO);
    }

    #[test]
    fn single_pair_self_comparison() {
        let m = mocks::single_pair();
        let table = joint_optima(&m, &m, &Algebra::MaxiMin, false).unwrap();
        // Best joint pair emission is A-U at 2.0 on both sides; transitions
        // and the root begin are free in the mock.
        let root = table.root();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].0.score().unwrap(), BitScore(2.0));
        assert_eq!(root[0].1.score().unwrap(), BitScore(2.0));
    }

    #[test]
    fn pair_cell_prefers_the_joint_best_emission() {
        // Model 1 prefers C-G, model 2 prefers A-U; the best min is forced
        // onto a compromise entry.
        let m1 = mocks::single_pair_with(mocks::pair_scores(&[(6, 3.0)], -1.0));
        let m2 = mocks::single_pair_with(mocks::pair_scores(&[(3, 3.0)], -1.0));
        let table = joint_optima(&m1, &m2, &Algebra::MaxiMin, false).unwrap();
        let (s1, s2) = score_at(&table, 1, 1);
        assert_eq!(s1.min(s2), BitScore(-1.0));
    }

    #[test]
    fn hairpin_self_comparison_accumulates_all_scores() {
        let m = mocks::hairpin();
        let table = joint_optima(&m, &m, &Algebra::MaxiMin, false).unwrap();
        let root = table.root();
        // -0.1 (S) - 0.2 + 2.0 (C-G) - 0.3 + 1.5 (A-U) + 1.0 (A) = 3.9
        assert!((root[0].0.score().unwrap().value() - 3.9).abs() < 1e-9);
        assert!((root[0].1.score().unwrap().value() - 3.9).abs() < 1e-9);
    }

    #[test]
    fn branched_self_comparison_uses_both_subtrees() {
        let m = mocks::branched();
        let table = joint_optima(&m, &m, &Algebra::MaxiMin, false).unwrap();
        let root = table.root();
        // Left subtree best pair 2.0, right subtree best single 1.0.
        assert!((root[0].0.score().unwrap().value() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn branch_against_linear_pays_for_the_dropped_subtree() {
        let m1 = mocks::branched();
        let m2 = mocks::hairpin();
        let table = joint_optima(&m1, &m2, &Algebra::MaxiMin, false).unwrap();
        let root = table.root();
        assert_eq!(root.len(), 1);
        // Without local ends the dropped subtree costs the absent sentinel.
        let min = root_min(&table);
        assert!(min.value() < -5000.0);
        assert!(min.is_attainable());
    }

    #[test]
    fn local_end_shortcut_wins_when_generous() {
        let mut m = mocks::hairpin();
        m.set_local_end(1, BitScore(5.0));
        let table = joint_optima(&m, &m, &Algebra::MaxiMin, false).unwrap();
        let root = table.root();
        // -0.1 (S) + 5.0 (local end out of MP 1) + 2.0 (C-G) = 6.9,
        // beating the full parse at 3.9.
        assert!((root[0].0.score().unwrap().value() - 6.9).abs() < 1e-9);
    }

    #[test]
    fn local_end_shortcut_ignored_when_stingy() {
        let mut m = mocks::hairpin();
        m.set_local_end(1, BitScore(0.5));
        let table = joint_optima(&m, &m, &Algebra::MaxiMin, false).unwrap();
        let root = table.root();
        assert!((root[0].0.score().unwrap().value() - 3.9).abs() < 1e-9);
    }

    #[test]
    fn self_loops_terminate_and_fast_insertions_restrict() {
        let m = mocks::self_loop();
        let relaxed = joint_optima(&m, &m, &Algebra::MaxiMin, false).unwrap();
        let fast = joint_optima(&m, &m, &Algebra::MaxiMin, true).unwrap();
        assert!(root_min(&fast).value() <= root_min(&relaxed).value());
    }

    #[test]
    fn mismatched_state_types_have_no_joint_parse() {
        let m1 = mocks::single_pair();
        let m2 = mocks::self_loop();
        let table = joint_optima(&m1, &m2, &Algebra::MaxiMin, false).unwrap();
        // MP against IL cannot continue together.
        assert!(table.arr(1, 1).is_empty());
    }

    #[test]
    fn start_advances_alone_against_other_states() {
        let m1 = mocks::single_pair();
        let m2 = mocks::hairpin();
        let table = joint_optima(&m1, &m2, &Algebra::MaxiMin, false).unwrap();
        // (S, MP): the start side steps to its MP while the partner waits,
        // so the cell is populated rather than empty.
        assert!(!table.arr(0, 1).is_empty());
    }

    #[test]
    fn witness_algebra_alone_enumerates_parses() {
        let m = mocks::single_pair();
        let table = joint_optima(&m, &m, &Algebra::RnaString, false).unwrap();
        let root = table.root();
        // All sixteen joint emissions survive (plus sentinel routes), and
        // both components of each witness spell the same sequence.
        assert!(root.len() >= 16);
        for (v1, v2) in root {
            assert_eq!(v1.text().unwrap(), v2.text().unwrap());
        }
    }

    #[test]
    fn product_attaches_witnesses_to_the_best_score() {
        let m = mocks::single_pair();
        let alg = Algebra::product(Algebra::MaxiMin, Algebra::RnaString);
        let table = joint_optima(&m, &m, &alg, false).unwrap();
        let root = table.root();
        let (score, text) = root[0].0.components().unwrap();
        assert_eq!(score.score().unwrap(), BitScore(2.0));
        assert_eq!(text.text().unwrap(), "AU");
    }
}
