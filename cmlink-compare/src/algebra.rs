//! Evaluation algebras for the joint comparison grammar.
//!
//! An algebra assigns a meaning to every rule of the comparison grammar:
//! ends, local begins, silent steps, emissions, and bifurcations. The same
//! dynamic program then produces whatever the algebra computes:
//!
//! - [`Algebra::MaxiMin`] — the link score, maximising the smaller of the
//!   two models' bit scores
//! - [`Algebra::RnaString`] — the nucleotide sequence of the winning parse
//! - [`Algebra::DotBracket`] — its secondary structure
//! - [`Algebra::VisitedNodes`] — the model nodes along the parse
//! - [`Algebra::Extended`] — a per-state textual trace
//! - [`Algebra::Product`] — any pairing of the above, preserving co-optima
//!
//! Witness-only algebras cannot choose between candidates, so their
//! selector keeps everything; pairing them with `MaxiMin` restricts the
//! enumeration to score-optimal parses (see [`crate::product`]).
//!
//! Every rule that inspects a sub-witness checks its shape: a mismatch
//! between a value and the algebra that is asked to consume it surfaces as
//! [`CmLinkError::Internal`] and aborts the comparison.

use std::fmt;

use cmlink_core::{BitScore, CmLinkError, Result};
use cmlink_model::{Cm, NodeId, StateId};

use crate::product;

/// A pair emission: left nucleotide, right nucleotide, score.
pub type PairEmission = (char, char, BitScore);

/// A single emission: nucleotide, score.
pub type SingleEmission = (char, BitScore);

/// A witness computed by an algebra for one model of the pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Accumulated bit score.
    Score(BitScore),
    /// Nucleotide or bracket string.
    Text(String),
    /// Node IDs in traversal order.
    Nodes(Vec<NodeId>),
    /// Per-state trace lines.
    Table(Vec<String>),
    /// Product witness.
    Pair(Box<Value>, Box<Value>),
}

impl Value {
    pub fn pair(a: Value, b: Value) -> Value {
        Value::Pair(Box::new(a), Box::new(b))
    }

    /// The score inside a `Score` value.
    ///
    /// # Errors
    ///
    /// Returns [`CmLinkError::Internal`] on a shape mismatch; the joint
    /// table only ever holds values of the shape its algebra produces.
    pub fn score(&self) -> Result<BitScore> {
        match self {
            Value::Score(s) => Ok(*s),
            other => Err(shape_mismatch("score", other)),
        }
    }

    /// The string inside a `Text` value.
    ///
    /// # Errors
    ///
    /// Returns [`CmLinkError::Internal`] on a shape mismatch.
    pub fn text(&self) -> Result<&str> {
        match self {
            Value::Text(s) => Ok(s),
            other => Err(shape_mismatch("text", other)),
        }
    }

    /// The node list inside a `Nodes` value.
    ///
    /// # Errors
    ///
    /// Returns [`CmLinkError::Internal`] on a shape mismatch.
    pub fn node_list(&self) -> Result<&[NodeId]> {
        match self {
            Value::Nodes(v) => Ok(v),
            other => Err(shape_mismatch("node list", other)),
        }
    }

    /// The trace lines inside a `Table` value.
    ///
    /// # Errors
    ///
    /// Returns [`CmLinkError::Internal`] on a shape mismatch.
    pub fn table(&self) -> Result<&[String]> {
        match self {
            Value::Table(v) => Ok(v),
            other => Err(shape_mismatch("trace table", other)),
        }
    }

    /// Both components of a `Pair` value.
    ///
    /// # Errors
    ///
    /// Returns [`CmLinkError::Internal`] on a shape mismatch.
    pub fn components(&self) -> Result<(&Value, &Value)> {
        match self {
            Value::Pair(a, b) => Ok((a, b)),
            other => Err(shape_mismatch("product", other)),
        }
    }
}

fn shape_mismatch(expected: &str, found: &Value) -> CmLinkError {
    CmLinkError::Internal(format!("expected {} value, found {:?}", expected, found))
}

/// An evaluation algebra over the comparison grammar.
#[derive(Debug, Clone, PartialEq)]
pub enum Algebra {
    /// Link score: maximise the smaller of the two accumulated scores.
    MaxiMin,
    /// Nucleotide string of the parse.
    RnaString,
    /// Dot-bracket structure: `()` for pairs, `.` for matched singles,
    /// `,` for inserted singles.
    DotBracket,
    /// Model node IDs in traversal order.
    VisitedNodes,
    /// Per-state textual trace.
    Extended,
    /// Pairing of two algebras.
    Product(Box<Algebra>, Box<Algebra>),
}

impl Algebra {
    pub fn product(a: Algebra, b: Algebra) -> Algebra {
        Algebra::Product(Box::new(a), Box::new(b))
    }

    /// Value at an end state.
    pub fn end(&self, cm: &Cm, k: StateId) -> Value {
        match self {
            Algebra::MaxiMin => Value::Score(BitScore::ZERO),
            Algebra::RnaString | Algebra::DotBracket => Value::Text(String::new()),
            Algebra::VisitedNodes => Value::Nodes(vec![cm.state(k).node]),
            Algebra::Extended => Value::Table(vec![trace_line("End", cm, k, None, None)]),
            Algebra::Product(a, b) => Value::pair(a.end(cm, k), b.end(cm, k)),
        }
    }

    /// Apply a local begin with score `t` to a sub-parse rooted at `k`.
    pub fn local_begin(&self, cm: &Cm, k: StateId, t: BitScore, s: &Value) -> Result<Value> {
        Ok(match self {
            Algebra::MaxiMin => Value::Score(t + s.score()?),
            Algebra::RnaString | Algebra::DotBracket | Algebra::VisitedNodes => s.clone(),
            Algebra::Extended => Value::Table(prepend_line(
                trace_line("LBegin", cm, k, Some(t), None),
                s.table()?,
            )),
            Algebra::Product(a, b) => {
                let (x, y) = s.components()?;
                Value::pair(a.local_begin(cm, k, t, x)?, b.local_begin(cm, k, t, y)?)
            }
        })
    }

    /// Consume a start-state transition.
    pub fn start(&self, cm: &Cm, k: StateId, t: BitScore, s: &Value) -> Result<Value> {
        Ok(match self {
            Algebra::MaxiMin => Value::Score(t + s.score()?),
            Algebra::RnaString | Algebra::DotBracket => s.clone(),
            Algebra::VisitedNodes => Value::Nodes(prepend_node(cm.state(k).node, s.node_list()?)),
            Algebra::Extended => Value::Table(prepend_line(
                trace_line("Start", cm, k, Some(t), None),
                s.table()?,
            )),
            Algebra::Product(a, b) => {
                let (x, y) = s.components()?;
                Value::pair(a.start(cm, k, t, x)?, b.start(cm, k, t, y)?)
            }
        })
    }

    /// Consume a delete-state transition (or a local-end jump).
    pub fn delete(&self, cm: &Cm, k: StateId, t: BitScore, s: &Value) -> Result<Value> {
        Ok(match self {
            Algebra::MaxiMin => Value::Score(t + s.score()?),
            Algebra::RnaString | Algebra::DotBracket => s.clone(),
            Algebra::VisitedNodes => Value::Nodes(prepend_node(cm.state(k).node, s.node_list()?)),
            Algebra::Extended => Value::Table(prepend_line(
                trace_line("Delete", cm, k, Some(t), None),
                s.table()?,
            )),
            Algebra::Product(a, b) => {
                let (x, y) = s.components()?;
                Value::pair(a.delete(cm, k, t, x)?, b.delete(cm, k, t, y)?)
            }
        })
    }

    /// Consume a pair-emitting transition.
    pub fn match_pair(
        &self,
        cm: &Cm,
        k: StateId,
        t: BitScore,
        e: PairEmission,
        s: &Value,
    ) -> Result<Value> {
        let (left, right, score) = e;
        Ok(match self {
            Algebra::MaxiMin => Value::Score(t + score + s.score()?),
            Algebra::RnaString => Value::Text(format!("{}{}{}", left, s.text()?, right)),
            Algebra::DotBracket => Value::Text(format!("({})", s.text()?)),
            Algebra::VisitedNodes => Value::Nodes(prepend_node(cm.state(k).node, s.node_list()?)),
            Algebra::Extended => Value::Table(prepend_line(
                trace_line("MatchP", cm, k, Some(t), Some(score)),
                s.table()?,
            )),
            Algebra::Product(a, b) => {
                let (x, y) = s.components()?;
                Value::pair(a.match_pair(cm, k, t, e, x)?, b.match_pair(cm, k, t, e, y)?)
            }
        })
    }

    /// Consume a left match emission.
    pub fn match_left(
        &self,
        cm: &Cm,
        k: StateId,
        t: BitScore,
        e: SingleEmission,
        s: &Value,
    ) -> Result<Value> {
        self.emit_left("MatchL", '.', cm, k, t, e, s)
    }

    /// Consume a left insert emission.
    pub fn insert_left(
        &self,
        cm: &Cm,
        k: StateId,
        t: BitScore,
        e: SingleEmission,
        s: &Value,
    ) -> Result<Value> {
        self.emit_left("InsertL", ',', cm, k, t, e, s)
    }

    /// Consume a right match emission.
    pub fn match_right(
        &self,
        cm: &Cm,
        k: StateId,
        t: BitScore,
        e: SingleEmission,
        s: &Value,
    ) -> Result<Value> {
        self.emit_right("MatchR", '.', cm, k, t, e, s)
    }

    /// Consume a right insert emission.
    pub fn insert_right(
        &self,
        cm: &Cm,
        k: StateId,
        t: BitScore,
        e: SingleEmission,
        s: &Value,
    ) -> Result<Value> {
        self.emit_right("InsertR", ',', cm, k, t, e, s)
    }

    /// Combine the two subtree witnesses at a bifurcation.
    pub fn branch(&self, cm: &Cm, k: StateId, left: &Value, right: &Value) -> Result<Value> {
        Ok(match self {
            Algebra::MaxiMin => Value::Score(left.score()? + right.score()?),
            Algebra::RnaString | Algebra::DotBracket => {
                Value::Text(format!("{}{}", left.text()?, right.text()?))
            }
            Algebra::VisitedNodes => {
                let (l, r) = (left.node_list()?, right.node_list()?);
                let mut v = Vec::with_capacity(1 + l.len() + r.len());
                v.push(cm.state(k).node);
                v.extend_from_slice(l);
                v.extend_from_slice(r);
                Value::Nodes(v)
            }
            Algebra::Extended => {
                let (l, r) = (left.table()?, right.table()?);
                let mut v = Vec::with_capacity(1 + l.len() + r.len());
                v.push(trace_line("Branch", cm, k, None, None));
                v.extend_from_slice(l);
                v.extend_from_slice(r);
                Value::Table(v)
            }
            Algebra::Product(a, b) => {
                let (lx, ly) = left.components()?;
                let (rx, ry) = right.components()?;
                Value::pair(a.branch(cm, k, lx, rx)?, b.branch(cm, k, ly, ry)?)
            }
        })
    }

    /// Collapse a candidate list to its co-optima.
    ///
    /// `MaxiMin` keeps a single candidate maximising the smaller score,
    /// first-wins on ties. Witness-only algebras keep everything. Products
    /// select on the first component, then enumerate the second within the
    /// selection.
    pub fn opt(&self, xs: Vec<(Value, Value)>) -> Result<Vec<(Value, Value)>> {
        match self {
            Algebra::MaxiMin => {
                let mut best: Option<(BitScore, usize)> = None;
                for (i, (v1, v2)) in xs.iter().enumerate() {
                    let worse = v1.score()?.min(v2.score()?);
                    match best {
                        Some((b, _)) if worse.value() <= b.value() => {}
                        _ => best = Some((worse, i)),
                    }
                }
                Ok(match best {
                    Some((_, i)) => {
                        let mut xs = xs;
                        vec![xs.swap_remove(i)]
                    }
                    None => Vec::new(),
                })
            }
            Algebra::RnaString | Algebra::DotBracket | Algebra::VisitedNodes | Algebra::Extended => {
                Ok(xs)
            }
            Algebra::Product(a, b) => product::opt_product(a, b, xs),
        }
    }

    /// Render a witness for output.
    pub fn finalize(&self, v: &Value) -> Result<String> {
        Ok(match self {
            Algebra::MaxiMin => v.score()?.to_string(),
            Algebra::RnaString | Algebra::DotBracket => {
                let s = v.text()?;
                if s.is_empty() {
                    "_".to_string()
                } else {
                    s.to_string()
                }
            }
            Algebra::VisitedNodes => format_nodes(v.node_list()?),
            Algebra::Extended => v.table()?.join("\n"),
            Algebra::Product(a, b) => {
                let (x, y) = v.components()?;
                format!("{} {}", a.finalize(x)?, b.finalize(y)?)
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_left(
        &self,
        label: &str,
        mark: char,
        cm: &Cm,
        k: StateId,
        t: BitScore,
        e: SingleEmission,
        s: &Value,
    ) -> Result<Value> {
        let (nucleotide, score) = e;
        Ok(match self {
            Algebra::MaxiMin => Value::Score(t + score + s.score()?),
            Algebra::RnaString => Value::Text(format!("{}{}", nucleotide, s.text()?)),
            Algebra::DotBracket => Value::Text(format!("{}{}", mark, s.text()?)),
            Algebra::VisitedNodes => Value::Nodes(prepend_node(cm.state(k).node, s.node_list()?)),
            Algebra::Extended => Value::Table(prepend_line(
                trace_line(label, cm, k, Some(t), Some(score)),
                s.table()?,
            )),
            Algebra::Product(a, b) => {
                let (x, y) = s.components()?;
                Value::pair(
                    a.emit_left(label, mark, cm, k, t, e, x)?,
                    b.emit_left(label, mark, cm, k, t, e, y)?,
                )
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_right(
        &self,
        label: &str,
        mark: char,
        cm: &Cm,
        k: StateId,
        t: BitScore,
        e: SingleEmission,
        s: &Value,
    ) -> Result<Value> {
        let (nucleotide, score) = e;
        Ok(match self {
            Algebra::MaxiMin => Value::Score(t + score + s.score()?),
            Algebra::RnaString => Value::Text(format!("{}{}", s.text()?, nucleotide)),
            Algebra::DotBracket => Value::Text(format!("{}{}", s.text()?, mark)),
            Algebra::VisitedNodes => Value::Nodes(prepend_node(cm.state(k).node, s.node_list()?)),
            Algebra::Extended => Value::Table(prepend_line(
                trace_line(label, cm, k, Some(t), Some(score)),
                s.table()?,
            )),
            Algebra::Product(a, b) => {
                let (x, y) = s.components()?;
                Value::pair(
                    a.emit_right(label, mark, cm, k, t, e, x)?,
                    b.emit_right(label, mark, cm, k, t, e, y)?,
                )
            }
        })
    }
}

impl fmt::Display for Algebra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algebra::MaxiMin => write!(f, "score"),
            Algebra::RnaString => write!(f, "rna"),
            Algebra::DotBracket => write!(f, "bracket"),
            Algebra::VisitedNodes => write!(f, "nodes"),
            Algebra::Extended => write!(f, "extended"),
            Algebra::Product(a, b) => write!(f, "{}+{}", a, b),
        }
    }
}

/// Bracketed node list, e.g. `[0,1,4]`.
pub fn format_nodes(nodes: &[NodeId]) -> String {
    let inner: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
    format!("[{}]", inner.join(","))
}

/// Header matching the column layout of [`trace_line`].
pub fn trace_header() -> String {
    format!(
        "{:<8} {:>6} {:>4} {:>9} {:>9}",
        "Label", "State", "Node", "Trans", "Emis"
    )
}

fn trace_line(
    label: &str,
    cm: &Cm,
    k: StateId,
    trans: Option<BitScore>,
    emis: Option<BitScore>,
) -> String {
    let state = cm.state(k);
    let ty = state.ty.to_string();
    let trans = trans.map(|t| t.to_string()).unwrap_or_else(|| "-".into());
    let emis = emis.map(|e| e.to_string()).unwrap_or_else(|| "-".into());
    format!(
        "{:<8} {:>3}/{:<2} {:>4} {:>9} {:>9}",
        label, k, ty, state.node, trans, emis
    )
}

fn prepend_node(head: NodeId, rest: &[NodeId]) -> Vec<NodeId> {
    let mut v = Vec::with_capacity(rest.len() + 1);
    v.push(head);
    v.extend_from_slice(rest);
    v
}

fn prepend_line(head: String, rest: &[String]) -> Vec<String> {
    let mut v = Vec::with_capacity(rest.len() + 1);
    v.push(head);
    v.extend_from_slice(rest);
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmlink_model::mocks;

    #[test]
    fn maximin_accumulates_scores() {
        let cm = mocks::single_pair();
        let alg = Algebra::MaxiMin;
        let end = alg.end(&cm, 2);
        let paired = alg
            .match_pair(&cm, 1, BitScore(-0.5), ('A', 'U', BitScore(2.0)), &end)
            .unwrap();
        assert_eq!(paired.score().unwrap(), BitScore(1.5));
        let started = alg.start(&cm, 0, BitScore(-0.1), &paired).unwrap();
        assert_eq!(started.score().unwrap(), BitScore(1.4));
    }

    #[test]
    fn maximin_opt_keeps_single_best_min() {
        let alg = Algebra::MaxiMin;
        let xs = vec![
            (Value::Score(BitScore(3.0)), Value::Score(BitScore(-1.0))),
            (Value::Score(BitScore(1.0)), Value::Score(BitScore(2.0))),
            (Value::Score(BitScore(0.5)), Value::Score(BitScore(9.0))),
        ];
        let kept = alg.opt(xs).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0.score().unwrap(), BitScore(1.0));
        assert_eq!(kept[0].1.score().unwrap(), BitScore(2.0));
    }

    #[test]
    fn maximin_opt_tie_break_is_first_wins() {
        let alg = Algebra::MaxiMin;
        let xs = vec![
            (Value::Score(BitScore(1.0)), Value::Score(BitScore(5.0))),
            (Value::Score(BitScore(1.0)), Value::Score(BitScore(1.0))),
        ];
        let kept = alg.opt(xs).unwrap();
        assert_eq!(kept[0].1.score().unwrap(), BitScore(5.0));
    }

    #[test]
    fn maximin_opt_empty_stays_empty() {
        assert!(Algebra::MaxiMin.opt(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn shape_mismatch_is_an_internal_error() {
        let text = Value::Text("AU".into());
        let err = text.score().unwrap_err();
        assert!(matches!(err, CmLinkError::Internal(_)));
        assert!(err.to_string().contains("expected score"));

        let score = Value::Score(BitScore::ZERO);
        assert!(score.text().is_err());
        assert!(score.node_list().is_err());
        assert!(score.table().is_err());
        assert!(score.components().is_err());
    }

    #[test]
    fn mismatched_witness_fails_the_rule() {
        // Feeding a text witness to the score algebra must surface an
        // error, not a panic.
        let cm = mocks::single_pair();
        let alg = Algebra::MaxiMin;
        let wrong = Value::Text("AU".into());
        assert!(alg.start(&cm, 0, BitScore::ZERO, &wrong).is_err());
        assert!(alg
            .opt(vec![(wrong.clone(), wrong)])
            .is_err());
    }

    #[test]
    fn rna_string_wraps_pairs_and_prepends_singles() {
        let cm = mocks::hairpin();
        let alg = Algebra::RnaString;
        let end = alg.end(&cm, 4);
        let inner = alg
            .match_left(&cm, 3, BitScore::ZERO, ('A', BitScore(1.0)), &end)
            .unwrap();
        let paired = alg
            .match_pair(&cm, 2, BitScore::ZERO, ('C', 'G', BitScore(2.0)), &inner)
            .unwrap();
        assert_eq!(paired.text().unwrap(), "CAG");
    }

    #[test]
    fn dot_bracket_distinguishes_match_and_insert() {
        let cm = mocks::hairpin();
        let alg = Algebra::DotBracket;
        let end = alg.end(&cm, 4);
        let m = alg
            .match_left(&cm, 3, BitScore::ZERO, ('A', BitScore(1.0)), &end)
            .unwrap();
        assert_eq!(m.text().unwrap(), ".");
        let i = alg
            .insert_left(&cm, 3, BitScore::ZERO, ('A', BitScore(1.0)), &end)
            .unwrap();
        assert_eq!(i.text().unwrap(), ",");
        let paired = alg
            .match_pair(&cm, 1, BitScore::ZERO, ('C', 'G', BitScore(2.0)), &m)
            .unwrap();
        assert_eq!(paired.text().unwrap(), "(.)");
    }

    #[test]
    fn visited_nodes_records_traversal_order() {
        let cm = mocks::hairpin();
        let alg = Algebra::VisitedNodes;
        let end = alg.end(&cm, 4);
        let ml = alg
            .match_left(&cm, 3, BitScore::ZERO, ('A', BitScore(1.0)), &end)
            .unwrap();
        let mp = alg
            .match_pair(&cm, 1, BitScore::ZERO, ('C', 'G', BitScore(2.0)), &ml)
            .unwrap();
        let start = alg.start(&cm, 0, BitScore::ZERO, &mp).unwrap();
        assert_eq!(start.node_list().unwrap(), &[0, 1, 3, 4]);
    }

    #[test]
    fn branch_concatenates_subtrees() {
        let cm = mocks::branched();
        let alg = Algebra::RnaString;
        let left = Value::Text("AU".into());
        let right = Value::Text("G".into());
        assert_eq!(
            alg.branch(&cm, 1, &left, &right).unwrap().text().unwrap(),
            "AUG"
        );

        let alg = Algebra::VisitedNodes;
        let left = Value::Nodes(vec![2, 3, 4]);
        let right = Value::Nodes(vec![5, 6, 7]);
        assert_eq!(
            alg.branch(&cm, 1, &left, &right).unwrap().node_list().unwrap(),
            &[1, 2, 3, 4, 5, 6, 7]
        );
    }

    #[test]
    fn extended_trace_lists_rules_in_order() {
        let cm = mocks::single_pair();
        let alg = Algebra::Extended;
        let end = alg.end(&cm, 2);
        let mp = alg
            .match_pair(&cm, 1, BitScore(-0.5), ('A', 'U', BitScore(2.0)), &end)
            .unwrap();
        let start = alg.start(&cm, 0, BitScore::ZERO, &mp).unwrap();
        let lines = start.table().unwrap().to_vec();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Start"));
        assert!(lines[1].starts_with("MatchP"));
        assert!(lines[2].starts_with("End"));
        assert!(lines[1].contains("2.000"));
    }

    #[test]
    fn finalize_formats_each_witness_kind() {
        let alg = Algebra::MaxiMin;
        assert_eq!(alg.finalize(&Value::Score(BitScore(1.2345))).unwrap(), "1.234");

        let alg = Algebra::RnaString;
        assert_eq!(alg.finalize(&Value::Text("ACGU".into())).unwrap(), "ACGU");
        assert_eq!(alg.finalize(&Value::Text(String::new())).unwrap(), "_");

        let alg = Algebra::VisitedNodes;
        assert_eq!(alg.finalize(&Value::Nodes(vec![0, 1, 2])).unwrap(), "[0,1,2]");
        assert_eq!(alg.finalize(&Value::Nodes(Vec::new())).unwrap(), "[]");
    }

    #[test]
    fn product_applies_both_components() {
        let cm = mocks::single_pair();
        let alg = Algebra::product(Algebra::MaxiMin, Algebra::RnaString);
        let end = alg.end(&cm, 2);
        let mp = alg
            .match_pair(&cm, 1, BitScore::ZERO, ('A', 'U', BitScore(2.0)), &end)
            .unwrap();
        let (score, text) = mp.components().unwrap();
        assert_eq!(score.score().unwrap(), BitScore(2.0));
        assert_eq!(text.text().unwrap(), "AU");
    }

    #[test]
    fn selector_display_roundtrip() {
        let alg = Algebra::product(
            Algebra::MaxiMin,
            Algebra::product(Algebra::RnaString, Algebra::DotBracket),
        );
        assert_eq!(alg.to_string(), "score+rna+bracket");
    }
}
