//! Comparison driver: runs the joint program and renders results.
//!
//! The standard report line is
//!
//! ```text
//! name1  name2  minScore  score1  score2  rnaString  dotBracket  [nodes1]  [nodes2]
//! ```
//!
//! with bit scores to three decimals and `_` standing in for an empty
//! witness string. Other outputs are driven by a selector such as
//! `score+rna+bracket`; see [`parse_selector`].

use std::fmt;

use cmlink_core::{BitScore, CmLinkError, Result};
use cmlink_model::{Cm, NodeId};

use crate::algebra::{format_nodes, trace_header, Algebra, Value};
use crate::engine::joint_optima;

/// Result of comparing two models with the standard algebra product.
#[derive(Debug, Clone)]
pub struct Comparison {
    pub name1: String,
    pub name2: String,
    /// The link score: the smaller of the two model scores.
    pub min_score: BitScore,
    pub score1: BitScore,
    pub score2: BitScore,
    /// The link sequence; scores this well under both models.
    pub sequence: String,
    /// Dot-bracket structure of the link sequence.
    pub structure: String,
    pub nodes1: Vec<NodeId>,
    pub nodes2: Vec<NodeId>,
}

impl Comparison {
    /// The result reported when no joint parse exists at all.
    fn unreachable(name1: &str, name2: &str) -> Comparison {
        Comparison {
            name1: name1.to_string(),
            name2: name2.to_string(),
            min_score: BitScore::NEG_INF,
            score1: BitScore::NEG_INF,
            score2: BitScore::NEG_INF,
            sequence: String::new(),
            structure: String::new(),
            nodes1: Vec::new(),
            nodes2: Vec::new(),
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  {}  {}  {}  {}  {}  {}  {}  {}",
            self.name1,
            self.name2,
            self.min_score,
            self.score1,
            self.score2,
            text_or_marker(&self.sequence),
            text_or_marker(&self.structure),
            format_nodes(&self.nodes1),
            format_nodes(&self.nodes2),
        )
    }
}

fn text_or_marker(s: &str) -> &str {
    if s.is_empty() {
        "_"
    } else {
        s
    }
}

/// Compare two models with the standard algebra product
/// `score x rna x bracket x nodes`.
///
/// # Errors
///
/// Fails with [`CmLinkError::Internal`] if the joint tables ever hold a
/// witness of the wrong shape.
pub fn compare(m1: &Cm, m2: &Cm, fast_insertions: bool) -> Result<Comparison> {
    let algebra = Algebra::product(
        Algebra::MaxiMin,
        Algebra::product(
            Algebra::RnaString,
            Algebra::product(Algebra::DotBracket, Algebra::VisitedNodes),
        ),
    );
    let table = joint_optima(m1, m2, &algebra, fast_insertions)?;
    let result = match table.root().first() {
        None => Comparison::unreachable(m1.name(), m2.name()),
        Some((v1, v2)) => {
            let (score1, rest1) = v1.components()?;
            let (seq1, rest1) = rest1.components()?;
            let (bracket1, nodes1) = rest1.components()?;
            let (score2, rest2) = v2.components()?;
            let (_, rest2) = rest2.components()?;
            let (_, nodes2) = rest2.components()?;

            let score1 = score1.score()?;
            let score2 = score2.score()?;
            Comparison {
                name1: m1.name().to_string(),
                name2: m2.name().to_string(),
                min_score: score1.min(score2),
                score1,
                score2,
                sequence: seq1.text()?.to_string(),
                structure: bracket1.text()?.to_string(),
                nodes1: nodes1.node_list()?.to_vec(),
                nodes2: nodes2.node_list()?.to_vec(),
            }
        }
    };
    log::info!(
        "{} vs {}: link score {}",
        result.name1,
        result.name2,
        result.min_score
    );
    Ok(result)
}

/// One requested output of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPart {
    /// Link score plus both model scores.
    Score,
    /// The link sequence.
    Rna,
    /// Its dot-bracket structure.
    Bracket,
    /// Visited nodes of both models.
    Nodes,
    /// Per-state trace tables of both models.
    Extended,
}

impl OutputPart {
    fn algebra(self) -> Algebra {
        match self {
            OutputPart::Score => Algebra::MaxiMin,
            OutputPart::Rna => Algebra::RnaString,
            OutputPart::Bracket => Algebra::DotBracket,
            OutputPart::Nodes => Algebra::VisitedNodes,
            OutputPart::Extended => Algebra::Extended,
        }
    }
}

/// Parse a selector such as `score`, `nodes`, or `score+rna+bracket`.
///
/// # Errors
///
/// Rejects empty selectors, unknown names, and repeated parts.
pub fn parse_selector(selector: &str) -> Result<Vec<OutputPart>> {
    let mut parts = Vec::new();
    for token in selector.split('+') {
        let part = match token.trim() {
            "score" => OutputPart::Score,
            "rna" => OutputPart::Rna,
            "bracket" => OutputPart::Bracket,
            "nodes" => OutputPart::Nodes,
            "extended" => OutputPart::Extended,
            other => {
                return Err(CmLinkError::InvalidInput(format!(
                    "unknown algebra '{}' (expected score, rna, bracket, nodes, or extended)",
                    other
                )))
            }
        };
        if parts.contains(&part) {
            return Err(CmLinkError::InvalidInput(format!(
                "algebra '{}' requested twice",
                token.trim()
            )));
        }
        parts.push(part);
    }
    if parts.is_empty() {
        return Err(CmLinkError::InvalidInput("empty algebra selector".into()));
    }
    Ok(parts)
}

/// Build the (possibly product) algebra for a parsed selector.
///
/// # Panics
///
/// Panics on an empty part list; [`parse_selector`] never produces one.
pub fn selector_algebra(parts: &[OutputPart]) -> Algebra {
    let mut iter = parts.iter().rev();
    let mut algebra = iter
        .next()
        .expect("selector has at least one part")
        .algebra();
    for part in iter {
        algebra = Algebra::product(part.algebra(), algebra);
    }
    algebra
}

/// Run a comparison under a selector and render its report.
///
/// The report is a single line of whitespace-separated fields; the
/// `extended` part appends one per-state trace block per model.
///
/// # Errors
///
/// Fails on an invalid selector, or with [`CmLinkError::Internal`] if the
/// joint tables hold a witness of the wrong shape.
pub fn run_selector(m1: &Cm, m2: &Cm, selector: &str, fast_insertions: bool) -> Result<String> {
    let parts = parse_selector(selector)?;
    let algebra = selector_algebra(&parts);
    let table = joint_optima(m1, m2, &algebra, fast_insertions)?;

    let mut fields = vec![m1.name().to_string(), m2.name().to_string()];
    let mut appendix = Vec::new();

    match table.root().first() {
        None => {
            for part in &parts {
                match part {
                    OutputPart::Score => {
                        let inf = BitScore::NEG_INF.to_string();
                        fields.extend([inf.clone(), inf.clone(), inf]);
                    }
                    OutputPart::Rna | OutputPart::Bracket => fields.push("_".into()),
                    OutputPart::Nodes => fields.extend(["[]".into(), "[]".into()]),
                    OutputPart::Extended => {}
                }
            }
        }
        Some((v1, v2)) => {
            let vals1 = flatten(v1, parts.len())?;
            let vals2 = flatten(v2, parts.len())?;
            for (i, part) in parts.iter().enumerate() {
                match part {
                    OutputPart::Score => {
                        let s1 = vals1[i].score()?;
                        let s2 = vals2[i].score()?;
                        fields.push(s1.min(s2).to_string());
                        fields.push(s1.to_string());
                        fields.push(s2.to_string());
                    }
                    OutputPart::Rna | OutputPart::Bracket => {
                        fields.push(text_or_marker(vals1[i].text()?).to_string());
                    }
                    OutputPart::Nodes => {
                        fields.push(format_nodes(vals1[i].node_list()?));
                        fields.push(format_nodes(vals2[i].node_list()?));
                    }
                    OutputPart::Extended => {
                        appendix.push(trace_block(m1.name(), vals1[i].table()?));
                        appendix.push(trace_block(m2.name(), vals2[i].table()?));
                    }
                }
            }
        }
    }

    let mut out = fields.join("  ");
    for block in appendix {
        out.push('\n');
        out.push_str(&block);
    }
    Ok(out)
}

/// Split a right-nested product witness into one value per selector part.
fn flatten(v: &Value, parts: usize) -> Result<Vec<&Value>> {
    let mut out = Vec::with_capacity(parts);
    let mut current = v;
    for _ in 0..parts - 1 {
        let (head, rest) = current.components()?;
        out.push(head);
        current = rest;
    }
    out.push(current);
    Ok(out)
}

fn trace_block(name: &str, lines: &[String]) -> String {
    let mut out = format!("{}\n{}", name, trace_header());
    for line in lines {
        out.push('\n');
        out.push_str(line);
    }
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use cmlink_model::mocks;
    use proptest::prelude::*;

    fn emissions16() -> impl Strategy<Value = [BitScore; 16]> {
        prop::collection::vec(-4.0..4.0f64, 16).prop_map(|v| {
            let mut out = [BitScore::ZERO; 16];
            for (slot, x) in out.iter_mut().zip(v) {
                *slot = BitScore(x);
            }
            out
        })
    }

    fn emissions4() -> impl Strategy<Value = [BitScore; 4]> {
        prop::collection::vec(-4.0..4.0f64, 4).prop_map(|v| {
            let mut out = [BitScore::ZERO; 4];
            for (slot, x) in out.iter_mut().zip(v) {
                *slot = BitScore(x);
            }
            out
        })
    }

    proptest! {
        #[test]
        fn link_score_is_the_min_of_both_scores(e1 in emissions16(), e2 in emissions16()) {
            let m1 = mocks::single_pair_with(e1);
            let m2 = mocks::single_pair_with(e2);
            let c = compare(&m1, &m2, false).unwrap();
            prop_assert_eq!(c.min_score, c.score1.min(c.score2));
        }

        #[test]
        fn link_score_is_symmetric(e1 in emissions16(), e2 in emissions16()) {
            let m1 = mocks::single_pair_with(e1);
            let m2 = mocks::single_pair_with(e2);
            let ab = compare(&m1, &m2, false).unwrap();
            let ba = compare(&m2, &m1, false).unwrap();
            prop_assert_eq!(ab.min_score, ba.min_score);
        }

        #[test]
        fn self_comparison_scores_agree(e in emissions16()) {
            let m = mocks::single_pair_with(e);
            let c = compare(&m, &m, false).unwrap();
            prop_assert_eq!(c.score1, c.score2);
            prop_assert_eq!(c.min_score, c.score1);
        }

        #[test]
        fn runs_are_deterministic(mp1 in emissions16(), mp2 in emissions16(), ml in emissions4()) {
            let m1 = mocks::hairpin_with(mp1, mp2, ml);
            let m2 = mocks::hairpin();
            let a = compare(&m1, &m2, false).unwrap().to_string();
            let b = compare(&m1, &m2, false).unwrap().to_string();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn product_scalar_matches_score_algebra(mp1 in emissions16(), mp2 in emissions16(), ml in emissions4()) {
            let m1 = mocks::hairpin_with(mp1, mp2, ml);
            let m2 = mocks::hairpin();
            let score_only = run_selector(&m1, &m2, "score", false).unwrap();
            let product = run_selector(&m1, &m2, "score+rna", false).unwrap();
            prop_assert!(product.starts_with(&score_only));
        }

        #[test]
        fn witness_strings_stay_aligned(mp1 in emissions16(), mp2 in emissions16(), ml in emissions4()) {
            let m1 = mocks::hairpin_with(mp1, mp2, ml);
            let c = compare(&m1, &m1, false).unwrap();
            prop_assert_eq!(c.sequence.len(), c.structure.len());
            // Brackets stay balanced and only close what was opened.
            let mut depth: i64 = 0;
            for ch in c.structure.chars() {
                match ch {
                    '(' => depth += 1,
                    ')' => { depth -= 1; prop_assert!(depth >= 0); }
                    '.' | ',' => {}
                    other => prop_assert!(false, "unexpected structure character {}", other),
                }
            }
            prop_assert_eq!(depth, 0);
        }

        #[test]
        fn fast_insertions_are_more_restrictive(e in emissions16()) {
            let m = mocks::single_pair_with(e);
            let relaxed = compare(&m, &m, false).unwrap();
            let fast = compare(&m, &m, true).unwrap();
            prop_assert!(fast.min_score.value() <= relaxed.min_score.value());
        }
    }
}
