//! Reader for Infernal ASCII `.cm` model files.
//!
//! Handles the `INFERNAL1/a` (1.1) layout and is tolerant of the older 1.0
//! header. Only the CM section is read; the trailing filter-HMM section of
//! 1.1 files is ignored. Score tokens are taken from the tail of each state
//! line so that the optional QDB band columns between the child counts and
//! the scores do not need to be understood.

use std::path::Path;

use cmlink_core::{BitScore, CmLinkError, Result};

use crate::model::{Cm, NodeKind};
use crate::state::{Emission, State, StateType};

/// Parse the first model from a `.cm` file on disk.
///
/// # Errors
///
/// Returns `Io` on read failure, `Parse` on malformed content, and
/// `ModelShape` if the parsed model violates a structural invariant.
pub fn parse_cm_file(path: impl AsRef<Path>) -> Result<Cm> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let cm = parse_cm_str(&text)?;
    log::debug!("parsed {} from {}", cm, path.display());
    Ok(cm)
}

/// Parse the first model from `.cm` file contents.
pub fn parse_cm_str(text: &str) -> Result<Cm> {
    let mut lines = text.lines().enumerate();

    let mut name: Option<String> = None;
    let mut declared_states: Option<usize> = None;

    // Header: KEY value lines up to the bare "CM" marker.
    loop {
        let (lineno, raw) = lines
            .next()
            .ok_or_else(|| CmLinkError::Parse("missing CM section".into()))?;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("INFERNAL") {
            continue;
        }
        if line == "CM" {
            break;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let key = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default().trim();
        match key {
            "NAME" => name = Some(value.to_string()),
            "STATES" => {
                declared_states = Some(value.parse().map_err(|_| {
                    CmLinkError::parse_at(lineno + 1, format!("bad STATES count '{}'", value))
                })?)
            }
            "ALPH" => {
                if !value.eq_ignore_ascii_case("RNA") {
                    return Err(CmLinkError::parse_at(
                        lineno + 1,
                        format!("unsupported alphabet '{}'", value),
                    ));
                }
            }
            // NODES, CLEN, W, accession lines, E-value lines, ...
            _ => {}
        }
    }

    // Body: node markers and state lines, up to the first "//".
    let mut states: Vec<State> = Vec::new();
    let mut node_kinds: Vec<NodeKind> = Vec::new();
    for (lineno, raw) in lines {
        let line = raw.trim();
        if line == "//" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('[') {
            let inner = rest.split(']').next().unwrap_or_default();
            let mut tokens = inner.split_whitespace();
            let kind_token = tokens
                .next()
                .ok_or_else(|| CmLinkError::parse_at(lineno + 1, "empty node marker"))?;
            let kind = NodeKind::parse(kind_token)
                .map_err(|e| CmLinkError::parse_at(lineno + 1, e.to_string()))?;
            let index: usize = tokens
                .next()
                .ok_or_else(|| CmLinkError::parse_at(lineno + 1, "node marker missing index"))?
                .parse()
                .map_err(|_| CmLinkError::parse_at(lineno + 1, "bad node index"))?;
            if index != node_kinds.len() {
                return Err(CmLinkError::parse_at(
                    lineno + 1,
                    format!("node {} out of order (expected {})", index, node_kinds.len()),
                ));
            }
            node_kinds.push(kind);
        } else {
            if node_kinds.is_empty() {
                return Err(CmLinkError::parse_at(
                    lineno + 1,
                    "state line before any node marker",
                ));
            }
            let state = parse_state_line(line, lineno + 1, node_kinds.len() - 1)?;
            if state.id != states.len() {
                return Err(CmLinkError::parse_at(
                    lineno + 1,
                    format!("state {} out of order (expected {})", state.id, states.len()),
                ));
            }
            states.push(state);
        }
    }

    if let Some(expected) = declared_states {
        if states.len() != expected {
            return Err(CmLinkError::Parse(format!(
                "header declares {} states but the body has {}",
                expected,
                states.len()
            )));
        }
    }

    Cm::new(name.unwrap_or_else(|| "unknown".to_string()), states, node_kinds)
}

fn parse_state_line(line: &str, lineno: usize, node: usize) -> Result<State> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 6 {
        return Err(CmLinkError::parse_at(lineno, "truncated state line"));
    }
    let ty = StateType::parse(tokens[0]).map_err(|e| CmLinkError::parse_at(lineno, e.to_string()))?;
    let id: usize = tokens[1]
        .parse()
        .map_err(|_| CmLinkError::parse_at(lineno, "bad state ID"))?;
    // tokens[2] and tokens[3] are the parent pointer and count; unused here.
    let cfirst: i64 = tokens[4]
        .parse()
        .map_err(|_| CmLinkError::parse_at(lineno, "bad first-child field"))?;
    let cnum: i64 = tokens[5]
        .parse()
        .map_err(|_| CmLinkError::parse_at(lineno, "bad child-count field"))?;

    match ty {
        StateType::B => {
            if cfirst < 0 || cnum < 0 {
                return Err(CmLinkError::parse_at(lineno, "bifurcation children missing"));
            }
            Ok(State::new(
                id,
                ty,
                node,
                vec![
                    (cfirst as usize, BitScore::ZERO),
                    (cnum as usize, BitScore::ZERO),
                ],
                Emission::None,
            ))
        }
        StateType::E | StateType::EL => Ok(State::new(id, ty, node, Vec::new(), Emission::None)),
        _ => {
            if cfirst < 0 || cnum <= 0 {
                return Err(CmLinkError::parse_at(lineno, "state has no children"));
            }
            let trans_count = cnum as usize;
            let emis_count = match ty {
                StateType::MP => 16,
                StateType::ML | StateType::IL | StateType::MR | StateType::IR => 4,
                _ => 0,
            };
            let needed = trans_count + emis_count;
            let tail = &tokens[6..];
            if tail.len() < needed {
                return Err(CmLinkError::parse_at(
                    lineno,
                    format!("expected {} scores, found {}", needed, tail.len()),
                ));
            }
            let scores: Vec<BitScore> = tail[tail.len() - needed..]
                .iter()
                .map(|&t| parse_score(t, lineno))
                .collect::<Result<_>>()?;

            let transitions = (0..trans_count)
                .map(|j| (cfirst as usize + j, scores[j]))
                .collect();
            let emission = match ty {
                StateType::MP => {
                    let mut v = [BitScore::ZERO; 16];
                    v.copy_from_slice(&scores[trans_count..]);
                    Emission::Pair(v)
                }
                StateType::ML | StateType::IL | StateType::MR | StateType::IR => {
                    let mut v = [BitScore::ZERO; 4];
                    v.copy_from_slice(&scores[trans_count..]);
                    Emission::Single(v)
                }
                _ => Emission::None,
            };
            Ok(State::new(id, ty, node, transitions, emission))
        }
    }
}

fn parse_score(token: &str, lineno: usize) -> Result<BitScore> {
    if token == "*" {
        return Ok(BitScore::NEG_INF);
    }
    token
        .parse::<f64>()
        .map(BitScore)
        .map_err(|_| CmLinkError::parse_at(lineno, format!("bad score '{}'", token)))
}
