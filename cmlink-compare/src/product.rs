//! Co-optima selection for algebra products.
//!
//! The product of algebras A and B evaluates every rule componentwise; the
//! subtle part is the selector. Candidates are first projected onto their
//! A-components and collapsed with A's selector. Only within the candidates
//! that achieved an optimal A-witness is B's selector applied, and the
//! results crossed back together. This ordering is what lets a witness-only
//! B (strings, node lists) ride along without ever dragging in parses that
//! are not A-optimal.

use cmlink_core::Result;

use crate::algebra::{Algebra, Value};

/// Project a joint candidate list onto the first product component.
///
/// # Errors
///
/// Fails if a candidate is not a product witness.
pub fn project_first(xs: &[(Value, Value)]) -> Result<Vec<(Value, Value)>> {
    let mut out = Vec::with_capacity(xs.len());
    for (v1, v2) in xs {
        let (a1, _) = v1.components()?;
        let (a2, _) = v2.components()?;
        out.push((a1.clone(), a2.clone()));
    }
    Ok(out)
}

/// Project a joint candidate list onto the second product component.
///
/// # Errors
///
/// Fails if a candidate is not a product witness.
pub fn project_second(xs: &[(Value, Value)]) -> Result<Vec<(Value, Value)>> {
    let mut out = Vec::with_capacity(xs.len());
    for (v1, v2) in xs {
        let (_, b1) = v1.components()?;
        let (_, b2) = v2.components()?;
        out.push((b1.clone(), b2.clone()));
    }
    Ok(out)
}

/// The product selector: choose by A first, then enumerate B within the
/// chosen A-witnesses.
///
/// # Errors
///
/// Fails when either inner selector fails or a candidate has the wrong
/// witness shape.
pub fn opt_product(a: &Algebra, b: &Algebra, xs: Vec<(Value, Value)>) -> Result<Vec<(Value, Value)>> {
    let mut leads = a.opt(project_first(&xs)?)?;
    dedup_preserving_order(&mut leads);

    let mut out = Vec::new();
    for lead in &leads {
        let mut matching = Vec::new();
        for (v1, v2) in &xs {
            let (a1, _) = v1.components()?;
            let (a2, _) = v2.components()?;
            if (a1, a2) == (&lead.0, &lead.1) {
                matching.push((v1.clone(), v2.clone()));
            }
        }
        for trail in b.opt(project_second(&matching)?)? {
            out.push((
                Value::pair(lead.0.clone(), trail.0),
                Value::pair(lead.1.clone(), trail.1),
            ));
        }
    }
    Ok(out)
}

/// Drop duplicate witnesses, keeping the first occurrence of each.
fn dedup_preserving_order(xs: &mut Vec<(Value, Value)>) {
    let mut seen: Vec<(Value, Value)> = Vec::new();
    xs.retain(|x| {
        if seen.contains(x) {
            false
        } else {
            seen.push(x.clone());
            true
        }
    });
}
