use thiserror::Error;

use crate::model::{Criterion, Tagged};

/// Result of a successful criteria resolution.
#[derive(Debug)]
pub struct CriteriaMatch<'a, T> {
    /// Position of the matching criterion in the criteria list
    pub index: usize,
    pub criterion: Criterion,
    /// Non-empty, in the order of the candidates
    pub matches: Vec<&'a T>,
}

#[derive(Debug, Error)]
#[error("no active candidate matches any of the criteria [{}]", format_criteria(.criteria))]
pub struct NoMatchFound {
    pub criteria: Vec<Criterion>,
}

fn format_criteria(criteria: &[Criterion]) -> String {
    criteria
        .iter()
        .map(|criterion| criterion.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Finds the first criterion that is satisfied by at least one active candidate
/// and returns all active candidates satisfying it.
pub fn resolve<'a, T: Tagged>(
    criteria: &[Criterion],
    candidates: &'a [T],
) -> Result<CriteriaMatch<'a, T>, NoMatchFound> {
    for (index, criterion) in criteria.iter().enumerate() {
        let matches: Vec<&T> = candidates
            .iter()
            .filter(|candidate| candidate.is_active())
            .filter(|candidate| criterion.is_satisfied_by(candidate.tags()))
            .collect();
        if !matches.is_empty() {
            log::debug!(
                "Criterion #{index} {criterion} matched {} candidate(s)",
                matches.len()
            );
            return Ok(CriteriaMatch {
                index,
                criterion: criterion.clone(),
                matches,
            });
        }
    }
    Err(NoMatchFound {
        criteria: criteria.to_vec(),
    })
}
