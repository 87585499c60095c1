// src/classify.rs
use crate::seen::SeenSet;
use crate::types::CandidateItem;

/// Candidates whose link is not in `seen`, in input order.
///
/// Links are compared verbatim: `https://x/a` and `https://x/a/` are two items.
pub fn classify(candidates: &[CandidateItem], seen: &SeenSet) -> Vec<CandidateItem> {
    candidates
        .iter()
        .filter(|c| !seen.contains(&c.link))
        .cloned()
        .collect()
}
