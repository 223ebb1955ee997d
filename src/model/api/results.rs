use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Tally results for one election, candidates pre-sorted descending by
/// vote count with the documented deterministic tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub total_votes: u64,
    pub candidates: Vec<CandidateResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: Id,
    pub name: String,
    pub party: String,
    pub image_url: Option<String>,
    pub vote_count: u64,
}
