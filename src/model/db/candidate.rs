use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A candidate standing in a single election. Owned by the
/// election-management subsystem; read-only here.
///
/// Registration order is `_id` order, which is also the deterministic
/// tie-break used when tallying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub name: String,
    pub party: String,
    pub image_url: Option<String>,
    /// Optional free-text note shown alongside the candidate.
    pub note: Option<String>,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Candidate {
        pub fn example(election_id: Id, name: &str, party: &str) -> Self {
            Self {
                id: Id::new(),
                election_id,
                name: name.to_string(),
                party: party.to_string(),
                image_url: None,
                note: None,
            }
        }
    }
}
