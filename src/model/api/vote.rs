use serde::{Deserialize, Serialize};

use crate::model::{db::vote::Vote, mongodb::Id};

/// A vote the client wishes to cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRequest {
    pub election_id: Id,
    /// A registered candidate of the election, or the reserved NOTA id.
    pub candidate_id: Id,
    /// Base64-encoded capture for face verification. Optional by design:
    /// voters without a camera keep an accessibility path.
    pub face_image: Option<String>,
    /// Client/device fingerprint, fed to the fraud analyzer.
    pub session_id: Option<String>,
}

/// Acknowledgement of a recorded vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub success: bool,
    pub receipt_id: Id,
}

impl From<&Vote> for VoteReceipt {
    fn from(vote: &Vote) -> Self {
        Self {
            success: true,
            receipt_id: vote.id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStatus {
    pub has_voted: bool,
}
