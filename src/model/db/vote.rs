use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core vote data, as appended to the ledger.
///
/// Votes are immutable once created; there is deliberately no update or
/// delete path anywhere in this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteCore {
    pub voter_id: Id,
    pub election_id: Id,
    pub candidate_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
    /// Similarity score from the face verification gateway, if it answered
    /// in time. Advisory: feeds the fraud analyzer, never retracts a vote.
    pub face_match_score: Option<f64>,
    /// Client/device fingerprint supplied by the voting client, if any.
    pub session_id: Option<String>,
}

/// A vote without an ID, ready for insertion.
pub type NewVote = VoteCore;

/// A vote from the ledger, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

/// An advisory flag produced by one fraud analysis run.
///
/// Flags are additive: re-running the analysis appends flags for the new
/// run and never alters the ledger or earlier runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudFlag {
    pub vote_id: Id,
    pub voter_id: Id,
    /// Normalized isolation score in (0, 1]; higher is more anomalous.
    pub anomaly_score: f64,
    pub reason: FlagReason,
    /// The analysis run that produced this flag.
    pub run_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub flagged_at: DateTime<Utc>,
}

/// Why a vote was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagReason {
    /// The vote's isolation score fell in the top contamination fraction.
    IsolationOutlier,
}
