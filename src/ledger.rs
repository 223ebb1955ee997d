//! The vote ledger: the one concurrency-critical component.
//!
//! `cast_vote` validates election state, candidate, and voter eligibility,
//! optionally consults the face verification gateway, and then appends the
//! vote through the store's atomic conditional insert. Everything else in
//! the crate only reads the ledger.

use std::sync::Arc;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::gateway::FaceGateway;
use crate::model::{
    api::vote::VoteRequest,
    common::election::nota_id,
    db::vote::{NewVote, Vote},
    mongodb::Id,
};
use crate::store::{Registry, VoteStore};

/// The biometric policy applied when casting.
///
/// Verification is advisory by default: a low or missing score is recorded
/// as a fraud-analysis feature but does not block the vote, preserving an
/// accessibility path for voters without a camera. Deployments that want a
/// hard gate flip `require_face_match` in config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VotePolicy {
    pub require_face_match: bool,
    pub face_match_threshold: f64,
}

pub struct Ledger {
    votes: Arc<dyn VoteStore>,
    registry: Arc<dyn Registry>,
    gateway: Arc<dyn FaceGateway>,
}

impl Ledger {
    pub fn new(
        votes: Arc<dyn VoteStore>,
        registry: Arc<dyn Registry>,
        gateway: Arc<dyn FaceGateway>,
    ) -> Self {
        Self {
            votes,
            registry,
            gateway,
        }
    }

    /// Cast a vote for the given voter.
    ///
    /// Preconditions are checked in order: the election exists and its
    /// window is open; the candidate stands in that election (or is NOTA);
    /// the voter exists and is active. The duplicate check is not a
    /// separate step: it happens inside the store's conditional insert, so
    /// concurrent casts for the same (voter, election) key resolve to
    /// exactly one success.
    pub async fn cast_vote(&self, voter_id: Id, request: &VoteRequest, policy: &VotePolicy) -> Result<Vote> {
        // Election exists and is active right now.
        let election = self
            .registry
            .election(request.election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {}", request.election_id)))?;
        let now = Utc::now();
        if !election.is_active_at(now) {
            return Err(Error::NotActive(format!(
                "election {} is {}",
                election.id,
                election.state_at(now)
            )));
        }

        // Candidate stands in this election, or is the reserved NOTA id.
        if request.candidate_id != nota_id() {
            self.registry
                .candidate_in_election(request.election_id, request.candidate_id)
                .await?
                .ok_or_else(|| {
                    Error::BadRequest(format!(
                        "Candidate {} does not stand in election {}",
                        request.candidate_id, request.election_id
                    ))
                })?;
        }

        // Voter exists and is eligible.
        let voter = self
            .registry
            .voter(voter_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter {voter_id}")))?;
        if !voter.is_eligible() {
            return Err(Error::Forbidden(
                "Voter is not eligible to vote".to_string(),
            ));
        }

        // Face verification, fail-open. A score is only obtainable when the
        // client captured an image and the voter registered a template.
        let face_match_score = match &request.face_image {
            Some(image) if !voter.face_template.is_empty() => {
                match self.gateway.verify(&voter.face_template, image).await {
                    Ok(score) => Some(score),
                    Err(err) => {
                        warn!("face verification degraded, recording vote without score: {err}");
                        None
                    }
                }
            }
            _ => None,
        };
        if policy.require_face_match
            && face_match_score.map_or(true, |score| score < policy.face_match_threshold)
        {
            return Err(Error::Forbidden(
                "Face verification failed".to_string(),
            ));
        }

        // Atomic conditional append; losers of the race get DuplicateVote.
        let vote = self
            .votes
            .insert_vote(NewVote {
                voter_id,
                election_id: request.election_id,
                candidate_id: request.candidate_id,
                cast_at: now,
                face_match_score,
                session_id: request.session_id.clone(),
            })
            .await?;
        info!(
            "vote {} recorded for election {}",
            vote.id, vote.election_id
        );
        Ok(vote)
    }

    /// Has the voter already voted in this election? Answered from the
    /// ledger itself, the single source of truth.
    pub async fn has_voted(&self, voter_id: Id, election_id: Id) -> Result<bool> {
        Ok(self.votes.has_voted(voter_id, election_id).await?)
    }
}
