use std::collections::HashSet;
use std::sync::Mutex;

use crate::model::{
    db::{
        candidate::Candidate,
        election::Election,
        vote::{FraudFlag, NewVote, Vote},
        voter::Voter,
    },
    mongodb::Id,
};

use super::{CastError, Registry, StoreError, VoteStore};

/// In-memory vote ledger.
///
/// The whole ledger sits behind one mutex, so the duplicate check and the
/// insert are trivially a single atomic step: whichever concurrent cast
/// takes the lock first for a given (voter, election) key wins, all later
/// ones see the key and fail `Duplicate`.
#[derive(Debug, Default)]
pub struct MemoryVoteStore {
    inner: Mutex<LedgerInner>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    votes: Vec<Vote>,
    cast_keys: HashSet<(Id, Id)>,
    flags: Vec<FraudFlag>,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All flags recorded so far, across every analysis run.
    pub fn flags(&self) -> Result<Vec<FraudFlag>, StoreError> {
        Ok(self.lock()?.flags.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LedgerInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("ledger lock poisoned".to_string()))
    }
}

#[rocket::async_trait]
impl VoteStore for MemoryVoteStore {
    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, CastError> {
        let mut inner = self.lock()?;
        let key = (vote.voter_id, vote.election_id);
        if !inner.cast_keys.insert(key) {
            return Err(CastError::Duplicate);
        }
        let vote = Vote {
            id: Id::new(),
            vote,
        };
        inner.votes.push(vote.clone());
        Ok(vote)
    }

    async fn has_voted(&self, voter_id: Id, election_id: Id) -> Result<bool, StoreError> {
        Ok(self.lock()?.cast_keys.contains(&(voter_id, election_id)))
    }

    async fn snapshot(&self, election_id: Option<Id>) -> Result<Vec<Vote>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .votes
            .iter()
            .filter(|vote| election_id.map_or(true, |id| vote.election_id == id))
            .cloned()
            .collect())
    }

    async fn insert_flags(&self, flags: Vec<FraudFlag>) -> Result<(), StoreError> {
        self.lock()?.flags.extend(flags);
        Ok(())
    }
}

/// In-memory election/candidate/voter registry, seeded up front by tests.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    elections: Vec<Election>,
    candidates: Vec<Candidate>,
    voters: Vec<Voter>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_election(&self, election: Election) {
        self.lock().elections.push(election);
    }

    pub fn add_candidate(&self, candidate: Candidate) {
        self.lock().candidates.push(candidate);
    }

    pub fn add_voter(&self, voter: Voter) {
        self.lock().voters.push(voter);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        // Seeding happens before any request; poisoning cannot occur.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[rocket::async_trait]
impl Registry for MemoryRegistry {
    async fn election(&self, id: Id) -> Result<Option<Election>, StoreError> {
        Ok(self.lock().elections.iter().find(|e| e.id == id).cloned())
    }

    async fn candidate_in_election(
        &self,
        election_id: Id,
        candidate_id: Id,
    ) -> Result<Option<Candidate>, StoreError> {
        Ok(self
            .lock()
            .candidates
            .iter()
            .find(|c| c.id == candidate_id && c.election_id == election_id)
            .cloned())
    }

    async fn election_candidates(&self, election_id: Id) -> Result<Vec<Candidate>, StoreError> {
        // Insertion order is registration order.
        Ok(self
            .lock()
            .candidates
            .iter()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn voter(&self, id: Id) -> Result<Option<Voter>, StoreError> {
        Ok(self.lock().voters.iter().find(|v| v.id == id).cloned())
    }

    async fn voters(&self) -> Result<Vec<Voter>, StoreError> {
        Ok(self.lock().voters.clone())
    }
}
