//! Storage abstractions for the ledger and the read-only registry.
//!
//! The production implementations live in [`mongo`]; [`memory`] provides a
//! self-contained implementation with the same atomic conditional-insert
//! guarantee, used by the test suite and handy for local experimentation.

use thiserror::Error;

use crate::error::Error;
use crate::model::{
    db::{
        candidate::Candidate,
        election::Election,
        vote::{FraudFlag, NewVote, Vote},
        voter::Voter,
    },
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::{MemoryRegistry, MemoryVoteStore};
pub use mongo::{MongoRegistry, MongoVoteStore};

/// A failure in the storage backend. Fatal for the operation in progress;
/// nothing partial is ever persisted.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error("{0}")]
    Backend(String),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Db(e) => Error::Db(e),
            StoreError::Backend(msg) => Error::Storage(msg),
        }
    }
}

/// Outcome of a conditional vote insert.
#[derive(Debug, Error)]
pub enum CastError {
    /// A vote for this (voter, election) key already exists.
    #[error("duplicate vote")]
    Duplicate,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<CastError> for Error {
    fn from(err: CastError) -> Self {
        match err {
            CastError::Duplicate => Error::DuplicateVote,
            CastError::Store(e) => e.into(),
        }
    }
}

/// Read-only access to the election, candidate, and voter registries owned
/// by external subsystems.
#[rocket::async_trait]
pub trait Registry: Send + Sync {
    async fn election(&self, id: Id) -> Result<Option<Election>, StoreError>;

    /// Look up a candidate, checking it stands in the given election.
    async fn candidate_in_election(
        &self,
        election_id: Id,
        candidate_id: Id,
    ) -> Result<Option<Candidate>, StoreError>;

    /// All candidates of an election, in registration order.
    async fn election_candidates(&self, election_id: Id) -> Result<Vec<Candidate>, StoreError>;

    async fn voter(&self, id: Id) -> Result<Option<Voter>, StoreError>;

    /// All voters; the fraud analyzer joins registration times against votes.
    async fn voters(&self) -> Result<Vec<Voter>, StoreError>;
}

/// The append-only vote ledger.
///
/// `insert_vote` is the concurrency-critical operation: the duplicate check
/// and the insert happen as one atomic step, never as a read followed by a
/// write. Of N concurrent inserts for the same (voter, election) key,
/// exactly one succeeds and the rest fail [`CastError::Duplicate`].
#[rocket::async_trait]
pub trait VoteStore: Send + Sync {
    /// Conditionally append a vote. There is no update or delete.
    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, CastError>;

    /// Has this voter already voted in this election?
    async fn has_voted(&self, voter_id: Id, election_id: Id) -> Result<bool, StoreError>;

    /// A point-in-time snapshot of the ledger, optionally scoped to one
    /// election, in insertion order. Votes appended after the snapshot is
    /// taken are not included.
    async fn snapshot(&self, election_id: Option<Id>) -> Result<Vec<Vote>, StoreError>;

    /// Append the advisory flags of one analysis run.
    async fn insert_flags(&self, flags: Vec<FraudFlag>) -> Result<(), StoreError>;
}
