use mongodb::{bson::doc, options::FindOptions, Database};
use rocket::futures::TryStreamExt;

use crate::model::{
    db::{
        candidate::Candidate,
        election::Election,
        vote::{FraudFlag, NewVote, Vote},
        voter::Voter,
    },
    mongodb::{is_duplicate_key_error, Coll, Id},
};

use super::{CastError, Registry, StoreError, VoteStore};

/// MongoDB-backed vote ledger.
///
/// The conditional insert rides on the unique `(voter_id, election_id)`
/// index created by `ensure_indexes_exist`: the insert either lands as the
/// single row for that key or bounces with a duplicate-key error, with no
/// separate read step to race against.
pub struct MongoVoteStore {
    db: Database,
}

impl MongoVoteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[rocket::async_trait]
impl VoteStore for MongoVoteStore {
    async fn insert_vote(&self, vote: NewVote) -> Result<Vote, CastError> {
        let result = Coll::<NewVote>::from_db(&self.db)
            .insert_one(&vote, None)
            .await;
        match result {
            Ok(insert) => {
                let id = insert
                    .inserted_id
                    .as_object_id()
                    .unwrap() // Valid because the ID comes directly from the DB.
                    .into();
                Ok(Vote { id, vote })
            }
            Err(err) if is_duplicate_key_error(&err) => Err(CastError::Duplicate),
            Err(err) => Err(StoreError::from(err).into()),
        }
    }

    async fn has_voted(&self, voter_id: Id, election_id: Id) -> Result<bool, StoreError> {
        let filter = doc! {
            "voter_id": *voter_id,
            "election_id": *election_id,
        };
        let existing = Coll::<Vote>::from_db(&self.db).find_one(filter, None).await?;
        Ok(existing.is_some())
    }

    async fn snapshot(&self, election_id: Option<Id>) -> Result<Vec<Vote>, StoreError> {
        let filter = election_id.map(|id| doc! { "election_id": *id });
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let votes = Coll::<Vote>::from_db(&self.db)
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(votes)
    }

    async fn insert_flags(&self, flags: Vec<FraudFlag>) -> Result<(), StoreError> {
        if flags.is_empty() {
            return Ok(());
        }
        Coll::<FraudFlag>::from_db(&self.db)
            .insert_many(flags, None)
            .await?;
        Ok(())
    }
}

/// MongoDB-backed registry reader. The collections belong to the
/// registration and election-management subsystems.
pub struct MongoRegistry {
    db: Database,
}

impl MongoRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[rocket::async_trait]
impl Registry for MongoRegistry {
    async fn election(&self, id: Id) -> Result<Option<Election>, StoreError> {
        let election = Coll::<Election>::from_db(&self.db)
            .find_one(id.as_doc(), None)
            .await?;
        Ok(election)
    }

    async fn candidate_in_election(
        &self,
        election_id: Id,
        candidate_id: Id,
    ) -> Result<Option<Candidate>, StoreError> {
        let filter = doc! {
            "_id": *candidate_id,
            "election_id": *election_id,
        };
        let candidate = Coll::<Candidate>::from_db(&self.db)
            .find_one(filter, None)
            .await?;
        Ok(candidate)
    }

    async fn election_candidates(&self, election_id: Id) -> Result<Vec<Candidate>, StoreError> {
        // `_id` order is registration order.
        let filter = doc! { "election_id": *election_id };
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let candidates = Coll::<Candidate>::from_db(&self.db)
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn voter(&self, id: Id) -> Result<Option<Voter>, StoreError> {
        let voter = Coll::<Voter>::from_db(&self.db)
            .find_one(id.as_doc(), None)
            .await?;
        Ok(voter)
    }

    async fn voters(&self) -> Result<Vec<Voter>, StoreError> {
        let voters = Coll::<Voter>::from_db(&self.db)
            .find(None, None)
            .await?
            .try_collect()
            .await?;
        Ok(voters)
    }
}
