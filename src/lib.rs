//! Backend core for a digital voting system: an append-only vote ledger
//! with atomic duplicate rejection, deterministic tallying, seeded
//! isolation-forest fraud analysis, and a fail-open adapter for the
//! external face verification gateway.

#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

use std::sync::Arc;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod fraud;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod store;
pub mod tally;

use gateway::FaceGateway;
use ledger::Ledger;
use store::{Registry, VoteStore};

/// The wired-up service core: the ledger plus direct handles to its
/// storage backends for the read paths that bypass it (tallying, fraud
/// analysis). Constructed once at ignition and managed as Rocket state.
pub struct Core {
    votes: Arc<dyn VoteStore>,
    registry: Arc<dyn Registry>,
    ledger: Ledger,
}

impl Core {
    pub fn new(
        votes: Arc<dyn VoteStore>,
        registry: Arc<dyn Registry>,
        gateway: Arc<dyn FaceGateway>,
    ) -> Self {
        let ledger = Ledger::new(votes.clone(), registry.clone(), gateway);
        Self {
            votes,
            registry,
            ledger,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn votes(&self) -> &dyn VoteStore {
        &*self.votes
    }

    pub fn registry(&self) -> &dyn Registry {
        &*self.registry
    }
}

/// Build the production server: config, MongoDB-backed [`Core`], and
/// request logging, with the API mounted under `/api`.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
        .attach(logging::LoggerFairing)
        .mount("/api", api::routes())
}

/// A local client over an already-wired [`Core`], with an example config.
/// No database fairing, so tests run self-contained.
#[cfg(test)]
pub(crate) async fn test_client(core: Core) -> rocket::local::asynchronous::Client {
    let rocket = rocket::build()
        .manage(config::Config::example())
        .manage(core)
        .mount("/api", api::routes());
    rocket::local::asynchronous::Client::tracked(rocket)
        .await
        .unwrap()
}
