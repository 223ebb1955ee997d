use std::sync::Arc;

use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::fraud::AnalysisParams;
use crate::gateway::{FaceGateway, HttpFaceGateway, NullFaceGateway};
use crate::ledger::VotePolicy;
use crate::model::mongodb::ensure_indexes_exist;
use crate::store::{MongoRegistry, MongoVoteStore};
use crate::Core;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    require_face_match: bool,
    face_match_threshold: f64,
    gateway_url: Option<String>,
    gateway_timeout_ms: u64,
    fraud_contamination: f64,
    fraud_trees: usize,
    fraud_sample_size: usize,
    fraud_seed: u64,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth tokens in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// The biometric policy applied when casting votes.
    pub fn vote_policy(&self) -> VotePolicy {
        VotePolicy {
            require_face_match: self.require_face_match,
            face_match_threshold: self.face_match_threshold,
        }
    }

    /// Base URL of the face verification service, if one is deployed.
    pub fn gateway_url(&self) -> Option<&str> {
        self.gateway_url.as_deref()
    }

    /// Hard deadline for a single verification call.
    pub fn gateway_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.gateway_timeout_ms)
    }

    /// Default fraud analysis parameters; endpoints may override the
    /// contamination and seed per request.
    pub fn analysis_params(&self) -> AnalysisParams {
        AnalysisParams {
            contamination: self.fraud_contamination,
            trees: self.fraud_trees,
            sample_size: self.fraud_sample_size,
            seed: self.fraud_seed,
        }
    }
}

#[cfg(test)]
impl Config {
    pub fn example() -> Self {
        Self {
            auth_ttl: 3600,
            require_face_match: false,
            face_match_threshold: 0.6,
            gateway_url: None,
            gateway_timeout_ms: 3000,
            fraud_contamination: 0.05,
            fraud_trees: 100,
            fraud_sample_size: 256,
            fraud_seed: 42,
            jwt_secret: "test-secret".to_string(),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that connects to MongoDB, ensures the required indexes exist,
/// wires up the storage backends and the face verification gateway, and
/// places the resulting [`Core`] into managed state. Must run after
/// [`ConfigFairing`].
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist; the unique vote index is what
        // makes duplicate rejection atomic.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Wire up the gateway from the application config, which
        // `ConfigFairing` has already managed.
        let app_config = match rocket.state::<crate::config::Config>() {
            Some(config) => config,
            None => {
                error!("Application config missing, is ConfigFairing attached first?");
                return Err(rocket);
            }
        };
        let gateway: Arc<dyn FaceGateway> = match app_config.gateway_url() {
            Some(url) => {
                match HttpFaceGateway::new(url.to_string(), app_config.gateway_timeout()) {
                    Ok(gateway) => Arc::new(gateway),
                    Err(e) => {
                        error!("Failed to construct face verification client: {e}");
                        return Err(rocket);
                    }
                }
            }
            None => {
                warn!("No face verification gateway configured, votes will carry no scores");
                Arc::new(NullFaceGateway)
            }
        };

        let core = Core::new(
            Arc::new(MongoVoteStore::new(db.clone())),
            Arc::new(MongoRegistry::new(db.clone())),
            gateway,
        );

        // Manage the state.
        rocket = rocket.manage(client).manage(db).manage(core);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "smartballot".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}
