use std::collections::HashMap;

use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fraud::{self, AnalysisParams};
use crate::model::{
    api::{
        auth::{Admin, AuthToken},
        fraud::FraudReport,
        results::{CandidateResult, ElectionResults},
    },
    common::election::{nota_id, NOTA_NAME},
    mongodb::Id,
};
use crate::tally::tally_votes;
use crate::Core;

pub fn routes() -> Vec<Route> {
    routes![election_results, detect_fraud]
}

/// Live tally for an election, derived from the ledger on demand. Safe to
/// call at any time; a tally mid-election simply reflects the votes so far.
#[get("/admin/results/<election_id>")]
async fn election_results(
    _token: AuthToken<Admin>,
    election_id: Id,
    core: &State<Core>,
) -> Result<Json<ElectionResults>> {
    core.registry()
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    let candidates = core.registry().election_candidates(election_id).await?;
    let snapshot = core.votes().snapshot(Some(election_id)).await?;
    let tally = tally_votes(&candidates, &snapshot);

    let by_id: HashMap<Id, _> = candidates
        .iter()
        .map(|candidate| (candidate.id, candidate))
        .collect();
    let rows = tally
        .rankings
        .iter()
        .map(|row| match by_id.get(&row.candidate_id) {
            Some(candidate) => CandidateResult {
                id: candidate.id,
                name: candidate.name.clone(),
                party: candidate.party.clone(),
                image_url: candidate.image_url.clone(),
                vote_count: row.count,
            },
            None if row.candidate_id == nota_id() => CandidateResult {
                id: row.candidate_id,
                name: NOTA_NAME.to_string(),
                party: String::new(),
                image_url: None,
                vote_count: row.count,
            },
            // A candidate removed mid-election; their votes still count.
            None => CandidateResult {
                id: row.candidate_id,
                name: "Withdrawn candidate".to_string(),
                party: String::new(),
                image_url: None,
                vote_count: row.count,
            },
        })
        .collect();

    Ok(Json(ElectionResults {
        total_votes: tally.total_votes,
        candidates: rows,
    }))
}

/// Run fraud analysis over the ledger, optionally scoped to one election.
/// Flags are persisted for audit and the report returned to the caller;
/// the ledger itself is never modified.
#[get("/admin/fraud/detect?<election_id>&<contamination>&<seed>")]
async fn detect_fraud(
    _token: AuthToken<Admin>,
    election_id: Option<Id>,
    contamination: Option<f64>,
    seed: Option<u64>,
    core: &State<Core>,
    config: &State<Config>,
) -> Result<Json<FraudReport>> {
    if let Some(election_id) = election_id {
        core.registry()
            .election(election_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    }

    let snapshot = core.votes().snapshot(election_id).await?;
    let voters_by_id = core
        .registry()
        .voters()
        .await?
        .into_iter()
        .map(|voter| (voter.id, voter))
        .collect();

    let defaults = config.analysis_params();
    let params = AnalysisParams {
        contamination: contamination.unwrap_or(defaults.contamination),
        seed: seed.unwrap_or(defaults.seed),
        ..defaults
    };
    let outcome = fraud::analyze(&snapshot, &voters_by_id, &params)?;
    core.votes().insert_flags(outcome.flags.clone()).await?;

    Ok(Json(FraudReport::from_outcome(&outcome, &snapshot)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::Client,
    };

    use crate::gateway::stubs::StaticGateway;
    use crate::model::{
        api::auth::AUTH_HEADER,
        db::{candidate::Candidate, election::Election, voter::Voter},
    };
    use crate::store::{MemoryRegistry, MemoryVoteStore};

    use super::*;

    struct World {
        client: Client,
        votes: Arc<MemoryVoteStore>,
        election: Election,
        candidates: Vec<Candidate>,
        voters: Vec<Voter>,
        admin_bearer: String,
    }

    /// An active election with three candidates and `voter_count` voters.
    async fn world(voter_count: usize) -> World {
        let registry = Arc::new(MemoryRegistry::new());
        let election = Election::example_active();
        let candidates = vec![
            Candidate::example(election.id, "Maya Singh", "Unity"),
            Candidate::example(election.id, "Tom Okafor", "Progress"),
            Candidate::example(election.id, "Lena Voss", "Reform"),
        ];
        registry.add_election(election.clone());
        for candidate in &candidates {
            registry.add_candidate(candidate.clone());
        }
        let voters: Vec<Voter> = (0..voter_count)
            .map(|i| Voter {
                id: Id::new(),
                email: format!("voter{i}@example.com"),
                registered_at: Utc::now() - Duration::days(60),
                ..Voter::example()
            })
            .collect();
        for voter in &voters {
            registry.add_voter(voter.clone());
        }

        let votes = Arc::new(MemoryVoteStore::new());
        let core = Core::new(votes.clone(), registry, Arc::new(StaticGateway(0.9)));
        let client = crate::test_client(core).await;
        let admin_bearer = AuthToken::<Admin>::new(Id::new())
            .into_bearer(client.rocket().state::<Config>().unwrap());
        World {
            client,
            votes,
            election,
            candidates,
            voters,
            admin_bearer,
        }
    }

    async fn cast(world: &World, voter: &Voter, candidate_id: Id) {
        let bearer = AuthToken::<Voter>::new(voter.id)
            .into_bearer(world.client.rocket().state::<Config>().unwrap());
        let body = format!(
            r#"{{"election_id":"{}","candidate_id":"{}","face_image":null,"session_id":null}}"#,
            world.election.id, candidate_id
        );
        let response = world
            .client
            .post("/api/vote")
            .header(ContentType::JSON)
            .header(Header::new(AUTH_HEADER, bearer))
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn results_reflect_ledger() {
        let world = world(5).await;
        // 3 votes for the first candidate, 1 for the second, 1 NOTA.
        for voter in &world.voters[..3] {
            cast(&world, voter, world.candidates[0].id).await;
        }
        cast(&world, &world.voters[3], world.candidates[1].id).await;
        cast(&world, &world.voters[4], nota_id()).await;

        let response = world
            .client
            .get(format!("/api/admin/results/{}", world.election.id))
            .header(Header::new(AUTH_HEADER, world.admin_bearer.clone()))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let results: ElectionResults = response.into_json().await.unwrap();
        assert_eq!(results.total_votes, 5);
        let sum: u64 = results.candidates.iter().map(|row| row.vote_count).sum();
        assert_eq!(sum, 5);
        assert_eq!(results.candidates[0].id, world.candidates[0].id);
        assert_eq!(results.candidates[0].vote_count, 3);
        // NOTA appears with its reserved name.
        assert!(results
            .candidates
            .iter()
            .any(|row| row.name == NOTA_NAME && row.vote_count == 1));
        // The zero-vote candidate still appears.
        assert!(results
            .candidates
            .iter()
            .any(|row| row.id == world.candidates[2].id && row.vote_count == 0));
    }

    #[rocket::async_test]
    async fn results_require_admin_rights() {
        let world = world(1).await;
        let voter_bearer = AuthToken::<Voter>::new(world.voters[0].id)
            .into_bearer(world.client.rocket().state::<Config>().unwrap());
        let response = world
            .client
            .get(format!("/api/admin/results/{}", world.election.id))
            .header(Header::new(AUTH_HEADER, voter_bearer))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn results_for_unknown_election() {
        let world = world(0).await;
        let response = world
            .client
            .get(format!("/api/admin/results/{}", Id::new()))
            .header(Header::new(AUTH_HEADER, world.admin_bearer.clone()))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn fraud_detection_below_threshold_reports_nothing() {
        let world = world(5).await;
        for voter in &world.voters {
            cast(&world, voter, world.candidates[0].id).await;
        }

        let response = world
            .client
            .get(format!("/api/admin/fraud/detect?election_id={}", world.election.id))
            .header(Header::new(AUTH_HEADER, world.admin_bearer.clone()))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let report: FraudReport = response.into_json().await.unwrap();
        assert!(report.suspicious_votes.is_empty());
        assert_eq!(report.analysis_metrics.total_analyzed, 5);
        assert_eq!(report.analysis_metrics.anomalies_found, 0);
    }

    #[rocket::async_test]
    async fn fraud_detection_is_seed_deterministic() {
        let world = world(20).await;
        for (i, voter) in world.voters.iter().enumerate() {
            cast(&world, voter, world.candidates[i % 3].id).await;
        }

        let url = format!(
            "/api/admin/fraud/detect?election_id={}&contamination=0.1&seed=7",
            world.election.id
        );
        let first: FraudReport = world
            .client
            .get(url.clone())
            .header(Header::new(AUTH_HEADER, world.admin_bearer.clone()))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        let second: FraudReport = world
            .client
            .get(url)
            .header(Header::new(AUTH_HEADER, world.admin_bearer.clone()))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(first.suspicious_votes, second.suspicious_votes);
        assert_eq!(first.analysis_metrics, second.analysis_metrics);
        assert_eq!(first.analysis_metrics.total_analyzed, 20);
        assert_eq!(first.analysis_metrics.anomalies_found, 2); // ceil(0.1 * 20)
    }

    #[rocket::async_test]
    async fn fraud_flags_accumulate_across_runs() {
        let world = world(20).await;
        for (i, voter) in world.voters.iter().enumerate() {
            cast(&world, voter, world.candidates[i % 3].id).await;
        }

        let url = format!(
            "/api/admin/fraud/detect?election_id={}&contamination=0.1",
            world.election.id
        );
        let first: FraudReport = world
            .client
            .get(url.clone())
            .header(Header::new(AUTH_HEADER, world.admin_bearer.clone()))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();

        // The run's flags were persisted.
        let flags = world.votes.flags().unwrap();
        assert_eq!(flags.len() as u64, first.analysis_metrics.anomalies_found);

        let second: FraudReport = world
            .client
            .get(url)
            .header(Header::new(AUTH_HEADER, world.admin_bearer.clone()))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();

        // A second run appends its own flags under a fresh run id; the
        // first run's flags are untouched.
        let flags = world.votes.flags().unwrap();
        assert_eq!(
            flags.len() as u64,
            first.analysis_metrics.anomalies_found + second.analysis_metrics.anomalies_found
        );
        let run_ids: HashSet<Id> = flags.iter().map(|flag| flag.run_id).collect();
        assert_eq!(run_ids.len(), 2);
        for run_id in run_ids {
            let per_run = flags.iter().filter(|flag| flag.run_id == run_id).count();
            assert_eq!(per_run as u64, first.analysis_metrics.anomalies_found);
        }
    }

    #[rocket::async_test]
    async fn fraud_detection_rejects_bad_contamination() {
        let world = world(0).await;
        let response = world
            .client
            .get("/api/admin/fraud/detect?contamination=0.9")
            .header(Header::new(AUTH_HEADER, world.admin_bearer.clone()))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }
}
