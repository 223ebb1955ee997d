use rocket::{serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::Result;
use crate::model::{
    api::{
        auth::AuthToken,
        vote::{VoteReceipt, VoteRequest, VoteStatus},
    },
    db::voter::Voter,
    mongodb::Id,
};
use crate::Core;

pub fn routes() -> Vec<Route> {
    routes![cast_vote, vote_status]
}

/// Cast a vote as the authenticated voter. The voter identity comes from
/// the token, never from the request body.
#[post("/vote", data = "<ballot>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    ballot: Json<VoteRequest>,
    core: &State<Core>,
    config: &State<Config>,
) -> Result<Json<VoteReceipt>> {
    let vote = core
        .ledger()
        .cast_vote(token.id, &ballot, &config.vote_policy())
        .await?;
    Ok(Json(VoteReceipt::from(&vote)))
}

/// Has the authenticated voter already voted in the given election?
/// Answered from the ledger, so a recorded vote is always reflected here.
#[get("/vote/status/<election_id>")]
async fn vote_status(
    token: AuthToken<Voter>,
    election_id: Id,
    core: &State<Core>,
) -> Result<Json<VoteStatus>> {
    let has_voted = core.ledger().has_voted(token.id, election_id).await?;
    Ok(Json(VoteStatus { has_voted }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::Client,
    };

    use crate::gateway::stubs::StaticGateway;
    use crate::model::{
        api::auth::AUTH_HEADER,
        db::{candidate::Candidate, election::Election},
    };
    use crate::store::{MemoryRegistry, MemoryVoteStore};

    use super::*;

    struct World {
        client: Client,
        election: Election,
        candidate: Candidate,
        voter: Voter,
        bearer: String,
    }

    async fn world() -> World {
        let registry = Arc::new(MemoryRegistry::new());
        let election = Election::example_active();
        let candidate = Candidate::example(election.id, "Maya Singh", "Unity");
        let voter = Voter::example();
        registry.add_election(election.clone());
        registry.add_candidate(candidate.clone());
        registry.add_voter(voter.clone());

        let core = Core::new(
            Arc::new(MemoryVoteStore::new()),
            registry,
            Arc::new(StaticGateway(0.9)),
        );
        let client = crate::test_client(core).await;
        let bearer = AuthToken::<Voter>::new(voter.id)
            .into_bearer(client.rocket().state::<Config>().unwrap());
        World {
            client,
            election,
            candidate,
            voter,
            bearer,
        }
    }

    fn ballot_json(world: &World) -> String {
        format!(
            r#"{{"election_id":"{}","candidate_id":"{}","face_image":null,"session_id":"device-1"}}"#,
            world.election.id, world.candidate.id
        )
    }

    #[rocket::async_test]
    async fn cast_then_status_then_duplicate() {
        let world = world().await;

        let status = world
            .client
            .get(format!("/api/vote/status/{}", world.election.id))
            .header(Header::new(AUTH_HEADER, world.bearer.clone()))
            .dispatch()
            .await;
        assert_eq!(status.status(), Status::Ok);
        let body: VoteStatus = status.into_json().await.unwrap();
        assert!(!body.has_voted);

        let response = world
            .client
            .post("/api/vote")
            .header(ContentType::JSON)
            .header(Header::new(AUTH_HEADER, world.bearer.clone()))
            .body(ballot_json(&world))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        let receipt: VoteReceipt = response.into_json().await.unwrap();
        assert!(receipt.success);

        let status = world
            .client
            .get(format!("/api/vote/status/{}", world.election.id))
            .header(Header::new(AUTH_HEADER, world.bearer.clone()))
            .dispatch()
            .await;
        let body: VoteStatus = status.into_json().await.unwrap();
        assert!(body.has_voted);

        // An identical retry is rejected with a distinct duplicate error.
        let retry = world
            .client
            .post("/api/vote")
            .header(ContentType::JSON)
            .header(Header::new(AUTH_HEADER, world.bearer.clone()))
            .body(ballot_json(&world))
            .dispatch()
            .await;
        assert_eq!(retry.status(), Status::Forbidden);
        let detail = retry.into_string().await.unwrap();
        assert!(detail.contains("already voted"), "unexpected body: {detail}");
    }

    #[rocket::async_test]
    async fn voting_requires_a_token() {
        let world = world().await;
        let response = world
            .client
            .post("/api/vote")
            .header(ContentType::JSON)
            .body(ballot_json(&world))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn unknown_election_is_not_found() {
        let world = world().await;
        let body = format!(
            r#"{{"election_id":"{}","candidate_id":"{}","face_image":null,"session_id":null}}"#,
            Id::new(),
            world.candidate.id
        );
        let response = world
            .client
            .post("/api/vote")
            .header(ContentType::JSON)
            .header(Header::new(AUTH_HEADER, world.bearer.clone()))
            .body(body)
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn admin_token_cannot_vote() {
        let world = world().await;
        let bearer = AuthToken::<crate::model::api::auth::Admin>::new(world.voter.id)
            .into_bearer(world.client.rocket().state::<Config>().unwrap());
        let response = world
            .client
            .post("/api/vote")
            .header(ContentType::JSON)
            .header(Header::new(AUTH_HEADER, bearer))
            .body(ballot_json(&world))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);
    }
}
