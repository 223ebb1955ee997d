use std::io::Cursor;

use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::{ContentType, Status},
    response::Responder,
    serde::json::json,
    Response,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while handling a request.
///
/// The variants mirror the error taxonomy of the API: validation failures,
/// auth failures, election-state failures, the duplicate-vote conflict, and
/// fatal storage failures. Gateway degradation is deliberately absent: a
/// face-verification timeout is logged and the vote proceeds without a
/// score, so it never surfaces as an error.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or inconsistent request, rejected before touching the ledger.
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// Missing or invalid bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Valid token, but the action is not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// The election exists but its voting window is not open.
    #[error("Election is not active: {0}")]
    NotActive(String),
    /// This voter has already voted in this election. Reported distinctly
    /// so clients never tell the user to "try again".
    #[error("You have already voted in this election")]
    DuplicateVote,
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Db(#[from] DbError),
    /// Fatal storage failure. Nothing was persisted; retrying is safe
    /// because the duplicate check is idempotent.
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl Error {
    /// The HTTP status this error responds with.
    pub fn status(&self) -> Status {
        match self {
            Self::BadRequest(_) | Self::NotActive(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Forbidden(_) | Self::DuplicateVote => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::Jwt(_) => Status::Unauthorized,
            Self::Db(_) | Self::Storage(_) => Status::InternalServerError,
        }
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{what}"))
    }
}

/// Respond with the appropriate status and a JSON `detail` body, which is
/// the single human-readable reason the front end displays.
impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        match status.class() {
            rocket::http::StatusClass::ServerError => error!("{self}"),
            _ => warn!("{self}"),
        }
        let body = json!({ "detail": self.to_string() }).to_string();
        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
