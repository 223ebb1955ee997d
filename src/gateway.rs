//! Adapter for the external face verification gateway.
//!
//! The gateway owns the biometric matching model; this crate only sends it
//! a stored template plus a freshly captured image and reads back a
//! similarity score. Every call is bounded by a hard timeout, and every
//! failure is soft: the ledger records the vote without a score.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("face verification gateway timed out")]
    Timeout,
    #[error("face verification gateway unavailable: {0}")]
    Unavailable(String),
}

/// The verification contract. `verify` returns a similarity score in
/// `[0, 1]`; anything else is a [`GatewayError`] and the caller degrades
/// gracefully.
#[rocket::async_trait]
pub trait FaceGateway: Send + Sync {
    async fn verify(&self, template: &[f64], image: &str) -> Result<f64, GatewayError>;
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    template: &'a [f64],
    image: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    similarity: f64,
}

/// HTTP gateway client with a hard per-request timeout.
pub struct HttpFaceGateway {
    client: reqwest::Client,
    url: String,
}

impl HttpFaceGateway {
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[rocket::async_trait]
impl FaceGateway for HttpFaceGateway {
    async fn verify(&self, template: &[f64], image: &str) -> Result<f64, GatewayError> {
        let response = self
            .client
            .post(&self.url)
            .json(&VerifyRequest { template, image })
            .send()
            .await
            .map_err(classify)?;
        let response = response
            .error_for_status()
            .map_err(classify)?
            .json::<VerifyResponse>()
            .await
            .map_err(classify)?;
        Ok(response.similarity.clamp(0.0, 1.0))
    }
}

fn classify(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}

/// Stand-in used when no gateway is configured. Always fails soft, so
/// deployments without a biometric model still record votes.
pub struct NullFaceGateway;

#[rocket::async_trait]
impl FaceGateway for NullFaceGateway {
    async fn verify(&self, _template: &[f64], _image: &str) -> Result<f64, GatewayError> {
        Err(GatewayError::Unavailable(
            "no gateway configured".to_string(),
        ))
    }
}

/// Gateway stubs for tests.
#[cfg(test)]
pub mod stubs {
    use super::*;

    /// Always answers with the same similarity score.
    pub struct StaticGateway(pub f64);

    #[rocket::async_trait]
    impl FaceGateway for StaticGateway {
        async fn verify(&self, _template: &[f64], _image: &str) -> Result<f64, GatewayError> {
            Ok(self.0)
        }
    }

    /// Simulates an unreachable gateway: every call times out.
    pub struct TimeoutGateway;

    #[rocket::async_trait]
    impl FaceGateway for TimeoutGateway {
        async fn verify(&self, _template: &[f64], _image: &str) -> Result<f64, GatewayError> {
            Err(GatewayError::Timeout)
        }
    }
}
