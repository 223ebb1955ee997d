//! Seed-deterministic fraud analysis over a ledger snapshot.
//!
//! Votes are turned into numeric feature vectors and scored with an
//! isolation forest; the top contamination fraction gets advisory flags.
//! Two runs over the same snapshot with the same parameters produce
//! identical scores and identical flag sets.

use std::collections::HashMap;

use chrono::{Timelike, Utc};
use isoforest::{Forest, Params};

use crate::error::{Error, Result};
use crate::model::{
    db::vote::{FlagReason, FraudFlag, Vote},
    db::voter::Voter,
    mongodb::Id,
};

/// Below this many votes the score distribution is too thin to separate
/// outliers from noise, so analysis reports no anomalies at all.
pub const MIN_VOTES_FOR_ANALYSIS: usize = 10;

/// Two casts from the same session fingerprint within this many seconds
/// count towards the burst feature.
const BURST_WINDOW_SECS: i64 = 600;

/// Inter-arrival gaps are capped here so one long pause cannot dominate
/// the feature scale.
const MAX_GAP_SECS: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisParams {
    /// Expected fraction of anomalous votes, in (0, 0.5].
    pub contamination: f64,
    pub trees: usize,
    pub sample_size: usize,
    /// RNG seed; fixed so that repeated runs are reproducible and
    /// comparable across time.
    pub seed: u64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            contamination: 0.05,
            trees: 100,
            sample_size: 256,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisMetrics {
    pub total_analyzed: u64,
    pub anomalies_found: u64,
    /// Mean isolation score over the whole snapshot.
    pub mean_score: f64,
    /// Mean isolation score of the flagged votes; 0 when nothing flagged.
    pub mean_flagged_score: f64,
    /// Gap between the flagged mean and the overall mean, clamped to
    /// [0, 1]. A wide gap means the outliers stand clearly apart.
    pub separation: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub run_id: Id,
    /// Flags in descending anomaly-score order.
    pub flags: Vec<FraudFlag>,
    pub metrics: AnalysisMetrics,
}

/// Run anomaly detection over a ledger snapshot.
///
/// `voters_by_id` supplies registration timestamps for the account-age
/// feature; votes whose voter is missing from the map fall back to a zero
/// age, which itself reads as unusual.
pub fn analyze(
    votes: &[Vote],
    voters_by_id: &HashMap<Id, Voter>,
    params: &AnalysisParams,
) -> Result<AnalysisOutcome> {
    if !(params.contamination > 0.0 && params.contamination <= 0.5) {
        return Err(Error::BadRequest(format!(
            "contamination must be in (0, 0.5], got {}",
            params.contamination
        )));
    }

    let run_id = Id::new();
    if votes.len() < MIN_VOTES_FOR_ANALYSIS {
        debug!(
            "fraud run {run_id}: only {} votes, below analysis threshold",
            votes.len()
        );
        return Ok(AnalysisOutcome {
            run_id,
            flags: Vec::new(),
            metrics: AnalysisMetrics {
                total_analyzed: votes.len() as u64,
                anomalies_found: 0,
                mean_score: 0.0,
                mean_flagged_score: 0.0,
                separation: 0.0,
            },
        });
    }

    let features = feature_matrix(votes, voters_by_id);
    let forest = Forest::fit(
        &features,
        &Params {
            trees: params.trees,
            sample_size: params.sample_size,
            seed: params.seed,
        },
    )
    .map_err(|err| Error::BadRequest(format!("fraud analysis parameters invalid: {err}")))?;
    let scores = forest
        .scores(&features)
        .map_err(|err| Error::Storage(format!("fraud scoring failed: {err}")))?;

    // Flag the top ceil(contamination * n) scores. Sorting indices rather
    // than scores keeps ties deterministic: equal scores break by vote
    // position in the snapshot.
    let flag_count = ((params.contamination * votes.len() as f64).ceil() as usize).min(votes.len());
    let mut order: Vec<usize> = (0..votes.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let flagged_at = Utc::now();
    let flags: Vec<FraudFlag> = order[..flag_count]
        .iter()
        .map(|&index| FraudFlag {
            vote_id: votes[index].id,
            voter_id: votes[index].voter_id,
            anomaly_score: scores[index],
            reason: FlagReason::IsolationOutlier,
            run_id,
            flagged_at,
        })
        .collect();

    let mean_score = scores.iter().sum::<f64>() / scores.len() as f64;
    let mean_flagged_score = if flags.is_empty() {
        0.0
    } else {
        flags.iter().map(|flag| flag.anomaly_score).sum::<f64>() / flags.len() as f64
    };
    let separation = (mean_flagged_score - mean_score).clamp(0.0, 1.0);

    info!(
        "fraud run {run_id}: analyzed {} votes, flagged {}",
        votes.len(),
        flags.len()
    );
    let anomalies_found = flags.len() as u64;
    Ok(AnalysisOutcome {
        run_id,
        flags,
        metrics: AnalysisMetrics {
            total_analyzed: votes.len() as u64,
            anomalies_found,
            mean_score,
            mean_flagged_score,
            separation,
        },
    })
}

/// One numeric row per vote. The features favour patterns that distinguish
/// scripted casting from humans: odd hours, brand-new accounts, rapid-fire
/// casts from one device fingerprint, and missing or weak face scores.
fn feature_matrix(votes: &[Vote], voters_by_id: &HashMap<Id, Voter>) -> Vec<Vec<f64>> {
    // Last cast time per session fingerprint, for inter-arrival gaps.
    let mut last_by_session: HashMap<&str, chrono::DateTime<Utc>> = HashMap::new();
    // Cast times per fingerprint within the trailing burst window.
    let mut recent_by_session: HashMap<&str, Vec<chrono::DateTime<Utc>>> = HashMap::new();

    votes
        .iter()
        .map(|vote| {
            let account_age_hours = voters_by_id
                .get(&vote.voter_id)
                .map(|voter| {
                    (vote.cast_at - voter.registered_at).num_seconds().max(0) as f64 / 3600.0
                })
                .unwrap_or(0.0);

            let time_of_day = vote.cast_at.hour() as f64
                + vote.cast_at.minute() as f64 / 60.0
                + vote.cast_at.second() as f64 / 3600.0;

            let (gap_secs, burst) = match vote.session_id.as_deref() {
                Some(session) => {
                    let gap = last_by_session
                        .get(session)
                        .map(|last| (vote.cast_at - *last).num_seconds().max(0) as f64)
                        .unwrap_or(MAX_GAP_SECS)
                        .min(MAX_GAP_SECS);
                    last_by_session.insert(session, vote.cast_at);

                    let recent = recent_by_session.entry(session).or_default();
                    recent.retain(|at| (vote.cast_at - *at).num_seconds() <= BURST_WINDOW_SECS);
                    recent.push(vote.cast_at);
                    (gap, recent.len() as f64)
                }
                None => (MAX_GAP_SECS, 1.0),
            };

            let (has_score, score) = match vote.face_match_score {
                Some(score) => (1.0, score),
                None => (0.0, 0.0),
            };

            vec![account_age_hours, time_of_day, gap_secs, burst, has_score, score]
        })
        .collect()
}
