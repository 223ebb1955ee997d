use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fraud::AnalysisOutcome;
use crate::model::{db::vote::Vote, mongodb::Id};

/// Fraud analysis report, shaped for the admin console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudReport {
    pub suspicious_votes: Vec<SuspiciousVote>,
    pub analysis_metrics: AnalysisMetricsDesc,
}

/// A flagged vote. Advisory only: flagging never blocks or retracts the
/// underlying vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspiciousVote {
    pub user_id: Id,
    pub timestamp: DateTime<Utc>,
    pub session_id: Option<String>,
}

/// Descriptive score summaries for display. These are confidence figures
/// about the score distribution, not assertions of actual fraud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetricsDesc {
    pub total_analyzed: u64,
    pub anomalies_found: u64,
    /// Mean anomaly score of the flagged votes (0 when nothing is flagged).
    pub accuracy_score: f64,
    /// Separation between the flagged mean and the overall mean score,
    /// clamped to [0, 1]. Wider separation reads as higher confidence.
    pub confidence_level: f64,
}

impl FraudReport {
    /// Assemble the report from an analysis outcome and the snapshot it ran
    /// over. Flag order is preserved (most anomalous first).
    pub fn from_outcome(outcome: &AnalysisOutcome, snapshot: &[Vote]) -> Self {
        let suspicious_votes = outcome
            .flags
            .iter()
            .filter_map(|flag| {
                snapshot
                    .iter()
                    .find(|vote| vote.id == flag.vote_id)
                    .map(|vote| SuspiciousVote {
                        user_id: vote.voter_id,
                        timestamp: vote.cast_at,
                        session_id: vote.session_id.clone(),
                    })
            })
            .collect();
        Self {
            suspicious_votes,
            analysis_metrics: AnalysisMetricsDesc {
                total_analyzed: outcome.metrics.total_analyzed,
                anomalies_found: outcome.metrics.anomalies_found,
                accuracy_score: outcome.metrics.mean_flagged_score,
                confidence_level: outcome.metrics.separation,
            },
        }
    }
}
