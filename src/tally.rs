//! Deterministic vote tallying.
//!
//! Tallies are always derived from the ledger on demand; no running
//! counters exist anywhere, so the count can never drift from the votes.

use std::collections::HashMap;

use crate::model::{common::election::nota_id, db::candidate::Candidate, db::vote::Vote, mongodb::Id};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub total_votes: u64,
    /// Rankings in final display order: descending by count, ties broken
    /// by candidate registration order, NOTA after all real candidates.
    pub rankings: Vec<CandidateCount>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateCount {
    pub candidate_id: Id,
    pub count: u64,
}

/// Tally the given ledger snapshot against the election's candidate list.
///
/// `candidates` must be in registration order; that order is the tie-break.
/// Every registered candidate appears in the result even with zero votes.
/// Votes for ids no longer registered (a candidate removed mid-election)
/// still count and rank after NOTA, ordered by id, so the totals invariant
/// `total == sum(counts) == snapshot.len()` always holds.
pub fn tally_votes(candidates: &[Candidate], votes: &[Vote]) -> Tally {
    let mut counts: HashMap<Id, u64> = HashMap::new();
    for vote in votes {
        *counts.entry(vote.candidate_id).or_default() += 1;
    }

    // Tie-break rank: registration index, then NOTA, then unknown ids.
    let registered: HashMap<Id, usize> = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| (candidate.id, index))
        .collect();
    let nota = nota_id();

    let mut rankings: Vec<CandidateCount> = candidates
        .iter()
        .map(|candidate| CandidateCount {
            candidate_id: candidate.id,
            count: counts.get(&candidate.id).copied().unwrap_or(0),
        })
        .collect();
    rankings.push(CandidateCount {
        candidate_id: nota,
        count: counts.get(&nota).copied().unwrap_or(0),
    });
    let mut unknown: Vec<CandidateCount> = counts
        .iter()
        .filter(|(id, _)| **id != nota && !registered.contains_key(id))
        .map(|(id, count)| CandidateCount {
            candidate_id: *id,
            count: *count,
        })
        .collect();
    unknown.sort_by_key(|row| row.candidate_id.to_string());
    rankings.extend(unknown);

    let rank = |id: &Id| -> (usize, usize) {
        match registered.get(id) {
            Some(index) => (0, *index),
            None if *id == nota => (1, 0),
            None => (2, 0),
        }
    };
    // Stable sort: equal counts keep the registration/NOTA/unknown order
    // established above.
    rankings.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| rank(&a.candidate_id).cmp(&rank(&b.candidate_id)))
    });

    Tally {
        total_votes: votes.len() as u64,
        rankings,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::model::db::vote::{NewVote, Vote};

    use super::*;

    fn vote_for(candidate_id: Id) -> Vote {
        Vote {
            id: Id::new(),
            vote: NewVote {
                voter_id: Id::new(),
                election_id: Id::new(),
                candidate_id,
                cast_at: Utc::now(),
                face_match_score: None,
                session_id: None,
            },
        }
    }

    fn candidates(n: usize) -> Vec<Candidate> {
        (0..n)
            .map(|i| Candidate::example(Id::new(), &format!("Candidate {i}"), "Party"))
            .collect()
    }

    #[test]
    fn counts_add_up() {
        let cands = candidates(3);
        let mut votes = Vec::new();
        for _ in 0..5 {
            votes.push(vote_for(cands[0].id));
        }
        for _ in 0..3 {
            votes.push(vote_for(cands[2].id));
        }
        votes.push(vote_for(nota_id()));

        let tally = tally_votes(&cands, &votes);
        assert_eq!(tally.total_votes, 9);
        let sum: u64 = tally.rankings.iter().map(|row| row.count).sum();
        assert_eq!(sum, 9);
        assert_eq!(tally.rankings[0].candidate_id, cands[0].id);
        assert_eq!(tally.rankings[0].count, 5);
        // Zero-vote candidates still appear.
        assert!(tally
            .rankings
            .iter()
            .any(|row| row.candidate_id == cands[1].id && row.count == 0));
    }

    #[test]
    fn ties_break_by_registration_order() {
        let cands = candidates(3);
        let votes = vec![
            vote_for(cands[2].id),
            vote_for(cands[0].id),
            vote_for(cands[1].id),
        ];
        let tally = tally_votes(&cands, &votes);
        let order: Vec<Id> = tally.rankings.iter().map(|row| row.candidate_id).collect();
        assert_eq!(order, vec![cands[0].id, cands[1].id, cands[2].id, nota_id()]);
    }

    #[test]
    fn nota_ranks_after_real_candidates_on_ties() {
        let cands = candidates(1);
        let votes = vec![vote_for(cands[0].id), vote_for(nota_id())];
        let tally = tally_votes(&cands, &votes);
        assert_eq!(tally.rankings[0].candidate_id, cands[0].id);
        assert_eq!(tally.rankings[1].candidate_id, nota_id());

        // But NOTA can win outright.
        let votes = vec![vote_for(nota_id()), vote_for(nota_id()), vote_for(cands[0].id)];
        let tally = tally_votes(&cands, &votes);
        assert_eq!(tally.rankings[0].candidate_id, nota_id());
        assert_eq!(tally.rankings[0].count, 2);
    }

    #[test]
    fn removed_candidate_votes_still_count() {
        let cands = candidates(1);
        let ghost = Id::new();
        let votes = vec![vote_for(ghost), vote_for(cands[0].id)];
        let tally = tally_votes(&cands, &votes);
        assert_eq!(tally.total_votes, 2);
        let sum: u64 = tally.rankings.iter().map(|row| row.count).sum();
        assert_eq!(sum, 2);
        // Tied with a registered candidate, the ghost ranks last.
        assert_eq!(tally.rankings.last().unwrap().candidate_id, ghost);
    }

    #[test]
    fn deterministic_across_runs() {
        let cands = candidates(4);
        let votes: Vec<Vote> = (0..20)
            .map(|i| vote_for(cands[i % 4].id))
            .collect();
        let first = tally_votes(&cands, &votes);
        let second = tally_votes(&cands, &votes);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_snapshot() {
        let cands = candidates(2);
        let tally = tally_votes(&cands, &[]);
        assert_eq!(tally.total_votes, 0);
        assert_eq!(tally.rankings.len(), 3); // 2 candidates + NOTA
        assert!(tally.rankings.iter().all(|row| row.count == 0));
    }
}
