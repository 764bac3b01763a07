use super::super::domain::{Criteria, PollOutcome};

/// Running affirmative score after one more ballot.
pub(crate) fn accumulate(score: u32, criteria: &Criteria) -> u32 {
    score.saturating_add(criteria.affirmative_count())
}

/// Converts a final score into a binary decision against the caller-supplied bar.
pub(crate) fn decide(score: u32, threshold: u32) -> PollOutcome {
    if score >= threshold {
        PollOutcome::Approved
    } else {
        PollOutcome::Rejected
    }
}

/// Highest score attainable with `ballots` ballots cast.
pub fn max_score(ballots: usize) -> u32 {
    (ballots as u32).saturating_mul(super::super::domain::CRITERIA_COUNT as u32)
}
