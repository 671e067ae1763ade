use crate::matcher::Matcher;
use crate::model::{Candidate, ScoredCandidate};

pub const DEFAULT_TOP_N: usize = 5;

impl Matcher {
    /// Scores every candidate and returns the best `top_n`, highest first.
    /// Candidates with equal scores keep their original relative order.
    pub fn rank(&mut self, source_title: &str, candidates: &[Candidate], top_n: usize) -> Vec<ScoredCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ScoredCandidate> = candidates
            .iter()
            .map(|c| ScoredCandidate {
                score: self.score(source_title, c),
                candidate: c.clone(),
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_n);
        scored
    }
}
