use crate::matcher::Matcher;
use crate::matcher::weights::CategoryWeights;
use crate::model::Candidate;
use crate::normalizer::BrandModel;
use std::collections::BTreeSet;
use strsim::{normalized_levenshtein, sorensen_dice};

/// Character-level similarity on a 0..=100 scale.
pub fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

/// Bigram (Sørensen–Dice) similarity, forgiving single-character typos.
pub fn ngram_ratio(a: &str, b: &str) -> f64 {
    sorensen_dice(a, b) * 100.0
}

/// Compares the strings after sorting their tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Order- and duplicate-insensitive token similarity.
///
/// The shared tokens are compared against each side's shared+remaining
/// tokens and the best of the three pairings wins; when one side's tokens
/// are a subset of the other's the result is 100.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let common: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !common.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let sect = common.join(" ");
    let join = |rest: &[&str]| {
        if sect.is_empty() {
            rest.join(" ")
        } else {
            format!("{} {}", sect, rest.join(" "))
        }
    };
    let combined_a = join(only_a.as_slice());
    let combined_b = join(only_b.as_slice());

    let mut best = ratio(&combined_a, &combined_b);
    if !sect.is_empty() {
        best = best
            .max(ratio(&sect, &combined_a))
            .max(ratio(&sect, &combined_b));
    }
    best
}

/// Similarity of two optional fields; an unknown side scores 0.
fn field_ratio(a: Option<&str>, b: Option<&str>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => ratio(a, b),
        _ => 0.0,
    }
}

/// The five raw metrics between two normalized titles, each in 0..=100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub title: f64,
    pub brand: f64,
    pub model: f64,
    pub ngram: f64,
    pub token_sort: f64,
}

impl Metrics {
    pub fn compute(source: &str, target: &str, source_bm: &BrandModel, target_bm: &BrandModel) -> Self {
        Self {
            title: token_set_ratio(source, target),
            brand: field_ratio(source_bm.brand.as_deref(), target_bm.brand.as_deref()),
            model: field_ratio(source_bm.model.as_deref(), target_bm.model.as_deref()),
            ngram: ngram_ratio(source, target),
            token_sort: token_sort_ratio(source, target),
        }
    }

    /// Raw weighted sum; may exceed 100 because weights are not normalized.
    pub fn weighted(&self, w: &CategoryWeights) -> f64 {
        w.title * self.title
            + w.brand * self.brand
            + w.model * self.model
            + w.ngram * self.ngram
            + w.token_sort * self.token_sort
    }
}

impl Matcher {
    /// Similarity of `candidate` to the supplier description `source_title`.
    ///
    /// Order of adjustments: weighted sum, full brand+model bonus, clamp to
    /// `max_score`, category-mismatch multiplier. Bonus and multiplier only
    /// apply when the candidate carries a category. Empty titles score 0.
    pub fn score(&mut self, source_title: &str, candidate: &Candidate) -> f64 {
        if source_title.trim().is_empty() || candidate.title.trim().is_empty() {
            return 0.0;
        }

        let source = self.normalizer.normalize(source_title);
        let target = self.normalizer.normalize(&candidate.title);
        if source.is_empty() || target.is_empty() {
            return 0.0;
        }

        let source_bm = self.normalizer.brand_model(&source);
        let target_bm = self.normalizer.brand_model(&target);
        let category = candidate.category.to_lowercase();
        let weights = self.config.weights_for(&category);

        let metrics = Metrics::compute(&source, &target, &source_bm, &target_bm);
        let mut score = metrics.weighted(&weights);

        if !category.is_empty() && source_bm.same_product(&target_bm) {
            score *= self.config.full_match_bonus;
        }
        score = score.min(self.config.max_score);
        if !category.is_empty() {
            score *= self
                .config
                .mismatch_multiplier(source_bm.brand.as_deref(), &category);
        }

        score
    }
}
