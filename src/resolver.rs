use crate::filters::extract_specs;
use crate::matcher::Matcher;
use crate::matcher::ranking::DEFAULT_TOP_N;
use crate::model::{MatchStatus, RowResult, ScoredCandidate, SearchError};
use crate::search::Searcher;
use tracing::{debug, info, warn};

/// Segment tokens that mark a `/`-separated part as a useful search spec.
const SPEC_KEYWORDS: [&str; 10] = [
    "gb", "гб", "tb", "тб", "core", "ryzen", "radeon", "geforce", "rtx", "gtx",
];

/// Builds the search queries to try for one supplier description, most
/// specific first. Duplicates are dropped, order is kept.
pub fn build_variants(query: &str) -> Vec<String> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    let mut variants: Vec<String> = Vec::new();
    let mut push = |variant: String| {
        if !variant.is_empty() && !variants.contains(&variant) {
            variants.push(variant);
        }
    };

    let parts: Vec<&str> = query.split('/').map(str::trim).collect();
    let base = parts[0];

    if parts.len() >= 2 {
        let specs: Vec<&str> = parts[1..]
            .iter()
            .copied()
            .filter(|part| {
                let lower = part.to_lowercase();
                SPEC_KEYWORDS.iter().any(|k| lower.contains(k))
            })
            .take(2)
            .collect();
        if !specs.is_empty() {
            push(format!("{} {}", base, specs.join(" ")).trim().to_string());
        }
        push(base.to_string());
    } else {
        push(query.to_string());
    }

    let words: Vec<&str> = base.split_whitespace().collect();
    if words.len() >= 2 {
        push(format!("{} {}", words[0], words[1]));
    }

    variants
}

/// Drives the per-row search: tries each query variant against the searcher
/// and keeps the best ranked candidate seen.
pub struct Resolver<S: Searcher> {
    searcher: S,
    matcher: Matcher,
    confident_threshold: f64,
    top_n: usize,
}

impl<S: Searcher> Resolver<S> {
    pub fn new(searcher: S, matcher: Matcher, confident_threshold: f64) -> Self {
        Self {
            searcher,
            matcher,
            confident_threshold,
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n.max(1);
        self
    }

    pub fn searcher(&self) -> &S {
        &self.searcher
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// One search for the whole query, ranked. Search errors are returned
    /// to the caller instead of being skipped.
    pub async fn top_matches(&mut self, raw_query: &str) -> Result<Vec<ScoredCandidate>, SearchError> {
        let query = raw_query.trim();
        let specs = extract_specs(query);
        info!("Extracted specs: {}", specs);
        let products = self.searcher.search(query, &specs).await?;
        info!("Found {} products", products.len());
        Ok(self.matcher.rank(query, &products, self.top_n))
    }

    /// Resolves one spreadsheet cell. The result keeps the cell text as given.
    pub async fn resolve(&mut self, raw_query: &str) -> RowResult {
        let query = raw_query.trim();
        if query.is_empty() {
            return RowResult::not_found(raw_query);
        }

        let variants = build_variants(query);
        let specs = extract_specs(query);
        info!("Search variants: {:?}", variants);
        info!("Extracted specs: {}", specs);

        let mut best: Option<ScoredCandidate> = None;
        for variant in &variants {
            info!("Trying variant: {}", variant);
            let products = match self.searcher.search(variant, &specs).await {
                Ok(products) => products,
                Err(e) => {
                    warn!("Search failed for variant '{}': {}", variant, e);
                    continue;
                }
            };
            info!("Found {} products", products.len());
            if products.is_empty() {
                continue;
            }

            let ranked = self.matcher.rank(query, &products, self.top_n);
            if let Some(top) = ranked.into_iter().next() {
                let improves = best.as_ref().is_none_or(|b| top.score > b.score);
                if improves {
                    info!(
                        "New best match: {} | score {:.2} | id {} | price {:?}",
                        top.candidate.title, top.score, top.candidate.id, top.candidate.price
                    );
                    best = Some(top);
                } else {
                    debug!("Variant '{}' did not improve on the best score", variant);
                }
            }

            if best
                .as_ref()
                .is_some_and(|b| b.score >= self.confident_threshold)
            {
                break;
            }
        }

        self.classify(raw_query, best)
    }

    fn classify(&self, query: &str, best: Option<ScoredCandidate>) -> RowResult {
        let Some(best) = best else {
            return RowResult::not_found(query);
        };
        let status = if best.score >= self.confident_threshold {
            MatchStatus::Found
        } else if best.score > 0.0 {
            MatchStatus::Possible
        } else {
            MatchStatus::NotFound
        };
        RowResult {
            query: query.to_string(),
            best_id: Some(best.candidate.id),
            best_title: Some(best.candidate.title),
            best_price: best.candidate.price,
            score: Some(best.score),
            url: Some(best.candidate.url),
            status,
        }
    }
}
