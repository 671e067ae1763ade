// Matcher module: scoring of scraped candidates against a supplier description.

pub mod ranking;
pub mod scoring;
pub mod weights;

use crate::normalizer::Normalizer;
pub use weights::ScoringConfig;

/// Owns the scoring configuration and the per-run normalization caches.
pub struct Matcher {
    normalizer: Normalizer,
    config: ScoringConfig,
}

impl Matcher {
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            normalizer: Normalizer::new(),
            config,
        }
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}
