use serde::Deserialize;
use std::collections::HashMap;

/// Multipliers for the five similarity metrics. They do not have to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CategoryWeights {
    pub title: f64,
    pub brand: f64,
    pub model: f64,
    pub ngram: f64,
    pub token_sort: f64,
}

impl CategoryWeights {
    pub const DEFAULT: CategoryWeights = CategoryWeights {
        title: 0.5,
        brand: 0.3,
        model: 0.2,
        ngram: 0.1,
        token_sort: 0.2,
    };

    /// Электроника: модель важнее общего названия.
    pub const ELECTRONICS: CategoryWeights = CategoryWeights {
        title: 0.4,
        brand: 0.3,
        model: 0.3,
        ngram: 0.2,
        token_sort: 0.2,
    };
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// When the source's brand token starts with `source_brand` (a word stem,
/// so inflected forms match), candidates whose category lacks
/// `category_term` are scaled by `multiplier`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryRule {
    pub source_brand: String,
    pub category_term: String,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub default_weights: CategoryWeights,
    pub category_weights: HashMap<String, CategoryWeights>,
    pub category_rules: Vec<CategoryRule>,
    pub full_match_bonus: f64,
    pub max_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut category_weights = HashMap::new();
        category_weights.insert("электроника".to_string(), CategoryWeights::ELECTRONICS);

        Self {
            default_weights: CategoryWeights::DEFAULT,
            category_weights,
            category_rules: vec![CategoryRule {
                source_brand: "водонагревател".to_string(),
                category_term: "водонагревател".to_string(),
                multiplier: 0.5,
            }],
            full_match_bonus: 1.2,
            max_score: 100.0,
        }
    }
}

impl ScoringConfig {
    /// Case-insensitive lookup; unknown categories get the default profile.
    pub fn weights_for(&self, category: &str) -> CategoryWeights {
        let category = category.to_lowercase();
        self.category_weights
            .iter()
            .find(|(name, _)| name.to_lowercase() == category)
            .map(|(_, weights)| *weights)
            .unwrap_or(self.default_weights)
    }

    /// Combined multiplier of every rule triggered by the source brand and
    /// not satisfied by the candidate category. 1.0 when nothing fires.
    pub fn mismatch_multiplier(&self, source_brand: Option<&str>, category: &str) -> f64 {
        let Some(brand) = source_brand else {
            return 1.0;
        };
        let brand = brand.to_lowercase();
        let category = category.to_lowercase();

        self.category_rules
            .iter()
            .filter(|rule| brand.starts_with(&rule.source_brand.to_lowercase()))
            .filter(|rule| !category.contains(&rule.category_term.to_lowercase()))
            .map(|rule| rule.multiplier)
            .product()
    }

    /// Category terms that the results parser should list first.
    pub fn priority_terms(&self) -> Vec<String> {
        self.category_rules
            .iter()
            .map(|rule| rule.category_term.to_lowercase())
            .collect()
    }
}
