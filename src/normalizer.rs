use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

static PUNCTUATION_REGEX: OnceLock<Regex> = OnceLock::new();
static UNIT_REGEXES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

fn punctuation_regex() -> &'static Regex {
    PUNCTUATION_REGEX.get_or_init(|| Regex::new(r"[^\w\s-]").expect("punctuation regex"))
}

fn unit_regexes() -> &'static [(Regex, &'static str)] {
    UNIT_REGEXES.get_or_init(|| {
        vec![
            (Regex::new(r"(\d+)\s*(?:gb|гб)").expect("gb regex"), "${1}gb"),
            (Regex::new(r"(\d+)\s*(?:tb|тб)").expect("tb regex"), "${1}tb"),
            (Regex::new(r"(\d+)\s*(?:ml|мл)").expect("ml regex"), "${1}ml"),
        ]
    })
}

/// Canonical lowercase form of a title or query.
///
/// Punctuation becomes whitespace and whitespace is collapsed before the
/// unit suffixes are glued to their numbers, so `"16 / ГБ"` and `"16GB"` end
/// up identical and a second pass never changes the result.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = punctuation_regex().replace_all(lowered.trim(), " ");
    let mut result = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    for (regex, replacement) in unit_regexes() {
        result = regex.replace_all(&result, *replacement).into_owned();
    }

    result
}

/// Coarse identity of a product title. `None` means "unknown", never a token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrandModel {
    pub brand: Option<String>,
    pub model: Option<String>,
}

impl BrandModel {
    /// True only when both sides know brand and model and they agree.
    pub fn same_product(&self, other: &BrandModel) -> bool {
        matches!(
            (&self.brand, &other.brand, &self.model, &other.model),
            (Some(b1), Some(b2), Some(m1), Some(m2)) if b1 == b2 && m1 == m2
        )
    }
}

/// Brand is the first token; model collects tokens 2 and 3 that look like
/// model designators (contain a digit or have at least four characters).
pub fn extract_brand_model(title: &str) -> BrandModel {
    let normalized = normalize(title);
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let Some(brand) = words.first() else {
        return BrandModel::default();
    };

    let model_words: Vec<&str> = words
        .iter()
        .skip(1)
        .take(2)
        .filter(|w| w.chars().any(|c| c.is_ascii_digit()) || w.chars().count() >= 4)
        .copied()
        .collect();

    BrandModel {
        brand: Some((*brand).to_string()),
        model: if model_words.is_empty() {
            None
        } else {
            Some(model_words.join(" "))
        },
    }
}

/// Memoizing front-end for [`normalize`] and [`extract_brand_model`].
///
/// Entries are keyed by the exact input string and never evicted; one
/// instance is owned per run and must not be shared between workers.
#[derive(Debug, Default)]
pub struct Normalizer {
    texts: HashMap<String, String>,
    brand_models: HashMap<String, BrandModel>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&mut self, text: &str) -> String {
        if let Some(cached) = self.texts.get(text) {
            return cached.clone();
        }
        let result = normalize(text);
        self.texts.insert(text.to_string(), result.clone());
        result
    }

    pub fn brand_model(&mut self, title: &str) -> BrandModel {
        if let Some(cached) = self.brand_models.get(title) {
            return cached.clone();
        }
        let result = extract_brand_model(title);
        self.brand_models.insert(title.to_string(), result.clone());
        result
    }

    /// Number of memoized normalizations and extractions.
    pub fn cached_entries(&self) -> (usize, usize) {
        (self.texts.len(), self.brand_models.len())
    }
}
