// Kaspi-specific search results parsing
use crate::model::{Candidate, ParserError};
use crate::utils::parse_price;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::cmp::Ordering;
use tracing::{debug, warn};

const PRODUCT_URL: &str = "https://kaspi.kz/shop/p";
pub const DEFAULT_RESULT_LIMIT: usize = 20;

pub trait Parser {
    fn parse(&self, html: &str) -> Result<Vec<Candidate>, ParserError>;
}

pub struct KaspiParser {
    limit: usize,
    /// Lower-cased terms; products mentioning one in category or title go first.
    priority_terms: Vec<String>,
}

impl KaspiParser {
    pub fn new(limit: usize, priority_terms: Vec<String>) -> Self {
        Self {
            limit,
            priority_terms,
        }
    }

    fn selector(css: &str) -> Result<Selector, ParserError> {
        Selector::parse(css).map_err(|e| ParserError::HtmlParseError(e.to_string()))
    }

    /// Products from the embedded Next.js state. `Ok(None)` when the page has
    /// no such state or it lists no products.
    fn parse_next_data(&self, document: &Html) -> Result<Option<Vec<Candidate>>, ParserError> {
        let script_selector = Self::selector("script#__NEXT_DATA__")?;
        let Some(script) = document.select(&script_selector).next() else {
            return Ok(None);
        };

        let data: Value = serde_json::from_str(&script.text().collect::<String>())?;
        let items = match data
            .pointer("/props/pageProps/initialData/data/products")
            .and_then(Value::as_array)
        {
            Some(items) if !items.is_empty() => items,
            _ => return Ok(None),
        };

        let products = items.iter().filter_map(candidate_from_json).collect();
        Ok(Some(products))
    }

    /// Fallback for pages rendered without the JSON state.
    fn parse_cards(&self, document: &Html) -> Result<Vec<Candidate>, ParserError> {
        let card_selector = Self::selector("div[data-product-id]")?;
        let title_selector = Self::selector("div[class*='item-card__name']")?;
        let price_selector = Self::selector("div[class*='item-card__price']")?;
        let category_selector = Self::selector("span[class*='item-card__category']")?;

        let mut products = Vec::new();
        for card in document.select(&card_selector) {
            let id = card.value().attr("data-product-id").unwrap_or("").trim();
            let title = card
                .select(&title_selector)
                .next()
                .map(element_text)
                .unwrap_or_default();
            let price = card
                .select(&price_selector)
                .find(|el| {
                    !el.value()
                        .attr("class")
                        .is_some_and(|c| c.contains("item-card__transfer"))
                })
                .and_then(|el| parse_price(&element_text(el)));
            let category = card
                .select(&category_selector)
                .next()
                .map(|el| element_text(el).to_lowercase())
                .unwrap_or_default();

            if id.is_empty() || title.is_empty() || price.is_none() {
                continue;
            }
            products.push(Candidate {
                id: id.to_string(),
                url: product_url(id),
                title,
                price,
                category,
                subcategory: None,
            });
        }
        Ok(products)
    }

    fn is_priority(&self, c: &Candidate) -> bool {
        let title = c.title.to_lowercase();
        self.priority_terms
            .iter()
            .any(|term| c.category.contains(term.as_str()) || title.contains(term.as_str()))
    }

    /// Keeps the first `limit` products, priority ones first, then cheapest first.
    fn order(&self, mut products: Vec<Candidate>) -> Vec<Candidate> {
        products.truncate(self.limit);
        products.sort_by(|a, b| match (self.is_priority(a), self.is_priority(b)) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.price.unwrap_or(0.0).total_cmp(&b.price.unwrap_or(0.0)),
        });
        products
    }
}

impl Default for KaspiParser {
    fn default() -> Self {
        Self::new(DEFAULT_RESULT_LIMIT, Vec::new())
    }
}

impl Parser for KaspiParser {
    fn parse(&self, html: &str) -> Result<Vec<Candidate>, ParserError> {
        let document = Html::parse_document(html);

        match self.parse_next_data(&document) {
            Ok(Some(products)) => {
                debug!("Parsed {} products from page state", products.len());
                return Ok(self.order(products));
            }
            Ok(None) => {}
            Err(e) => warn!("JSON parse error: {}", e),
        }

        let products = self.parse_cards(&document)?;
        debug!("Parsed {} products from product cards", products.len());
        Ok(self.order(products))
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn product_url(id: &str) -> String {
    format!("{}/{}/", PRODUCT_URL, id)
}

/// Entries without a title or category are not usable for matching.
fn candidate_from_json(item: &Value) -> Option<Candidate> {
    let id = match item.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let title = item.get("name")?.as_str()?.trim().to_string();
    let category = item
        .pointer("/category/name")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();
    if title.is_empty() || category.is_empty() {
        return None;
    }
    let subcategory = item
        .pointer("/category/parentCategory/name")
        .and_then(Value::as_str)
        .map(str::to_lowercase)
        .filter(|s| !s.is_empty());

    Some(Candidate {
        url: product_url(&id),
        id,
        title,
        price: item.get("price").and_then(Value::as_f64),
        category,
        subcategory,
    })
}
