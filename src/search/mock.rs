// In-memory searcher for tests
use crate::model::{Candidate, SearchError, Specs};
use crate::search::traits::Searcher;
use std::collections::HashMap;
use std::sync::Mutex;

enum Response {
    Products(Vec<Candidate>),
    Fail,
}

/// Answers from a fixed table; unknown queries return no products.
#[derive(Default)]
pub struct MockSearcher {
    responses: HashMap<String, Response>,
    calls: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(mut self, query: &str, products: Vec<Candidate>) -> Self {
        self.responses.insert(query.to_string(), Response::Products(products));
        self
    }

    pub fn failing(mut self, query: &str) -> Self {
        self.responses.insert(query.to_string(), Response::Fail);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Searcher for MockSearcher {
    async fn search(&self, query: &str, _specs: &Specs) -> Result<Vec<Candidate>, SearchError> {
        self.calls.lock().unwrap().push(query.to_string());
        match self.responses.get(query) {
            Some(Response::Products(products)) => Ok(products.clone()),
            Some(Response::Fail) => Err(SearchError::Timeout),
            None => Ok(Vec::new()),
        }
    }
}

pub fn candidate(id: &str, title: &str, price: f64, category: &str) -> Candidate {
    Candidate {
        id: id.to_string(),
        title: title.to_string(),
        price: Some(price),
        url: format!("https://kaspi.kz/shop/p/{}/", id),
        category: category.to_string(),
        subcategory: None,
    }
}
