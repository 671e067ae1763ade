use crate::model::{Candidate, SearchError, Specs};

/// Looks up marketplace listings for one query.
///
/// "No results" is `Ok(vec![])`; `Err` is reserved for transport or page
/// failures, which callers treat as an empty result for that query.
#[async_trait::async_trait]
pub trait Searcher: Send + Sync {
    async fn search(&self, query: &str, specs: &Specs) -> Result<Vec<Candidate>, SearchError>;
}
