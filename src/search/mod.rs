pub mod fetcher;
#[cfg(test)]
pub mod mock;
pub mod traits;

pub use fetcher::KaspiFetcher;
pub use traits::Searcher;
