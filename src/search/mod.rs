//! Evidence search: client trait, Perplexity backend, query template, cache

mod cache;
mod client;
mod perplexity;
mod query;

pub use cache::SearchCache;
pub use client::{SearchClient, SearchHit, StaticSearchClient};
pub use perplexity::PerplexityClient;
pub use query::{build_search_query, panel_condition};
