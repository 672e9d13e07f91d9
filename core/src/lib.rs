//! In-memory catalog search: incremental inverted index with TF-IDF ranking,
//! filters, facets and prefix suggestions, plus offline evaluation helpers.

pub mod config;
pub mod document;
pub mod error;
pub mod experiment;
pub mod facets;
pub mod filter;
pub mod index;
pub mod metrics;
pub mod persist;
pub mod postings;
pub mod scorer;
pub mod tokenizer;

pub use config::SearchConfig;
pub use document::{Document, DocumentId};
pub use error::{Result, SearchError};
pub use facets::{FacetCounts, FacetValue, PriceBand};
pub use filter::SearchFilters;
pub use index::{SearchHit, SearchIndex};
pub use postings::{PostingStore, Term};
