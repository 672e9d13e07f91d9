//! TF-IDF relevance.
//!
//! `tf` is the raw term count in the document and `idf = ln(N / df)`. A term
//! present in every document therefore contributes nothing, and ranking among
//! such documents falls back to the title boost and then insertion order.

use crate::document::DocumentId;
use crate::postings::{PostingStore, Term};
use std::collections::HashSet;

/// TF-IDF weight of `term` in `document_id`; 0.0 when there is no posting or
/// the index is empty.
pub fn tfidf(term: &str, document_id: &DocumentId, total_documents: usize, store: &PostingStore) -> f64 {
    if total_documents == 0 {
        return 0.0;
    }
    let tf = store.frequency(term, document_id);
    if tf == 0 {
        return 0.0;
    }
    // a posting exists, so df >= 1
    let df = store.document_frequency(term).max(1);
    let idf = (total_documents as f64 / df as f64).ln();
    tf as f64 * idf
}

/// Sum of `tfidf` over the query terms, plus `title_boost` for every distinct
/// query term occurring as a substring of the lower-cased title.
pub fn score_query(
    query_terms: &[Term],
    document_id: &DocumentId,
    title: &str,
    total_documents: usize,
    store: &PostingStore,
    title_boost: f64,
) -> f64 {
    let relevance: f64 = query_terms
        .iter()
        .map(|term| tfidf(term.as_str(), document_id, total_documents, store))
        .sum();

    let title = title.to_lowercase();
    let distinct: HashSet<&str> = query_terms.iter().map(Term::as_str).collect();
    let title_hits = distinct.into_iter().filter(|term| title.contains(term)).count();

    relevance + title_hits as f64 * title_boost
}
