//! The catalog index: document table plus posting store behind one lock.
//!
//! Mutations hold the write lock for the whole reindex, so readers observe a
//! document either entirely before or entirely after a change.

use crate::config::SearchConfig;
use crate::document::{Document, DocumentId};
use crate::error::Result;
use crate::facets::FacetCounts;
use crate::filter::SearchFilters;
use crate::postings::{PostingStore, Term};
use crate::scorer::{score_query, tfidf};
use crate::tokenizer::Analyzer;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document: Document,
    pub score: f64,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    document: Document,
    /// assigned on first add, kept across re-adds; breaks score ties
    seq: u64,
}

#[derive(Debug, Default)]
struct IndexState {
    postings: PostingStore,
    docs: HashMap<DocumentId, StoredDocument>,
    next_seq: u64,
}

pub struct SearchIndex {
    config: SearchConfig,
    analyzer: Analyzer,
    state: RwLock<IndexState>,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

impl SearchIndex {
    pub fn new(config: SearchConfig) -> Self {
        let analyzer = Analyzer::new(config.tokenizer);
        Self { config, analyzer, state: RwLock::new(IndexState::default()) }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Index `document`, fully replacing any previous version with the same id.
    pub fn add_document(&self, document: Document) -> Result<()> {
        if let Err(e) = document.validate() {
            tracing::warn!(doc_id = %document.id, error = %e, "rejected document");
            return Err(e);
        }
        let mut counts: HashMap<Term, u32> = HashMap::new();
        for term in self.analyzer.analyze(&document.indexed_text()) {
            *counts.entry(term).or_insert(0) += 1;
        }
        let unique_terms = counts.len();

        let mut guard = self.state.write();
        let state = &mut *guard;
        let existing = state.docs.get(&document.id).map(|d| d.seq);
        let seq = match existing {
            Some(seq) => seq,
            None => {
                let seq = state.next_seq;
                state.next_seq += 1;
                seq
            }
        };
        let id = document.id.clone();
        state.postings.upsert(&id, counts);
        state.docs.insert(id.clone(), StoredDocument { document, seq });
        tracing::debug!(doc_id = %id, unique_terms, reindexed = existing.is_some(), "indexed document");
        Ok(())
    }

    /// Drop a document and its postings. Returns whether it was present;
    /// removing an absent id is a no-op.
    pub fn remove_document(&self, id: &DocumentId) -> bool {
        let mut state = self.state.write();
        state.postings.remove(id);
        let removed = state.docs.remove(id).is_some();
        if removed {
            tracing::debug!(doc_id = %id, "removed document");
        }
        removed
    }

    /// Rank documents matching any query term. Ties keep insertion order.
    pub fn search(&self, query: &str, top_k: usize, filters: &SearchFilters) -> Vec<SearchHit> {
        let terms = self.analyzer.analyze(query);
        let state = self.state.read();
        self.rank(&state, &terms, top_k, filters)
    }

    /// Indexed terms starting with `prefix` (case-insensitive), sorted.
    pub fn suggest(&self, prefix: &str, max_results: usize) -> Vec<String> {
        let prefix = prefix.to_lowercase();
        let state = self.state.read();
        state
            .postings
            .terms_with_prefix(&prefix)
            .take(max_results)
            .map(|t| t.as_str().to_string())
            .collect()
    }

    /// Category, brand and price band counts over the top results for `query`.
    pub fn facets(&self, query: &str) -> FacetCounts {
        let terms = self.analyzer.analyze(query);
        let state = self.state.read();
        let hits = self.rank(&state, &terms, self.config.facet_candidate_limit, &SearchFilters::none());
        FacetCounts::tally(hits.iter().map(|h| &h.document))
    }

    pub fn get(&self, id: &DocumentId) -> Option<Document> {
        self.state.read().docs.get(id).map(|d| d.document.clone())
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.state.read().docs.contains_key(id)
    }

    /// All documents in insertion order.
    pub fn documents(&self) -> Vec<Document> {
        let state = self.state.read();
        let mut stored: Vec<&StoredDocument> = state.docs.values().collect();
        stored.sort_by_key(|d| d.seq);
        stored.into_iter().map(|d| d.document.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn term_count(&self) -> usize {
        self.state.read().postings.term_count()
    }

    pub fn terms_for(&self, id: &DocumentId) -> HashMap<Term, u32> {
        self.state.read().postings.terms_for(id)
    }

    pub fn documents_for(&self, term: &str) -> HashSet<DocumentId> {
        self.state.read().postings.documents_for(term)
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.state.read().postings.document_frequency(term)
    }

    pub fn tfidf(&self, term: &str, id: &DocumentId) -> f64 {
        let state = self.state.read();
        tfidf(term, id, state.docs.len(), &state.postings)
    }

    fn rank(&self, state: &IndexState, terms: &[Term], top_k: usize, filters: &SearchFilters) -> Vec<SearchHit> {
        if terms.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let total = state.docs.len();
        let mut candidates: HashSet<DocumentId> = HashSet::new();
        for term in terms {
            candidates.extend(state.postings.documents_for(term.as_str()));
        }

        let mut scored: Vec<(&StoredDocument, f64)> = candidates
            .iter()
            .filter_map(|id| state.docs.get(id))
            .filter(|d| filters.matches(&d.document))
            .map(|d| {
                let score = score_query(
                    terms,
                    &d.document.id,
                    &d.document.title,
                    total,
                    &state.postings,
                    self.config.title_boost,
                );
                (d, score)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.seq.cmp(&b.0.seq)));
        scored.truncate(top_k);
        scored
            .into_iter()
            .map(|(d, score)| SearchHit { document: d.document.clone(), score })
            .collect()
    }
}
