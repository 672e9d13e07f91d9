//! Term → document postings with per-document forward lists.
//!
//! Every mutation recomputes the document frequency of each touched term from
//! the posting lists themselves, so re-adding the same id any number of times
//! can not make the counts drift.

use crate::document::DocumentId;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::ops::Bound;

/// A normalized index term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Term(String);

impl Term {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Term(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Term {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default, Clone)]
pub struct PostingStore {
    /// term → (document → frequency); ordered so prefix scans are range queries
    postings: BTreeMap<Term, HashMap<DocumentId, u32>>,
    /// document → (term → frequency)
    forward: HashMap<DocumentId, HashMap<Term, u32>>,
    df: HashMap<Term, u32>,
}

impl PostingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every posting of `document_id` with `term_counts`. Zero counts
    /// are not postings and are skipped.
    pub fn upsert(&mut self, document_id: &DocumentId, term_counts: HashMap<Term, u32>) {
        let old = self.drop_postings(document_id);
        let new: HashMap<Term, u32> = term_counts.into_iter().filter(|(_, c)| *c > 0).collect();
        for (term, count) in &new {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(document_id.clone(), *count);
        }
        let touched: HashSet<Term> = old.into_keys().chain(new.keys().cloned()).collect();
        if !new.is_empty() {
            self.forward.insert(document_id.clone(), new);
        }
        self.recount(touched);
    }

    /// Drop all postings of `document_id`. Returns whether it had any.
    pub fn remove(&mut self, document_id: &DocumentId) -> bool {
        let old = self.drop_postings(document_id);
        let had_postings = !old.is_empty();
        self.recount(old.into_keys());
        had_postings
    }

    pub fn terms_for(&self, document_id: &DocumentId) -> HashMap<Term, u32> {
        self.forward.get(document_id).cloned().unwrap_or_default()
    }

    pub fn documents_for(&self, term: &str) -> HashSet<DocumentId> {
        self.postings
            .get(term)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Raw count of `term` in `document_id`, 0 when there is no posting.
    pub fn frequency(&self, term: &str, document_id: &DocumentId) -> u32 {
        self.postings
            .get(term)
            .and_then(|docs| docs.get(document_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn document_frequency(&self, term: &str) -> u32 {
        self.df.get(term).copied().unwrap_or(0)
    }

    /// Indexed terms starting with `prefix`, in lexicographic order.
    pub fn terms_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Term> + 'a {
        self.postings
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(term, _)| term)
            .take_while(move |term| term.as_str().starts_with(prefix))
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    fn drop_postings(&mut self, document_id: &DocumentId) -> HashMap<Term, u32> {
        let old = self.forward.remove(document_id).unwrap_or_default();
        for term in old.keys() {
            if let Some(docs) = self.postings.get_mut(term) {
                docs.remove(document_id);
                if docs.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
        old
    }

    fn recount<I: IntoIterator<Item = Term>>(&mut self, touched: I) {
        for term in touched {
            match self.postings.get(&term) {
                Some(docs) => {
                    self.df.insert(term, docs.len() as u32);
                }
                None => {
                    self.df.remove(&term);
                }
            }
        }
    }
}
