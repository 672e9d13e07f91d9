use catalog_core::{Document, DocumentId, SearchFilters, SearchIndex};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

fn product(id: &str, title: &str, description: &str, category: &str, price: f64, brand: &str) -> Document {
    Document::new(id, title, description, category, price, brand)
}

fn ids(index: &SearchIndex, query: &str) -> Vec<String> {
    index
        .search(query, 10, &SearchFilters::none())
        .into_iter()
        .map(|h| h.document.id.as_str().to_string())
        .collect()
}

#[test]
fn re_adding_replaces_postings() {
    let index = SearchIndex::default();
    let id = DocumentId::new("P1");
    index.add_document(product("P1", "leather boots", "waterproof", "Footwear", 120.0, "Acme")).unwrap();
    index.add_document(product("P1", "canvas sneakers", "lightweight", "Footwear", 55.0, "Acme")).unwrap();

    let terms = index.terms_for(&id);
    let mut keys: Vec<&str> = terms.keys().map(|t| t.as_str()).collect();
    keys.sort();
    assert_eq!(keys, vec!["acme", "canvas", "footwear", "lightweight", "sneakers"]);
    for gone in ["leather", "boots", "waterproof"] {
        assert!(!index.documents_for(gone).contains(&id), "{gone} still points at P1");
        assert_eq!(index.document_frequency(gone), 0);
    }
    assert_eq!(index.len(), 1);
    assert!(ids(&index, "boots").is_empty());
    assert_eq!(ids(&index, "sneakers"), vec!["P1"]);
}

#[test]
fn removing_drops_postings_and_decrements_df() {
    let index = SearchIndex::default();
    index.add_document(product("P1", "red shoes", "", "Footwear", 40.0, "Acme")).unwrap();
    index.add_document(product("P2", "blue shoes", "", "Footwear", 60.0, "Acme")).unwrap();
    let id = DocumentId::new("P1");
    let contributed: HashMap<String, u32> = index
        .terms_for(&id)
        .keys()
        .map(|t| (t.as_str().to_string(), index.document_frequency(t.as_str())))
        .collect();

    assert!(index.remove_document(&id));
    for (term, before) in contributed {
        assert!(!index.documents_for(&term).contains(&id));
        assert_eq!(index.document_frequency(&term), before - 1, "df of {term}");
    }
    assert!(index.get(&id).is_none());
    assert_eq!(index.len(), 1);
}

#[test]
fn removal_is_idempotent() {
    let index = SearchIndex::default();
    index.add_document(product("P1", "red shoes", "", "Footwear", 40.0, "Acme")).unwrap();
    index.add_document(product("P2", "blue shoes", "", "Footwear", 60.0, "Acme")).unwrap();
    let id = DocumentId::new("P1");
    assert!(index.remove_document(&id));
    let terms_after_once = index.term_count();
    let shoes_df = index.document_frequency("shoes");
    assert!(!index.remove_document(&id));
    assert!(!index.remove_document(&DocumentId::new("never-added")));
    assert_eq!(index.term_count(), terms_after_once);
    assert_eq!(index.document_frequency("shoes"), shoes_df);
    assert_eq!(index.len(), 1);
}

#[test]
fn empty_query_returns_nothing() {
    let index = SearchIndex::default();
    index.add_document(product("P1", "red shoes", "", "Footwear", 40.0, "Acme")).unwrap();
    assert!(ids(&index, "").is_empty());
    assert!(ids(&index, "   ").is_empty());
    assert!(ids(&index, "- , !").is_empty());
}

#[test]
fn results_sorted_by_score_with_stable_ties() {
    let index = SearchIndex::default();
    index.add_document(product("A", "garden hose", "", "Garden", 20.0, "Flow")).unwrap();
    index.add_document(product("B", "hose reel", "hose hose hose", "Garden", 45.0, "Flow")).unwrap();
    index.add_document(product("C", "garden hose", "", "Garden", 22.0, "Flow")).unwrap();
    index.add_document(product("D", "sprinkler", "", "Garden", 15.0, "Rain")).unwrap();

    let hits = index.search("hose", 10, &SearchFilters::none());
    let order: Vec<&str> = hits.iter().map(|h| h.document.id.as_str()).collect();
    assert_eq!(order, vec!["B", "A", "C"]);
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert_eq!(hits[1].score, hits[2].score);
}

#[test]
fn tfidf_is_zero_without_posting() {
    let index = SearchIndex::default();
    index.add_document(product("P1", "red shoes", "", "Footwear", 40.0, "Acme")).unwrap();
    index.add_document(product("P2", "blue hat", "", "Hats", 20.0, "Acme")).unwrap();
    assert_eq!(index.tfidf("red", &DocumentId::new("P2")), 0.0);
    assert_eq!(index.tfidf("missing", &DocumentId::new("P1")), 0.0);
    assert!(index.tfidf("red", &DocumentId::new("P1")) > 0.0);
}

#[test]
fn shoes_example() {
    let index = SearchIndex::default();
    index.add_document(product("P1", "red shoes", "", "Footwear", 40.0, "Acme")).unwrap();
    index.add_document(product("P2", "blue shoes", "", "Footwear", 60.0, "Acme")).unwrap();

    let hits = index.search("shoes", 10, &SearchFilters::none());
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].document.id.as_str(), "P1");
    assert_eq!(hits[1].document.id.as_str(), "P2");
    assert!((hits[0].score - 0.5).abs() < 1e-12);

    let facets = index.facets("shoes");
    let bands: Vec<(&str, usize)> = facets.price_range.iter().map(|v| (v.value.as_str(), v.count)).collect();
    assert_eq!(bands, vec![("Under $50", 1), ("$50-$100", 1)]);
    assert_eq!(facets.brand[0].value, "Acme");
    assert_eq!(facets.brand[0].count, 2);
}

#[test]
fn facets_serialize_as_name_to_list() {
    let index = SearchIndex::default();
    index.add_document(product("P1", "red shoes", "", "Footwear", 40.0, "Acme")).unwrap();
    let value = serde_json::to_value(index.facets("red")).unwrap();
    assert_eq!(value["category"], json!([{"value": "Footwear", "count": 1}]));
    assert_eq!(value["price_range"][0]["value"], "Under $50");
}

#[test]
fn concurrent_readers_see_whole_documents() {
    let index = Arc::new(SearchIndex::default());
    index.add_document(product("P0", "alpha beta", "", "X", 1.0, "Y")).unwrap();

    let writer = {
        let index = Arc::clone(&index);
        thread::spawn(move || {
            for i in 0..200 {
                let title = if i % 2 == 0 { "alpha beta" } else { "gamma delta" };
                index.add_document(product("P0", title, "", "X", 1.0, "Y")).unwrap();
            }
        })
    };
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for _ in 0..200 {
                    let terms = index.terms_for(&DocumentId::new("P0"));
                    let alpha = terms.contains_key("alpha") && terms.contains_key("beta");
                    let gamma = terms.contains_key("gamma") && terms.contains_key("delta");
                    assert!(alpha ^ gamma, "observed a half-indexed document: {terms:?}");
                }
            })
        })
        .collect();
    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }
}
