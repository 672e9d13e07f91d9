use crate::document::Document;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Fixed price bands, half-open `[lo, hi)` except the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceBand {
    Under50,
    From50To100,
    From100To500,
    Over500,
}

impl PriceBand {
    pub fn of(price: f64) -> Self {
        if price < 50.0 {
            PriceBand::Under50
        } else if price < 100.0 {
            PriceBand::From50To100
        } else if price < 500.0 {
            PriceBand::From100To500
        } else {
            PriceBand::Over500
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PriceBand::Under50 => "Under $50",
            PriceBand::From50To100 => "$50-$100",
            PriceBand::From100To500 => "$100-$500",
            PriceBand::Over500 => "Over $500",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetValue {
    pub value: String,
    pub count: usize,
}

/// Facet name → values ordered by descending count, ties by first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCounts {
    pub category: Vec<FacetValue>,
    pub brand: Vec<FacetValue>,
    pub price_range: Vec<FacetValue>,
}

impl FacetCounts {
    pub fn tally<'a, I: IntoIterator<Item = &'a Document>>(docs: I) -> Self {
        let mut category = Tally::default();
        let mut brand = Tally::default();
        let mut price_range = Tally::default();
        for doc in docs {
            category.add(&doc.category);
            brand.add(&doc.brand);
            price_range.add(PriceBand::of(doc.price).label());
        }
        Self { category: category.ranked(), brand: brand.ranked(), price_range: price_range.ranked() }
    }

    pub fn get(&self, name: &str) -> Option<&[FacetValue]> {
        match name {
            "category" => Some(&self.category),
            "brand" => Some(&self.brand),
            "price_range" => Some(&self.price_range),
            _ => None,
        }
    }
}

/// Counts in first-seen order.
#[derive(Default)]
struct Tally {
    slots: HashMap<String, usize>,
    values: Vec<FacetValue>,
}

impl Tally {
    fn add(&mut self, value: &str) {
        match self.slots.get(value) {
            Some(&i) => self.values[i].count += 1,
            None => {
                self.slots.insert(value.to_string(), self.values.len());
                self.values.push(FacetValue { value: value.to_string(), count: 1 });
            }
        }
    }

    fn ranked(mut self) -> Vec<FacetValue> {
        // stable: equal counts keep first-seen order
        self.values.sort_by(|a, b| b.count.cmp(&a.count));
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(category: &str, brand: &str, price: f64) -> Document {
        Document::new("x", "t", "", category, price, brand)
    }

    fn pairs(values: &[FacetValue]) -> Vec<(&str, usize)> {
        values.iter().map(|v| (v.value.as_str(), v.count)).collect()
    }

    #[test]
    fn band_boundaries_are_half_open() {
        assert_eq!(PriceBand::of(49.99), PriceBand::Under50);
        assert_eq!(PriceBand::of(50.0), PriceBand::From50To100);
        assert_eq!(PriceBand::of(100.0), PriceBand::From100To500);
        assert_eq!(PriceBand::of(499.99), PriceBand::From100To500);
        assert_eq!(PriceBand::of(500.0), PriceBand::Over500);
    }

    #[test]
    fn ranked_by_count_then_first_seen() {
        let docs = vec![
            doc("Toys", "Zed", 10.0),
            doc("Footwear", "Acme", 600.0),
            doc("Footwear", "Zed", 75.0),
            doc("Garden", "Acme", 20.0),
        ];
        let facets = FacetCounts::tally(&docs);
        assert_eq!(pairs(&facets.category), vec![("Footwear", 2), ("Toys", 1), ("Garden", 1)]);
        assert_eq!(pairs(&facets.brand), vec![("Zed", 2), ("Acme", 2)]);
        assert_eq!(
            pairs(&facets.price_range),
            vec![("Under $50", 2), ("Over $500", 1), ("$50-$100", 1)]
        );
        assert!(facets.get("brand").is_some());
        assert!(facets.get("color").is_none());
    }
}
