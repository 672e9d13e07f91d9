//! Result filtering by price range, category and brand.

use crate::document::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Optional constraints applied to search candidates. Unknown keys in the
/// serialized form are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub category: Option<String>,
    pub brand: Option<String>,
}

impl SearchFilters {
    pub fn none() -> Self {
        Self::default()
    }

    /// Build filters from a loose mapping. Unrecognized keys and values of the
    /// wrong type are skipped.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let mut filters = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "price_min" => filters.price_min = value.as_f64(),
                "price_max" => filters.price_max = value.as_f64(),
                "category" => filters.category = value.as_str().map(str::to_string),
                "brand" => filters.brand = value.as_str().map(str::to_string),
                _ => {}
            }
        }
        filters
    }

    /// Inclusive price bounds, exact category and brand.
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(max) = self.price_max {
            if doc.price > max {
                return false;
            }
        }
        if let Some(min) = self.price_min {
            if doc.price < min {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &doc.category != category {
                return false;
            }
        }
        if let Some(brand) = &self.brand {
            if &doc.brand != brand {
                return false;
            }
        }
        true
    }
}
