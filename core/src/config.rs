//! Tuning constants and the runtime search configuration.

use crate::error::Result;
use crate::tokenizer::TokenizerOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Score added for each distinct query term found in a document title.
pub const DEFAULT_TITLE_BOOST: f64 = 0.5;

/// How many ranked results facet counting looks at.
pub const FACET_CANDIDATE_LIMIT: usize = 1000;

pub const DEFAULT_TOP_K: usize = 10;

pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

/// Upper bound on `k` accepted from external callers.
pub const MAX_K: usize = 1000;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub title_boost: f64,
    pub facet_candidate_limit: usize,
    pub tokenizer: TokenizerOptions,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            title_boost: DEFAULT_TITLE_BOOST,
            facet_candidate_limit: FACET_CANDIDATE_LIMIT,
            tokenizer: TokenizerOptions::default(),
        }
    }
}

impl SearchConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
