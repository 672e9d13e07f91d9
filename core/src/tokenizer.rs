use crate::postings::Term;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref PUNCT: Regex = Regex::new(r"[^\w\s]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Optional analysis stages. Both are off by default, which gives the plain
/// lowercase / strip punctuation / split pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerOptions {
    /// NFKC-normalize before lower-casing.
    pub unicode_normalize: bool,
    /// Reduce every surviving token to its English stem.
    pub stem: bool,
}

/// Turns raw text into index terms. The same analyzer must be used for
/// documents and queries of one index.
#[derive(Debug, Clone, Copy, Default)]
pub struct Analyzer {
    options: TokenizerOptions,
}

impl Analyzer {
    pub fn new(options: TokenizerOptions) -> Self {
        Self { options }
    }

    /// Lowercase, replace punctuation with whitespace, split, and drop tokens
    /// of one character or less.
    pub fn analyze(&self, text: &str) -> Vec<Term> {
        let lowered = if self.options.unicode_normalize {
            text.nfkc().collect::<String>().to_lowercase()
        } else {
            text.to_lowercase()
        };
        // Punctuation becomes a separator so "red-shoes" stays two tokens.
        let spaced = PUNCT.replace_all(&lowered, " ");
        spaced
            .split_whitespace()
            .filter(|token| token.chars().count() > 1)
            .map(|token| {
                if self.options.stem {
                    Term::new(STEMMER.stem(token).into_owned())
                } else {
                    Term::new(token)
                }
            })
            .collect()
    }
}

/// Tokenize with the default pipeline.
pub fn tokenize(text: &str) -> Vec<Term> {
    Analyzer::default().analyze(text)
}
