//! TF-IDF weighted logistic model stored as a JSON artifact.
//!
//! Artifacts are produced offline (for example by exporting a fitted
//! vectorizer + logistic regression) and only loaded and saved here.

use super::{check_probability, Classifier};
use crate::error::ClassifierError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

fn default_ngram_max() -> usize {
    2
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermWeight {
    pub idf: f64,
    pub coef: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub name: String,
    pub intercept: f64,
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,
    pub vocabulary: HashMap<String, TermWeight>,
}

impl LinearModel {
    pub fn new(name: &str, intercept: f64, ngram_max: usize) -> Self {
        Self {
            name: name.to_string(),
            intercept,
            ngram_max: ngram_max.max(1),
            vocabulary: HashMap::new(),
        }
    }

    pub fn with_term(mut self, term: &str, idf: f64, coef: f64) -> Self {
        self.vocabulary
            .insert(term.to_string(), TermWeight { idf, coef });
        self
    }

    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let content = fs::read_to_string(path).map_err(|source| ClassifierError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut model: LinearModel =
            serde_json::from_str(&content).map_err(|source| ClassifierError::Format {
                path: path.to_path_buf(),
                source,
            })?;
        model.ngram_max = model.ngram_max.max(1);
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        let io_err = |source: std::io::Error| ClassifierError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|source| ClassifierError::Format {
                path: path.to_path_buf(),
                source,
            })?;
        fs::write(path, content).map_err(io_err)
    }

    /// Raw term counts for every word n-gram up to `ngram_max`, ordered so
    /// that repeated scoring sums in the same order.
    fn term_counts(&self, tokens: &[&str]) -> BTreeMap<String, f64> {
        let mut counts = BTreeMap::new();
        for n in 1..=self.ngram_max {
            for window in tokens.windows(n) {
                *counts.entry(window.join(" ")).or_insert(0.0) += 1.0;
            }
        }
        counts
    }

    fn decision_function(&self, normalized: &str) -> f64 {
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        let features: Vec<(f64, f64)> = self
            .term_counts(&tokens)
            .into_iter()
            .filter_map(|(term, tf)| {
                self.vocabulary
                    .get(&term)
                    .map(|weight| (tf * weight.idf, weight.coef))
            })
            .collect();

        let norm = features.iter().map(|(x, _)| x * x).sum::<f64>().sqrt();
        if norm == 0.0 {
            return self.intercept;
        }

        self.intercept
            + features
                .iter()
                .map(|(x, coef)| (x / norm) * coef)
                .sum::<f64>()
    }
}

impl Classifier for LinearModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, normalized: &str) -> Result<f64, ClassifierError> {
        let z = self.decision_function(normalized);
        check_probability(1.0 / (1.0 + (-z).exp()))
    }
}
