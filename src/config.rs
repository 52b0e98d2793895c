//! Run configuration
//!
//! Everything the reconciler needs is passed in explicitly; defaults live
//! here and the CLI overrides them.

use crate::error::{ReconcileError, Result};
use crate::fuzzy_matcher::{FuzzyMatcher, SimilarityMetric};
use crate::normalize::CanonicalizeOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cutoff used when merging photo coordinates.
pub const DEFAULT_COORDINATE_CUTOFF: f64 = 0.85;
/// Cutoff used when ingesting the curated descriptive table.
pub const DEFAULT_DESCRIPTIVE_CUTOFF: f64 = 0.9;
/// Number of unmatched keys and fuzzy pairs kept in a report.
pub const DEFAULT_SAMPLE_LIMIT: usize = 25;

/// How an incoming coordinate treats a stored one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationPolicy {
    /// Latest reading wins; a bit-identical reading is a no-op.
    #[default]
    Overwrite,
    /// Only write when the record has no location yet.
    FillIfEmpty,
}

impl fmt::Display for LocationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => f.write_str("overwrite"),
            Self::FillIfEmpty => f.write_str("fill-if-empty"),
        }
    }
}

impl FromStr for LocationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "fill-if-empty" | "fill_if_empty" => Ok(Self::FillIfEmpty),
            other => Err(format!("unknown location policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Minimum similarity for an approximate match, in (0, 1].
    pub fuzzy_cutoff: f64,
    pub metric: SimilarityMetric,
    /// Disable approximate matching entirely.
    pub exact_only: bool,
    /// In create mode, try approximate matching before creating a record.
    pub fuzzy_before_create: bool,
    pub canonicalize: CanonicalizeOptions,
    pub location_policy: LocationPolicy,
    /// Display keys starting with one of these carry no identity (camera
    /// default names such as `IMG_0042.HEIC`).
    pub placeholder_prefixes: Vec<String>,
    pub sample_limit: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            fuzzy_cutoff: DEFAULT_COORDINATE_CUTOFF,
            metric: SimilarityMetric::default(),
            exact_only: false,
            fuzzy_before_create: true,
            canonicalize: CanonicalizeOptions::default(),
            location_policy: LocationPolicy::default(),
            placeholder_prefixes: vec!["IMG".to_string()],
            sample_limit: DEFAULT_SAMPLE_LIMIT,
        }
    }
}

impl ReconcileConfig {
    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.fuzzy_cutoff = cutoff;
        self
    }

    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_exact_only(mut self, exact_only: bool) -> Self {
        self.exact_only = exact_only;
        self
    }

    pub fn with_fuzzy_before_create(mut self, enabled: bool) -> Self {
        self.fuzzy_before_create = enabled;
        self
    }

    pub fn with_canonicalize(mut self, options: CanonicalizeOptions) -> Self {
        self.canonicalize = options;
        self
    }

    pub fn with_location_policy(mut self, policy: LocationPolicy) -> Self {
        self.location_policy = policy;
        self
    }

    pub fn with_placeholder_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.placeholder_prefixes = prefixes;
        self
    }

    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fuzzy_cutoff > 0.0 && self.fuzzy_cutoff <= 1.0) {
            return Err(ReconcileError::Config(format!(
                "fuzzy cutoff must be in (0, 1], got {}",
                self.fuzzy_cutoff
            )));
        }
        Ok(())
    }

    pub fn matcher(&self) -> FuzzyMatcher {
        FuzzyMatcher::new(self.fuzzy_cutoff).with_metric(self.metric)
    }

    /// True when `display_key` is a camera default name.
    ///
    /// The prefix must be followed by a non-letter (or nothing), so `IMG_12`
    /// and `IMG0042` are placeholders but `Imogen's Bench` is not.
    pub fn is_placeholder(&self, display_key: &str) -> bool {
        let key = display_key.trim();
        self.placeholder_prefixes.iter().any(|prefix| {
            let prefix = prefix.trim();
            if prefix.is_empty() || key.len() < prefix.len() || !key.is_char_boundary(prefix.len()) {
                return false;
            }
            let (head, rest) = key.split_at(prefix.len());
            head.eq_ignore_ascii_case(prefix)
                && rest.chars().next().map_or(true, |c| !c.is_alphabetic())
        })
    }
}
