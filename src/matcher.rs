//! Item matching and selection.
//!
//! The [`Matcher`] picks the catalog product that best satisfies a free-text
//! shopping-list query. Selection has two paths sharing one scoring helper:
//!
//! 1. History corroboration: the best purchase-history entry above the
//!    threshold wins outright if the same product name is also present in
//!    the catalog results.
//! 2. Catalog ranking: every catalog candidate is scored, preference boosts
//!    reorder the ranking, and the top entry is reported with its raw score.
//!
//! The reported score is always the unadjusted textual similarity (plus the
//! history boost on the corroborated path), so thresholds stay comparable
//! regardless of preference flags.

use crate::candidate::{Candidate, MatchResult};
use crate::similarity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Similarity function returning a 0-100 score
pub type Similarity = fn(&str, &str) -> u8;

/// Base similarity metric used by the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    /// Token-sort ratio: reorder-tolerant, penalizes padding
    TokenSort,
    /// Token-set ratio: tolerant of padded titles
    TokenSet,
    /// Maximum of token-sort and token-set
    #[default]
    TokenRatio,
}

impl Scorer {
    /// The similarity function for this metric
    pub fn similarity(self) -> Similarity {
        match self {
            Scorer::TokenSort => token_sort_score,
            Scorer::TokenSet => token_set_score,
            Scorer::TokenRatio => token_ratio_score,
        }
    }
}

fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn token_sort_score(a: &str, b: &str) -> u8 {
    to_score(similarity::token_sort_ratio(a, b))
}

fn token_set_score(a: &str, b: &str) -> u8 {
    to_score(similarity::token_set_ratio(a, b))
}

fn token_ratio_score(a: &str, b: &str) -> u8 {
    to_score(similarity::token_ratio(a, b))
}

/// Score adjustments applied by the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Boosts {
    /// Added to the reported score of a history-corroborated match
    pub history: u8,
    /// Ranking bonus for frequently bought items
    pub frequent: u8,
    /// Ranking bonus for in-stock items
    pub in_stock: u8,
    /// Ranking penalty for out-of-stock items
    pub out_of_stock_penalty: u8,
}

impl Default for Boosts {
    fn default() -> Self {
        Self {
            history: 10,
            frequent: 5,
            in_stock: 3,
            out_of_stock_penalty: 10,
        }
    }
}

/// Matcher configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Minimum base score for a match to be reported
    #[serde(default = "default_min_score")]
    pub min_score: u8,

    /// Rank frequently bought items higher
    #[serde(default = "default_true")]
    pub prefer_frequent: bool,

    /// Rank in-stock items higher
    #[serde(default = "default_true")]
    pub prefer_in_stock: bool,

    #[serde(default)]
    pub boosts: Boosts,

    #[serde(default)]
    pub scorer: Scorer,
}

fn default_min_score() -> u8 {
    70
}

fn default_true() -> bool {
    true
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            prefer_frequent: true,
            prefer_in_stock: true,
            boosts: Boosts::default(),
            scorer: Scorer::default(),
        }
    }
}

impl MatcherConfig {
    /// Same configuration with a different threshold
    pub fn with_min_score(mut self, min_score: u8) -> Self {
        self.min_score = min_score;
        self
    }
}

/// A catalog candidate with its scores
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate<'a> {
    pub candidate: &'a Candidate,
    /// Position in the input list
    pub index: usize,
    /// Raw similarity, used for thresholds and reporting
    pub base_score: u8,
    /// Base score plus preference adjustments, used only for ordering
    pub adjusted_score: i32,
}

/// Why no match was reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatch {
    /// No candidates, or none with a usable name
    EmptyInput,
    /// The top-ranked candidate scored below the threshold
    BelowThreshold { best_score: u8 },
}

impl fmt::Display for NoMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoMatch::EmptyInput => write!(f, "no candidates to match"),
            NoMatch::BelowThreshold { best_score } => {
                write!(f, "best score {} is below threshold", best_score)
            }
        }
    }
}

/// Selects the best catalog candidate for a query
#[derive(Debug, Clone)]
pub struct Matcher {
    config: MatcherConfig,
    similarity: Similarity,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

impl Matcher {
    /// Create a matcher with the given configuration
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            similarity: config.scorer.similarity(),
            config,
        }
    }

    /// Replace the similarity function chosen by `config.scorer`
    pub fn with_similarity(mut self, similarity: Similarity) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Base similarity between a query and a candidate name
    pub fn score(&self, query: &str, name: &str) -> u8 {
        (self.similarity)(query, name)
    }

    fn adjusted(&self, candidate: &Candidate, base_score: u8) -> i32 {
        let boosts = &self.config.boosts;
        let mut adjusted = i32::from(base_score);

        if self.config.prefer_frequent && candidate.frequently_bought {
            adjusted += i32::from(boosts.frequent);
            ::log::debug!("Boosting frequently bought item: {}", candidate.name);
        }

        if candidate.in_stock {
            if self.config.prefer_in_stock {
                adjusted += i32::from(boosts.in_stock);
            }
        } else {
            adjusted -= i32::from(boosts.out_of_stock_penalty);
        }

        adjusted
    }

    /// Score every named candidate and order them by adjusted score.
    ///
    /// The sort is stable: equal adjusted scores keep their input order.
    pub fn rank<'a>(&self, query: &str, candidates: &'a [Candidate]) -> Vec<RankedCandidate<'a>> {
        let mut ranked: Vec<RankedCandidate<'a>> = candidates
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.has_name())
            .map(|(index, candidate)| {
                let base_score = self.score(query, &candidate.name);
                RankedCandidate {
                    candidate,
                    index,
                    base_score,
                    adjusted_score: self.adjusted(candidate, base_score),
                }
            })
            .collect();

        ranked.sort_by(|a, b| b.adjusted_score.cmp(&a.adjusted_score));
        ranked
    }

    /// Find the best match for `query`, or `None` when nothing is confident enough
    pub fn find_best_match(
        &self,
        query: &str,
        catalog: &[Candidate],
        history: Option<&[Candidate]>,
    ) -> Option<MatchResult> {
        match self.explain(query, catalog, history) {
            Ok(result) => Some(result),
            Err(reason) => {
                ::log::warn!(
                    "No match for '{}' (threshold {}): {}",
                    query,
                    self.config.min_score,
                    reason
                );
                None
            }
        }
    }

    /// Same selection as [`Matcher::find_best_match`], reporting why nothing matched
    pub fn explain(
        &self,
        query: &str,
        catalog: &[Candidate],
        history: Option<&[Candidate]>,
    ) -> Result<MatchResult, NoMatch> {
        if catalog.is_empty() {
            return Err(NoMatch::EmptyInput);
        }

        ::log::debug!("Matching '{}' against {} items", query, catalog.len());

        if let Some(history) = history.filter(|h| !h.is_empty()) {
            if let Some(result) = self.corroborate(query, catalog, history) {
                ::log::info!(
                    "Matched '{}' through purchase history: '{}' (score {})",
                    query,
                    result.name,
                    result.score
                );
                return Ok(result);
            }
        }

        let ranked = self.rank(query, catalog);
        let best = ranked.first().ok_or(NoMatch::EmptyInput)?;

        if best.base_score < self.config.min_score {
            return Err(NoMatch::BelowThreshold {
                best_score: best.base_score,
            });
        }

        ::log::info!(
            "Best match for '{}': '{}' (score {}, adjusted {})",
            query,
            best.candidate.name,
            best.base_score,
            best.adjusted_score
        );
        Ok(MatchResult::from_candidate(best.candidate, best.base_score))
    }

    /// History path: best history entry above threshold, confirmed by a catalog entry
    /// with the same name
    fn corroborate(
        &self,
        query: &str,
        catalog: &[Candidate],
        history: &[Candidate],
    ) -> Option<MatchResult> {
        let mut best: Option<(&Candidate, u8)> = None;
        for candidate in history.iter().filter(|c| c.has_name()) {
            let score = self.score(query, &candidate.name);
            if score < self.config.min_score {
                continue;
            }
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }

        let (previous, history_score) = best?;
        let wanted = previous.name.trim().to_lowercase();
        let listed = catalog
            .iter()
            .filter(|c| c.has_name())
            .find(|c| c.name.trim().to_lowercase() == wanted);

        let Some(listed) = listed else {
            ::log::debug!(
                "History entry '{}' is not among the catalog results",
                previous.name
            );
            return None;
        };

        let score = history_score
            .saturating_add(self.config.boosts.history)
            .min(100);
        let mut result = MatchResult::from_candidate(listed, score);
        result.frequently_bought = true;
        result.source_page = listed.source_page.or(previous.source_page);
        Some(result)
    }

    /// Up to `limit` candidates at or above the threshold, best first, without boosts
    pub fn get_top_matches(
        &self,
        query: &str,
        candidates: &[Candidate],
        limit: usize,
    ) -> Vec<MatchResult> {
        let mut results: Vec<MatchResult> = candidates
            .iter()
            .filter(|candidate| candidate.has_name())
            .filter_map(|candidate| {
                let score = self.score(query, &candidate.name);
                (score >= self.config.min_score)
                    .then(|| MatchResult::from_candidate(candidate, score))
            })
            .collect();

        results.sort_by(|a, b| b.score.cmp(&a.score));
        results.truncate(limit);
        results
    }
}
