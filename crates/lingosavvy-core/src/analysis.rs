//! Analysis data model: the validated result of one critique cycle.
//!
//! Field names follow the JSON contract the model is asked to produce
//! (`corrected_text`, `changes`, `ratings`), so a result serialized with serde
//! normalizes back to an equal value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest score a rating may carry.
pub const MAX_RATING: u8 = 10;

/// Fixed rating categories. Every valid result carries all four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingCategory {
    Grammar,
    Vocabulary,
    Clarity,
    Overall,
}

impl RatingCategory {
    /// All categories in prompt order.
    pub const ALL: [RatingCategory; 4] = [
        RatingCategory::Grammar,
        RatingCategory::Vocabulary,
        RatingCategory::Clarity,
        RatingCategory::Overall,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RatingCategory::Grammar => "grammar",
            RatingCategory::Vocabulary => "vocabulary",
            RatingCategory::Clarity => "clarity",
            RatingCategory::Overall => "overall",
        }
    }
}

impl fmt::Display for RatingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a suggested edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Grammar,
    Clarity,
    Tone,
    Vocabulary,
}

impl ChangeType {
    pub const ALL: [ChangeType; 4] = [
        ChangeType::Grammar,
        ChangeType::Clarity,
        ChangeType::Tone,
        ChangeType::Vocabulary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Grammar => "grammar",
            ChangeType::Clarity => "clarity",
            ChangeType::Tone => "tone",
            ChangeType::Vocabulary => "vocabulary",
        }
    }

    /// Exact, case-sensitive lookup of a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

/// One suggested edit. `original` is an excerpt as the model reported it and is
/// not guaranteed to occur verbatim in the input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub original: String,
    pub corrected: String,
}

/// Scores for the four fixed categories, each in `0..=MAX_RATING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratings {
    pub grammar: u8,
    pub vocabulary: u8,
    pub clarity: u8,
    pub overall: u8,
}

impl Ratings {
    pub fn get(&self, category: RatingCategory) -> u8 {
        match category {
            RatingCategory::Grammar => self.grammar,
            RatingCategory::Vocabulary => self.vocabulary,
            RatingCategory::Clarity => self.clarity,
            RatingCategory::Overall => self.overall,
        }
    }

    /// `(category, score)` pairs in prompt order.
    pub fn iter(&self) -> impl Iterator<Item = (RatingCategory, u8)> + '_ {
        RatingCategory::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

/// Validated output of one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub corrected_text: String,
    /// Model order, never re-sorted.
    pub changes: Vec<Change>,
    pub ratings: Ratings,
}

/// Text submitted for analysis. Construction rejects blank input so nothing
/// downstream ever sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    text: String,
}

impl AnalysisRequest {
    /// Returns `None` when the text is empty after trimming. The text itself is
    /// kept untrimmed.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self { text })
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
