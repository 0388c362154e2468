//! Access gate: decides how much of an analysis a caller may see.
//!
//! Authenticated callers get the full result. Anonymous callers get a preview
//! with two named rating categories; corrected text and changes are replaced by
//! a gated marker.

use crate::analysis::{AnalysisResult, Change, RatingCategory};
use crate::identity::AuthState;
use serde::Serialize;
use std::collections::BTreeMap;

/// Categories visible in the anonymous preview. Named, so the preview never
/// depends on map iteration order.
pub const PREVIEW_CATEGORIES: [RatingCategory; 2] = [RatingCategory::Grammar, RatingCategory::Clarity];

const GATED_REASON: &str = "Sign in to see the corrected text and suggested changes.";

/// Ratings subset shown to anonymous callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewResult {
    pub ratings: BTreeMap<RatingCategory, u8>,
}

/// What a caller is entitled to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "PublicResponse")]
pub enum PublicResult {
    Full(AnalysisResult),
    Preview(PreviewResult),
}

impl PublicResult {
    pub fn is_full(&self) -> bool {
        matches!(self, PublicResult::Full(_))
    }
}

/// Projects a result for a caller. Total and idempotent.
pub fn project(result: AnalysisResult, auth: &AuthState) -> PublicResult {
    if auth.is_authenticated() {
        return PublicResult::Full(result);
    }
    let ratings = PREVIEW_CATEGORIES
        .into_iter()
        .map(|c| (c, result.ratings.get(c)))
        .collect();
    PublicResult::Preview(PreviewResult { ratings })
}

// Wire shape for the presentation layer.

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum AccessLevel {
    Full,
    Preview,
}

#[derive(Debug, Serialize)]
struct Gated {
    gated: bool,
    reason: &'static str,
}

impl Gated {
    fn marker() -> Self {
        Gated {
            gated: true,
            reason: GATED_REASON,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Visibility<T> {
    Visible(T),
    Gated(Gated),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicResponse {
    access: AccessLevel,
    ratings: BTreeMap<RatingCategory, u8>,
    corrected_text: Visibility<String>,
    changes: Visibility<Vec<Change>>,
}

impl From<PublicResult> for PublicResponse {
    fn from(result: PublicResult) -> Self {
        match result {
            PublicResult::Full(r) => PublicResponse {
                access: AccessLevel::Full,
                ratings: r.ratings.iter().collect(),
                corrected_text: Visibility::Visible(r.corrected_text),
                changes: Visibility::Visible(r.changes),
            },
            PublicResult::Preview(p) => PublicResponse {
                access: AccessLevel::Preview,
                ratings: p.ratings,
                corrected_text: Visibility::Gated(Gated::marker()),
                changes: Visibility::Gated(Gated::marker()),
            },
        }
    }
}
