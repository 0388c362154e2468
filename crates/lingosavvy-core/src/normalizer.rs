//! Response normalizer: raw model text -> validated [`AnalysisResult`].
//!
//! Stages run in order: fence stripping, strict JSON parse, shape validation.
//! There is no retry and no regex salvage; a payload that does not parse after
//! fence stripping fails outright.

use crate::analysis::{AnalysisResult, Change, ChangeType, Ratings, RatingCategory, MAX_RATING};
use serde_json::{Map, Value};
use thiserror::Error;

const OPENING_FENCE: &str = "```json";
const CLOSING_FENCE: &str = "```";

/// Why a model response could not become an [`AnalysisResult`]. Both variants
/// keep their diagnostic payload for server-side logs only.
#[derive(Debug, Error)]
pub enum NormalizationError {
    /// Not JSON after fence stripping. `raw` is the untouched model output.
    #[error("model output is not valid JSON: {source}")]
    Parse {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
    /// Valid JSON with the wrong shape. `value` is the parsed object.
    #[error("model output has an invalid shape: {reason}")]
    Malformed { reason: String, value: Value },
}

impl NormalizationError {
    /// Payload for diagnostic logging: the raw text or the parsed value.
    pub fn diagnostic_payload(&self) -> String {
        match self {
            NormalizationError::Parse { raw, .. } => raw.clone(),
            NormalizationError::Malformed { value, .. } => value.to_string(),
        }
    }

    fn malformed(reason: impl Into<String>, value: &Value) -> Self {
        NormalizationError::Malformed {
            reason: reason.into(),
            value: value.clone(),
        }
    }
}

/// Removes a leading "```json" and a trailing "```" if present. Prefix/suffix
/// only; fences inside the payload are left alone.
pub fn strip_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix(OPENING_FENCE) {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix(CLOSING_FENCE) {
        s = rest;
    }
    s.trim()
}

/// Normalizes raw model output into a validated result.
pub fn normalize(raw: &str) -> Result<AnalysisResult, NormalizationError> {
    let cleaned = strip_fences(raw);
    let value: Value = serde_json::from_str(cleaned).map_err(|source| NormalizationError::Parse {
        raw: raw.to_string(),
        source,
    })?;
    validate(&value)
}

/// Shape validation of an already-parsed value.
pub fn validate(value: &Value) -> Result<AnalysisResult, NormalizationError> {
    let obj = value
        .as_object()
        .ok_or_else(|| NormalizationError::malformed("top-level value is not an object", value))?;

    let corrected_text = match obj.get("corrected_text") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(NormalizationError::malformed("corrected_text is not a string", value)),
        None => return Err(NormalizationError::malformed("corrected_text is missing", value)),
    };

    let changes = match obj.get("changes") {
        None => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                parse_change(item).map_err(|reason| {
                    NormalizationError::malformed(format!("changes[{}]: {}", i, reason), value)
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => return Err(NormalizationError::malformed("changes is not an array", value)),
    };

    let ratings = match obj.get("ratings") {
        Some(Value::Object(map)) => {
            parse_ratings(map).map_err(|reason| NormalizationError::malformed(reason, value))?
        }
        Some(_) => return Err(NormalizationError::malformed("ratings is not an object", value)),
        None => return Err(NormalizationError::malformed("ratings is missing", value)),
    };

    Ok(AnalysisResult {
        corrected_text,
        changes,
        ratings,
    })
}

fn parse_change(item: &Value) -> Result<Change, String> {
    let obj = item.as_object().ok_or("not an object")?;
    let type_name = string_field(obj, "type")?;
    let change_type =
        ChangeType::parse(type_name).ok_or_else(|| format!("unknown change type {:?}", type_name))?;
    Ok(Change {
        change_type,
        original: string_field(obj, "original")?.to_string(),
        corrected: string_field(obj, "corrected")?.to_string(),
    })
}

fn string_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Result<&'a str, String> {
    match obj.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(format!("{} is not a string", key)),
        None => Err(format!("{} is missing", key)),
    }
}

fn parse_ratings(map: &Map<String, Value>) -> Result<Ratings, String> {
    let score = |category: RatingCategory| -> Result<u8, String> {
        let v = map
            .get(category.as_str())
            .ok_or_else(|| format!("ratings.{} is missing", category))?;
        match v.as_u64() {
            Some(n) if n <= u64::from(MAX_RATING) => Ok(n as u8),
            _ => Err(format!(
                "ratings.{} must be an integer in 0..={}, got {}",
                category, MAX_RATING, v
            )),
        }
    };
    Ok(Ratings {
        grammar: score(RatingCategory::Grammar)?,
        vocabulary: score(RatingCategory::Vocabulary)?,
        clarity: score(RatingCategory::Clarity)?,
        overall: score(RatingCategory::Overall)?,
    })
}
