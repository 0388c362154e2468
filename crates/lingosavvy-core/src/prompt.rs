//! Prompt contract sent to the generative text service.
//!
//! The model only follows formatting instructions probabilistically, so the
//! "JSON only" constraint is stated twice here and the normalizer still defends
//! against fences and prose independently.

/// Marker line placed directly before the caller's text.
pub const TEXT_BEGIN_MARKER: &str = "<<<TEXT>>>";
/// Marker line placed directly after the caller's text.
pub const TEXT_END_MARKER: &str = "<<<END TEXT>>>";

/// Builds the single instruction string for one analysis. Pure and
/// deterministic: the same text always yields the same prompt.
///
/// `text` is embedded verbatim and unescaped between [`TEXT_BEGIN_MARKER`] and
/// [`TEXT_END_MARKER`]. Blank input must be rejected by the caller.
///
/// Marker strings inside `text` are not escaped either, so the region is only
/// unambiguous if read up to the last end marker before the closing reminder.
pub fn build_analysis_prompt(text: &str) -> String {
    format!(
        r#"You are a language expert who reviews text to enhance clarity, grammar, punctuation, tone, and vocabulary. Analyze the text below and return your review as a single JSON object with exactly this structure:

{{
  "corrected_text": "<the full improved version of the text>",
  "changes": [
    {{
      "type": "grammar" | "clarity" | "tone" | "vocabulary",
      "original": "<original word or phrase>",
      "corrected": "<corrected word or phrase>"
    }}
  ],
  "ratings": {{
    "grammar": <integer from 0 to 10>,
    "vocabulary": <integer from 0 to 10>,
    "clarity": <integer from 0 to 10>,
    "overall": <integer from 0 to 10>
  }}
}}

Rules:
- Respond with ONLY the JSON object. Do not wrap it in markdown code fences and do not add any text before or after it.
- "changes" lists every edit in the order it appears in the text; use an empty array if no edits are needed.
- "type" must be one of: grammar, clarity, tone, vocabulary.
- Every rating must be a whole number between 0 and 10.

Here is the text to be analyzed, between the {begin} and {end} markers:
{begin}
{text}
{end}

Remember: output only the raw JSON object, with no code fences and no commentary."#,
        begin = TEXT_BEGIN_MARKER,
        end = TEXT_END_MARKER,
        text = text,
    )
}
