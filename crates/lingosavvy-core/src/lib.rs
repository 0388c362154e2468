//! LingoSavvy — Core library.
//! Writing-critique pipeline: prompt contract, model-output normalization and
//! privilege-gated results.

pub mod access_gate;
pub mod analysis;
pub mod config;
pub mod history;
pub mod identity;
pub mod llm_bridge;
pub mod normalizer;
pub mod pipeline;
pub mod prompt;

pub use access_gate::{project, PreviewResult, PublicResult, PREVIEW_CATEGORIES};
pub use analysis::{AnalysisRequest, AnalysisResult, Change, ChangeType, RatingCategory, Ratings, MAX_RATING};
pub use config::{GatewayConfig, LlmProvider, TokenEntry};
pub use history::{HistoryEntry, HistoryError, HistorySink, SledHistory};
pub use identity::{AuthState, TokenRegistry, UnknownToken};
pub use llm_bridge::{GeminiClient, GenerativeClient, OpenRouterClient, UpstreamError};
pub use normalizer::{normalize, strip_fences, NormalizationError};
pub use pipeline::{AnalysisError, AnalysisPipeline};
pub use prompt::build_analysis_prompt;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
