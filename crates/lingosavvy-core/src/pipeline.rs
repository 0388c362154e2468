//! Analysis pipeline: validate -> prompt -> one generative call -> normalize ->
//! record history -> access gate.
//!
//! Every request is independent. Failures carry diagnostics for the server log
//! only; [`AnalysisError::public_message`] is all a client ever sees.

use crate::access_gate::{project, PublicResult};
use crate::analysis::{AnalysisRequest, AnalysisResult};
use crate::history::HistorySink;
use crate::identity::AuthState;
use crate::llm_bridge::{GenerativeClient, UpstreamError};
use crate::normalizer::{normalize, NormalizationError};
use crate::prompt::build_analysis_prompt;
use std::sync::Arc;
use thiserror::Error;

const GENERIC_FAILURE: &str = "Failed to analyze text. Please try again.";
const EMPTY_TEXT: &str = "Please enter some text to analyze.";

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Blank input; the model was never called.
    #[error("input text is empty")]
    Validation,
    #[error("generative service failed: {0}")]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

impl AnalysisError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Validation => "validation",
            AnalysisError::Upstream(_) => "upstream",
            AnalysisError::Normalization(NormalizationError::Parse { .. }) => "parse",
            AnalysisError::Normalization(NormalizationError::Malformed { .. }) => "malformed",
        }
    }

    /// Message safe to return to the caller. Never includes model output.
    pub fn public_message(&self) -> &'static str {
        match self {
            AnalysisError::Validation => EMPTY_TEXT,
            _ => GENERIC_FAILURE,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, AnalysisError::Validation)
    }
}

/// Runs analyses against one generative client, optionally recording results
/// for authenticated callers.
#[derive(Clone)]
pub struct AnalysisPipeline {
    client: Arc<dyn GenerativeClient>,
    history: Option<Arc<dyn HistorySink>>,
}

impl AnalysisPipeline {
    pub fn new(client: Arc<dyn GenerativeClient>) -> Self {
        Self { client, history: None }
    }

    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    /// Analyze `text` and project the result for `auth`.
    pub async fn analyze(&self, text: &str, auth: &AuthState) -> Result<PublicResult, AnalysisError> {
        let request = AnalysisRequest::new(text).ok_or(AnalysisError::Validation)?;
        let result = self.run(&request).await?;
        self.record(&request, &result, auth);
        Ok(project(result, auth))
    }

    /// The ungated half: one model call plus normalization.
    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let provider = self.client.provider();
        let prompt = build_analysis_prompt(request.text());

        let raw = self.client.generate(&prompt).await.map_err(|e| {
            tracing::warn!(target: "lingosavvy::pipeline", provider, error = %e, "generative call failed");
            AnalysisError::Upstream(e)
        })?;

        match normalize(&raw) {
            Ok(result) => {
                tracing::info!(
                    target: "lingosavvy::pipeline",
                    provider,
                    changes = result.changes.len(),
                    overall = result.ratings.overall,
                    "analysis normalized"
                );
                Ok(result)
            }
            Err(e) => {
                tracing::warn!(
                    target: "lingosavvy::pipeline",
                    provider,
                    error = %e,
                    payload = %e.diagnostic_payload(),
                    "model output rejected"
                );
                Err(e.into())
            }
        }
    }

    fn record(&self, request: &AnalysisRequest, result: &AnalysisResult, auth: &AuthState) {
        let (Some(history), Some(username)) = (&self.history, auth.username()) else {
            return;
        };
        if let Err(e) = history.record(username, request.text(), result) {
            tracing::warn!(target: "lingosavvy::history", username, error = %e, "failed to record analysis");
        }
    }
}
