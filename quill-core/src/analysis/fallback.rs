//! Degraded analysis returned when the model output cannot be recovered.

use super::normalize::metadata;
use super::submission::WritingSubmission;
use super::types::{Correction, DetailedFeedback, Grade, NormalizedAnalysis, Suggestion};
use crate::error::RecoveryError;
use tracing::warn;

/// Appended to the model name in `metadata.apiVersion` of fallback records.
pub const FALLBACK_SUFFIX: &str = "-fallback";

/// Value of `metadata.error` on fallback records.
pub const PARSING_FAILURE: &str = "parsing_failure";

/// Neutral score used for every category.
pub const FALLBACK_SCORE: u8 = 70;

/// Build the fixed fallback record for `submission`.
///
/// `api_version` is the model name; the fallback tag is appended here.
pub fn fallback(
    submission: &WritingSubmission,
    cause: &RecoveryError,
    api_version: &str,
) -> NormalizedAnalysis {
    warn!(error = %cause, "Creating fallback response due to parsing failure");

    NormalizedAnalysis {
        overall_grade: Grade::B,
        grammar_score: FALLBACK_SCORE,
        vocabulary_score: FALLBACK_SCORE,
        fluency_score: FALLBACK_SCORE,
        strengths: vec![
            "You completed the writing task. That effort matters.".to_string(),
            "Your content stays on the assigned topic.".to_string(),
        ],
        corrections: vec![Correction {
            original: "Analysis could not be completed".to_string(),
            corrected: "Temporary analysis error".to_string(),
            explanation: "The AI analysis failed temporarily. Please try again.".to_string(),
        }],
        suggestions: vec![Suggestion {
            current: "Analysis unavailable".to_string(),
            improved: "Analysis temporarily unavailable".to_string(),
            reason: "Please try again in a moment.".to_string(),
        }],
        detailed_feedback: DetailedFeedback {
            grammar_analysis: "AI analysis is temporarily unavailable. Please try again."
                .to_string(),
            vocabulary_analysis: "Submit again for a vocabulary analysis.".to_string(),
            structure_analysis: "Structure analysis will be provided once it is ready."
                .to_string(),
            improvement_areas: vec!["Request the analysis again".to_string()],
        },
        metadata: metadata(
            submission,
            &format!("{api_version}{FALLBACK_SUFFIX}"),
            Some(PARSING_FAILURE.to_string()),
        ),
        original_schema: None,
    }
}
