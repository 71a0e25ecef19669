//! Mapping from the model's rich schema to the flat [`NormalizedAnalysis`].
//!
//! Every lookup degrades to a neutral default, so normalization is total over
//! any JSON value, including `{}` and non-objects.

use super::raw::{RawAnalysis, field_text, value_items, value_text};
use super::submission::WritingSubmission;
use super::types::{
    AnalysisMetadata, Correction, DetailedFeedback, Grade, NormalizedAnalysis, Suggestion,
};
use chrono::Utc;
use serde_json::Value;
use tracing::debug;

/// Maximum number of strengths carried into the normalized record.
pub const MAX_STRENGTHS: usize = 5;

/// Normalize a recovered analysis against the submission it describes.
pub fn normalize(
    raw: &RawAnalysis,
    submission: &WritingSubmission,
    api_version: &str,
) -> NormalizedAnalysis {
    let overall_grade = grade_of(raw);
    let grammar_score = raw.score("quickSummary.scores.grammar");
    let vocabulary_score = raw.score("quickSummary.scores.vocabulary");
    let fluency_score = fluency(
        raw.score("quickSummary.scores.structure"),
        raw.score("quickSummary.scores.clarity"),
    );

    let normalized = NormalizedAnalysis {
        overall_grade,
        grammar_score,
        vocabulary_score,
        fluency_score,
        strengths: strengths(raw),
        corrections: corrections(raw),
        suggestions: suggestions(raw),
        detailed_feedback: DetailedFeedback {
            grammar_analysis: grammar_analysis(raw),
            vocabulary_analysis: vocabulary_analysis(raw),
            structure_analysis: raw.text("quickSummary.oneLineFeedback"),
            improvement_areas: improvement_areas(raw),
        },
        metadata: metadata(submission, api_version, None),
        original_schema: Some(raw.clone()),
    };

    debug!(
        grade = %normalized.overall_grade,
        corrections = normalized.corrections.len(),
        suggestions = normalized.suggestions.len(),
        strengths = normalized.strengths.len(),
        "Normalized analysis"
    );
    normalized
}

/// Metadata stamped with the current time and the submission echo.
pub(crate) fn metadata(
    submission: &WritingSubmission,
    api_version: &str,
    error: Option<String>,
) -> AnalysisMetadata {
    AnalysisMetadata {
        topic: submission.topic.title.clone(),
        word_count: submission.word_count,
        writing_time: submission.writing_time,
        analysis_time: Utc::now(),
        api_version: api_version.to_string(),
        difficulty: submission.topic.difficulty.clone(),
        error,
    }
}

fn grade_of(raw: &RawAnalysis) -> Grade {
    raw.text("quickSummary.grade").parse().unwrap_or_default()
}

/// Rounded mean of structure and clarity when both are set, else whichever is.
///
/// A zero score counts as absent, so a missing clarity never halves structure.
pub fn fluency(structure: u8, clarity: u8) -> u8 {
    match (structure, clarity) {
        (0, c) => c,
        (s, 0) => s,
        (s, c) => ((f64::from(s) + f64::from(c)) / 2.0).round() as u8,
    }
}

fn strengths(raw: &RawAnalysis) -> Vec<String> {
    raw.items("wellDone")
        .iter()
        .map(|entry| match entry {
            Value::String(_) => value_text(entry),
            _ => first_non_empty([field_text(entry, "reason"), field_text(entry, "highlight")]),
        })
        .filter(|s| !s.is_empty())
        .take(MAX_STRENGTHS)
        .collect()
}

fn corrections(raw: &RawAnalysis) -> Vec<Correction> {
    raw.items("mustFix")
        .iter()
        .map(|entry| Correction {
            original: field_text(entry, "original"),
            corrected: field_text(entry, "corrected"),
            explanation: field_text(entry, "rule"),
        })
        .filter(|c| !c.original.is_empty() && !c.corrected.is_empty())
        .collect()
}

fn suggestions(raw: &RawAnalysis) -> Vec<Suggestion> {
    raw.items("betterExpressions")
        .iter()
        .filter_map(|entry| {
            let first = entry.get("suggestions").and_then(|s| value_items(s).first())?;
            let improved = match first {
                Value::String(_) => value_text(first),
                _ => field_text(first, "improved"),
            };
            Some(Suggestion {
                current: field_text(entry, "original"),
                improved,
                reason: first_non_empty([field_text(first, "nuance"), field_text(entry, "tip")]),
            })
        })
        .collect()
}

fn grammar_analysis(raw: &RawAnalysis) -> String {
    raw.items("learningPoints.grammarPatterns")
        .iter()
        .map(|p| {
            format!(
                "• {} → {} (ex: {})",
                field_text(p, "pattern"),
                field_text(p, "correct"),
                field_text(p, "practice")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn vocabulary_analysis(raw: &RawAnalysis) -> String {
    raw.items("learningPoints.vocabularyTips")
        .iter()
        .map(|v| {
            let mut line = format!("• {}: {}", field_text(v, "word"), field_text(v, "usage"));
            let collocations: Vec<String> = v
                .get("collocations")
                .map(value_items)
                .unwrap_or(&[])
                .iter()
                .map(value_text)
                .filter(|c| !c.is_empty())
                .collect();
            if !collocations.is_empty() {
                line.push_str(" | collocations: ");
                line.push_str(&collocations.join(", "));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn improvement_areas(raw: &RawAnalysis) -> Vec<String> {
    std::iter::once(raw.text("nextSteps.focusArea"))
        .chain(raw.items("nextSteps.exercises").iter().map(value_text))
        .filter(|s| !s.is_empty())
        .collect()
}

fn first_non_empty<const N: usize>(options: [String; N]) -> String {
    options.into_iter().find(|s| !s.is_empty()).unwrap_or_default()
}
