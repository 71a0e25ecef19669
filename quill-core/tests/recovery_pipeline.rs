//! End-to-end tests for recovering analyses from raw model text.

use std::time::Duration;

use pretty_assertions::assert_eq;
use quill_core::analysis::{Correction, Grade, PARSING_FAILURE, Topic, WritingSubmission};
use quill_core::{RecoveryError, recover, recover_analysis};
use serde_json::json;

const MODEL: &str = "gemini-2.5-flash-lite-preview-06-17";

fn submission() -> WritingSubmission {
    WritingSubmission::new(
        Topic::new("My school", "Beginner"),
        "I go school by bus. It is fun.",
        Duration::from_secs(540),
    )
}

#[test]
fn clean_response_is_normalized() {
    let raw = r#"{"quickSummary":{"grade":"A","scores":{"grammar":90,"vocabulary":85,"structure":88,"clarity":92}},"mustFix":[{"original":"I go school","corrected":"I go to school","rule":"missing preposition"}],"wellDone":[{"highlight":"nice flow","reason":"clear transitions"}]}"#;

    let analysis = recover_analysis(raw, &submission(), MODEL);

    assert_eq!(analysis.overall_grade, Grade::A);
    assert_eq!(analysis.grammar_score, 90);
    assert_eq!(analysis.vocabulary_score, 85);
    assert_eq!(analysis.fluency_score, 90);
    assert_eq!(
        analysis.corrections,
        vec![Correction {
            original: "I go school".into(),
            corrected: "I go to school".into(),
            explanation: "missing preposition".into(),
        }]
    );
    assert_eq!(analysis.strengths, vec!["clear transitions".to_string()]);
    assert_eq!(analysis.metadata.api_version, MODEL);
    assert_eq!(analysis.metadata.topic, "My school");
    assert_eq!(analysis.metadata.word_count, 8);
    assert!(analysis.metadata.error.is_none());
    assert!(analysis.original_schema.is_some());
}

#[test]
fn malformed_fenced_response_is_repaired() {
    let raw = "```json\n{\"quickSummary\":{\"grade\":\"B\",} \"mustFix\":[{\"original\":\"a\" \"corrected\":\"b\"}]}\n```";

    let recovered = recover(raw).unwrap();
    assert_eq!(
        recovered.as_value(),
        &json!({"quickSummary": {"grade": "B"}, "mustFix": [{"original": "a", "corrected": "b"}]})
    );

    let analysis = recover_analysis(raw, &submission(), MODEL);
    assert_eq!(analysis.overall_grade, Grade::B);
    assert!(!analysis.is_fallback());
    assert_eq!(analysis.corrections.len(), 1);
    assert_eq!(analysis.corrections[0].corrected, "b");
}

#[test]
fn trailing_footnote_does_not_replace_payload() {
    let raw = r#"{"quickSummary":{"grade":"A",}} (see [1])"#;

    let analysis = recover_analysis(raw, &submission(), MODEL);
    assert!(!analysis.is_fallback());
    assert_eq!(analysis.overall_grade, Grade::A);
}

#[test]
fn trailing_example_object_does_not_replace_payload() {
    let raw = "```json\n{\"quickSummary\":{\"grade\":\"A\" \"scores\":{\"grammar\":90}}}\n```\nFormat reminder: {\"grade\": \"B\"}";

    let analysis = recover_analysis(raw, &submission(), MODEL);
    assert!(!analysis.is_fallback());
    assert_eq!(analysis.overall_grade, Grade::A);
    assert_eq!(analysis.grammar_score, 90);
}

#[test]
fn bracketed_prose_before_payload_is_skipped() {
    let raw = r#"As noted in [1], here it is: {"quickSummary":{"grade":"B","scores":{"grammar":70}}}"#;

    let analysis = recover_analysis(raw, &submission(), MODEL);
    assert!(!analysis.is_fallback());
    assert_eq!(analysis.overall_grade, Grade::B);
    assert_eq!(analysis.grammar_score, 70);
}

#[test]
fn unrecoverable_response_falls_back() {
    let raw = "Sorry, I cannot help with that.";
    assert_eq!(recover(raw).unwrap_err(), RecoveryError::ExtractionFailed);

    let analysis = recover_analysis(raw, &submission(), MODEL);
    assert!(analysis.is_fallback());
    assert_eq!(analysis.metadata.api_version, format!("{MODEL}-fallback"));
    assert_eq!(analysis.metadata.error.as_deref(), Some(PARSING_FAILURE));
    assert_eq!(
        (analysis.grammar_score, analysis.vocabulary_score, analysis.fluency_score),
        (70, 70, 70)
    );
    assert!(analysis.original_schema.is_none());
}

#[test]
fn empty_response_falls_back() {
    let analysis = recover_analysis("", &submission(), MODEL);
    assert!(analysis.is_fallback());
}

#[test]
fn truncated_response_keeps_recovered_prefix() {
    let raw = r#"{"quickSummary":{"grade":"B+","scores":{"grammar":80,"vocabulary":75"#;
    let analysis = recover_analysis(raw, &submission(), MODEL);
    assert!(!analysis.is_fallback());
    assert_eq!(analysis.overall_grade, Grade::BPlus);
    assert_eq!(analysis.grammar_score, 80);
    assert_eq!(analysis.vocabulary_score, 75);
    assert_eq!(analysis.fluency_score, 0);
}

#[test]
fn truncated_mid_string_in_array() {
    let raw = r#"Here you go: {"wellDone":[{"reason":"good opening"},{"reason":"vivid detai"#;
    let analysis = recover_analysis(raw, &submission(), MODEL);
    assert_eq!(
        analysis.strengths,
        vec!["good opening".to_string(), "vivid detai".to_string()]
    );
}

#[test]
fn smart_quotes_and_bullets_are_repaired() {
    let raw = "{\u{201C}quickSummary\u{201D}: {\u{201C}grade\u{201D}: \u{201C}C+\u{201D}}, \"nextSteps\": {\"focusArea\": \"Articles\", \"exercises\": [\"Drill A\" - \"Drill B\"]}}";
    let analysis = recover_analysis(raw, &submission(), MODEL);
    assert_eq!(analysis.overall_grade, Grade::CPlus);
    assert_eq!(
        analysis.detailed_feedback.improvement_areas,
        vec!["Articles", "Drill A", "Drill B"]
    );
}

#[test]
fn quoted_payload_is_unwrapped() {
    let inner = json!({"quickSummary": {"grade": "D"}}).to_string();
    let raw = serde_json::to_string(&inner).unwrap();
    let analysis = recover_analysis(&raw, &submission(), MODEL);
    assert_eq!(analysis.overall_grade, Grade::D);
}

#[test]
fn serialized_record_uses_camel_case_contract() {
    let analysis = recover_analysis(r#"{"quickSummary":{"grade":"A+"}}"#, &submission(), MODEL);
    let value = serde_json::to_value(&analysis).unwrap();
    for key in [
        "overallGrade",
        "grammarScore",
        "vocabularyScore",
        "fluencyScore",
        "strengths",
        "corrections",
        "suggestions",
        "detailedFeedback",
        "metadata",
        "originalSchema",
    ] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["overallGrade"], "A+");
    assert_eq!(value["detailedFeedback"]["improvementAreas"], json!([]));
    assert_eq!(value["metadata"]["writingTime"], 540);
    assert!(value["metadata"]["analysisTime"].is_string());
}
