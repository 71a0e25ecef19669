//! Plain-text rendering of a normalized analysis.

use quill_core::NormalizedAnalysis;
use std::fmt::Write;

/// Render an analysis as a terminal report.
pub fn render(analysis: &NormalizedAnalysis) -> String {
    let mut out = String::new();
    let meta = &analysis.metadata;

    let _ = writeln!(out, "Topic: {} ({})", meta.topic, meta.difficulty);
    let _ = writeln!(
        out,
        "Words: {}   Time: {}s   Model: {}",
        meta.word_count,
        meta.writing_time.as_secs(),
        meta.api_version
    );
    if analysis.is_fallback() {
        let _ = writeln!(
            out,
            "Note: the model response could not be read; showing generic feedback."
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Grade: {}", analysis.overall_grade);
    let _ = writeln!(out, "  Grammar     {:>3}", analysis.grammar_score);
    let _ = writeln!(out, "  Vocabulary  {:>3}", analysis.vocabulary_score);
    let _ = writeln!(out, "  Fluency     {:>3}", analysis.fluency_score);

    let feedback = &analysis.detailed_feedback;
    if !feedback.structure_analysis.is_empty() {
        let _ = writeln!(out, "\n{}", feedback.structure_analysis);
    }

    section(&mut out, "Strengths", analysis.strengths.iter().map(|s| format!("+ {s}")));

    section(
        &mut out,
        "Corrections",
        analysis.corrections.iter().map(|c| {
            if c.explanation.is_empty() {
                format!("- {} -> {}", c.original, c.corrected)
            } else {
                format!("- {} -> {}\n    {}", c.original, c.corrected, c.explanation)
            }
        }),
    );

    section(
        &mut out,
        "Suggestions",
        analysis.suggestions.iter().map(|s| {
            let line = match (s.current.is_empty(), s.improved.is_empty()) {
                (false, false) => format!("* {} -> {}", s.current, s.improved),
                (true, false) => format!("* {}", s.improved),
                _ => format!("* {}", s.current),
            };
            if s.reason.is_empty() {
                line
            } else {
                format!("{line}\n    {}", s.reason)
            }
        }),
    );

    if !feedback.grammar_analysis.is_empty() {
        let _ = writeln!(out, "\nGrammar patterns:\n{}", feedback.grammar_analysis);
    }
    if !feedback.vocabulary_analysis.is_empty() {
        let _ = writeln!(out, "\nVocabulary:\n{}", feedback.vocabulary_analysis);
    }
    section(
        &mut out,
        "Next steps",
        feedback.improvement_areas.iter().map(|a| format!("> {a}")),
    );

    out
}

fn section(out: &mut String, title: &str, lines: impl Iterator<Item = String>) {
    let lines: Vec<String> = lines.collect();
    if lines.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title}:");
    for line in lines {
        let _ = writeln!(out, "  {line}");
    }
}
