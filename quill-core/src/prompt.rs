//! Analysis prompt construction.
//!
//! The prompt embeds the submission, the exact JSON schema the model must
//! return, and strict output rules. Building it has no side effects.

use crate::analysis::WritingSubmission;
use crate::config::PromptOptions;
use std::fmt::Write;

/// Target schema, sent verbatim.
pub const RESPONSE_SCHEMA: &str = r#"{
    "quickSummary": {
        "grade": "A+/A/B+/B/C+/C/D+/D/F",
        "oneLineFeedback": "Core feedback in one sentence (LANG)",
        "scores": {
            "grammar": 0-100,
            "vocabulary": 0-100,
            "structure": 0-100,
            "clarity": 0-100
        }
    },
    "mustFix": [
        {
            "priority": "High/Medium/Low",
            "original": "Original text",
            "corrected": "Corrected version",
            "rule": "Brief grammar rule explanation (LANG)",
            "example": "Similar correct example sentence"
        }
    ],
    "betterExpressions": [
        {
            "original": "Current expression",
            "suggestions": [
                {
                    "improved": "Improvement option 1",
                    "level": "Basic/Intermediate/Advanced",
                    "nuance": "Nuance explanation (LANG)"
                }
            ],
            "tip": "Practical tip (LANG)"
        }
    ],
    "wellDone": [
        {
            "highlight": "Quote of good writing",
            "reason": "Why this is good (LANG)"
        }
    ],
    "learningPoints": {
        "grammarPatterns": [
            {
                "pattern": "Frequently mistaken pattern",
                "correct": "Correct usage",
                "practice": "Practice example"
            }
        ],
        "vocabularyTips": [
            {
                "word": "Word/Expression",
                "usage": "Proper usage",
                "collocations": ["Common collocations"]
            }
        ]
    },
    "nextSteps": {
        "focusArea": "Area to focus on next (LANG)",
        "exercises": ["Recommended exercise 1", "Recommended exercise 2"],
        "goalSetting": "Goal for next writing (LANG)"
    },
    "modelAnswer": "A model answer for the same topic (one level higher than the student's current level)"
}"#;

const ANALYSIS_CRITERIA: &[&str] = &[
    "Focus on grammar mistakes commonly made by LANG-speaking learners",
    "Identify literal translations and provide natural English alternatives",
    "Check naturalness of sentence connections and transition phrases",
    "Find repetitive expressions and suggest variety",
    "Evaluate overall logical flow and paragraph organization",
];

const FEEDBACK_PRINCIPLES: &[&str] = &[
    "Present the 3 most important corrections first",
    "Always mention strengths for motivation",
    "Explain \"why\" for each correction",
    "Group similar mistakes into patterns",
    "Provide practical, usable example sentences",
];

const LEARNER_CHECKS: &[&str] = &[
    "Pay special attention to article usage (a/an/the)",
    "Check for subject-verb agreement issues",
    "Identify preposition errors",
    "Look for word order problems, especially with adverbs",
    "Check for tense consistency throughout the writing",
    "Identify missing or unnecessary plural markers",
    "Note any direct translations that sound unnatural",
];

const OUTPUT_REQUIREMENTS: &[&str] = &[
    "Return STRICT JSON only. No markdown, no code fences, no prose before/after.",
    "Use double quotes for all keys and string values.",
    "Do not include trailing commas.",
    "Ensure arrays and objects are valid JSON.",
];

/// Build the analysis prompt for a submission.
pub fn build_analysis_prompt(submission: &WritingSubmission, options: &PromptOptions) -> String {
    let lang = options.feedback_language.trim();
    let lang = if lang.is_empty() { "English" } else { lang };
    let mut prompt = String::with_capacity(4096 + submission.content.len());

    // Writing into a String cannot fail.
    let _ = writeln!(
        prompt,
        "Please analyze this English writing and provide comprehensive feedback in {lang}.\n"
    );
    let _ = writeln!(prompt, "**Writing Information:**");
    let _ = writeln!(prompt, "- Topic: {}", submission.topic.title);
    let _ = writeln!(prompt, "- Level: {}", submission.topic.difficulty);
    let _ = writeln!(prompt, "- Length: {} words", submission.word_count);
    let _ = writeln!(prompt, "- Time: {}\n", submission.writing_time_label());
    let _ = writeln!(prompt, "**Student's Writing:**");
    let _ = writeln!(prompt, "{}\n", submission.content.trim());

    let _ = writeln!(
        prompt,
        "Please provide a detailed analysis in the following JSON format:\n"
    );
    prompt.push_str(&RESPONSE_SCHEMA.replace("LANG", lang));
    prompt.push_str("\n\n");

    push_list(&mut prompt, "Analysis Criteria", ANALYSIS_CRITERIA, lang, true);
    push_list(&mut prompt, "Feedback Principles", FEEDBACK_PRINCIPLES, lang, false);
    push_list(&mut prompt, "Learner-Specific Checks", LEARNER_CHECKS, lang, false);

    let _ = writeln!(prompt, "**Response Language:**");
    let _ = writeln!(
        prompt,
        "- All explanations, feedback, and tips should be in {lang}"
    );
    let _ = writeln!(
        prompt,
        "- Only the corrected sentences and examples should be in English"
    );
    let _ = writeln!(
        prompt,
        "- Use clear, encouraging {lang} that's easy to understand"
    );
    let _ = writeln!(
        prompt,
        "- Avoid overly technical linguistic terms unless necessary\n"
    );

    let _ = writeln!(prompt, "STRICT OUTPUT REQUIREMENTS:");
    for rule in OUTPUT_REQUIREMENTS {
        let _ = writeln!(prompt, "- {rule}");
    }
    prompt
}

fn push_list(prompt: &mut String, title: &str, items: &[&str], lang: &str, numbered: bool) {
    let _ = writeln!(prompt, "**{title}:**");
    for (i, item) in items.iter().enumerate() {
        let item = item.replace("LANG", lang);
        if numbered {
            let _ = writeln!(prompt, "{}. {item}", i + 1);
        } else {
            let _ = writeln!(prompt, "- {item}");
        }
    }
    prompt.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Topic;
    use std::time::Duration;

    fn submission() -> WritingSubmission {
        WritingSubmission::new(
            Topic::new("My hometown", "Intermediate"),
            "My hometown is small but beautiful.",
            Duration::from_secs(905),
        )
    }

    #[test]
    fn test_prompt_embeds_submission() {
        let prompt = build_analysis_prompt(&submission(), &PromptOptions::default());
        assert!(prompt.contains("- Topic: My hometown"));
        assert!(prompt.contains("- Level: Intermediate"));
        assert!(prompt.contains("- Length: 6 words"));
        assert!(prompt.contains("- Time: 15m 5s"));
        assert!(prompt.contains("My hometown is small but beautiful."));
    }

    #[test]
    fn test_prompt_embeds_schema_and_rules() {
        let prompt = build_analysis_prompt(&submission(), &PromptOptions::default());
        for key in [
            "\"quickSummary\"",
            "\"mustFix\"",
            "\"betterExpressions\"",
            "\"wellDone\"",
            "\"learningPoints\"",
            "\"nextSteps\"",
            "\"modelAnswer\"",
        ] {
            assert!(prompt.contains(key), "missing {key}");
        }
        assert!(prompt.contains("Return STRICT JSON only"));
        assert!(prompt.contains("Do not include trailing commas."));
        assert!(prompt.contains("1. Focus on grammar mistakes"));
    }

    #[test]
    fn test_feedback_language_substituted() {
        let prompt = build_analysis_prompt(
            &submission(),
            &PromptOptions {
                feedback_language: "Japanese".into(),
            },
        );
        assert!(prompt.contains("comprehensive feedback in Japanese."));
        assert!(prompt.contains("Why this is good (Japanese)"));
        assert!(!prompt.contains("LANG"));
        assert!(!prompt.contains("Korean"));
    }

    #[test]
    fn test_blank_language_defaults_to_english() {
        let prompt = build_analysis_prompt(
            &submission(),
            &PromptOptions {
                feedback_language: "  ".into(),
            },
        );
        assert!(prompt.contains("comprehensive feedback in English."));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let a = build_analysis_prompt(&submission(), &PromptOptions::default());
        let b = build_analysis_prompt(&submission(), &PromptOptions::default());
        assert_eq!(a, b);
    }
}
