//! The normalized analysis record consumed by every front end.

use super::raw::RawAnalysis;
use super::submission::duration_secs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Letter grade assigned to a piece of writing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    #[default]
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    #[serde(rename = "D+")]
    DPlus,
    D,
    F,
}

impl Grade {
    pub const ALL: [Grade; 9] = [
        Grade::APlus,
        Grade::A,
        Grade::BPlus,
        Grade::B,
        Grade::CPlus,
        Grade::C,
        Grade::DPlus,
        Grade::D,
        Grade::F,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a grade string is not one of the nine known grades.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown grade: {0}")]
pub struct UnknownGrade(pub String);

impl FromStr for Grade {
    type Err = UnknownGrade;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Grade::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownGrade(wanted.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub original: String,
    pub corrected: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub current: String,
    pub improved: String,
    pub reason: String,
}

/// Flattened prose sections shown under the scores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedFeedback {
    pub grammar_analysis: String,
    pub vocabulary_analysis: String,
    pub structure_analysis: String,
    pub improvement_areas: Vec<String>,
}

/// Echo of the submission plus processing details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub topic: String,
    pub word_count: usize,
    #[serde(with = "duration_secs")]
    pub writing_time: Duration,
    pub analysis_time: DateTime<Utc>,
    pub api_version: String,
    pub difficulty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The stable analysis contract. Always fully populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAnalysis {
    pub overall_grade: Grade,
    pub grammar_score: u8,
    pub vocabulary_score: u8,
    pub fluency_score: u8,
    pub strengths: Vec<String>,
    pub corrections: Vec<Correction>,
    pub suggestions: Vec<Suggestion>,
    pub detailed_feedback: DetailedFeedback,
    pub metadata: AnalysisMetadata,
    pub original_schema: Option<RawAnalysis>,
}

impl NormalizedAnalysis {
    /// Whether this record came from the fallback path.
    pub fn is_fallback(&self) -> bool {
        self.metadata.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_parse_case_insensitive() {
        assert_eq!("a+".parse::<Grade>().unwrap(), Grade::APlus);
        assert_eq!(" B+ ".parse::<Grade>().unwrap(), Grade::BPlus);
        assert_eq!("f".parse::<Grade>().unwrap(), Grade::F);
        assert!("A/B".parse::<Grade>().is_err());
        assert!("".parse::<Grade>().is_err());
    }

    #[test]
    fn test_grade_display_roundtrips_every_variant() {
        for grade in Grade::ALL {
            assert_eq!(grade.to_string().parse::<Grade>().unwrap(), grade);
        }
    }

    #[test]
    fn test_grade_serde_uses_letter_form() {
        assert_eq!(serde_json::to_string(&Grade::CPlus).unwrap(), "\"C+\"");
        let g: Grade = serde_json::from_str("\"D+\"").unwrap();
        assert_eq!(g, Grade::DPlus);
    }

    #[test]
    fn test_default_grade_is_b() {
        assert_eq!(Grade::default(), Grade::B);
    }

    #[test]
    fn test_metadata_omits_missing_error() {
        let meta = AnalysisMetadata {
            topic: "t".into(),
            word_count: 3,
            writing_time: Duration::from_secs(61),
            analysis_time: Utc::now(),
            api_version: "m".into(),
            difficulty: "Beginner".into(),
            error: None,
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["writingTime"], 61);
        assert_eq!(json["apiVersion"], "m");
    }
}
