//! Writing submissions and the analysis records derived from model output.

pub mod fallback;
pub mod normalize;
pub mod raw;
pub mod submission;
pub mod types;

pub use fallback::{FALLBACK_SUFFIX, PARSING_FAILURE, fallback};
pub use normalize::normalize;
pub use raw::RawAnalysis;
pub use submission::{Topic, WritingSubmission, count_words};
pub use types::{
    AnalysisMetadata, Correction, DetailedFeedback, Grade, NormalizedAnalysis, Suggestion,
    UnknownGrade,
};
