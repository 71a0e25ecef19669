//! The writing sample submitted for analysis.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Topic the student wrote about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    pub difficulty: String,
}

impl Topic {
    pub fn new(title: impl Into<String>, difficulty: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            difficulty: difficulty.into(),
        }
    }
}

/// An immutable writing sample plus the context the prompt needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritingSubmission {
    pub topic: Topic,
    pub content: String,
    pub word_count: usize,
    #[serde(with = "duration_secs")]
    pub writing_time: Duration,
}

impl WritingSubmission {
    /// Create a submission, counting whitespace-separated words in `content`.
    pub fn new(topic: Topic, content: impl Into<String>, writing_time: Duration) -> Self {
        let content = content.into();
        let word_count = count_words(&content);
        Self {
            topic,
            content,
            word_count,
            writing_time,
        }
    }

    /// Create a submission with a caller-supplied word count.
    pub fn with_word_count(
        topic: Topic,
        content: impl Into<String>,
        word_count: usize,
        writing_time: Duration,
    ) -> Self {
        Self {
            topic,
            content: content.into(),
            word_count,
            writing_time,
        }
    }

    /// Writing time rendered for the prompt, e.g. `12m 5s`.
    pub fn writing_time_label(&self) -> String {
        let secs = self.writing_time.as_secs();
        match (secs / 60, secs % 60) {
            (0, s) => format!("{s}s"),
            (m, 0) => format!("{m}m"),
            (m, s) => format!("{m}m {s}s"),
        }
    }
}

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Serialize a `Duration` as whole seconds.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
