//! Writing analysis facade.
//!
//! Wires prompt building, transport, and recovery together. Configuration and
//! transport failures surface as errors; anything that goes wrong while
//! recovering the model output becomes a fallback analysis instead.

use crate::analysis::{NormalizedAnalysis, WritingSubmission, fallback, normalize};
use crate::config::{PromptOptions, QuillConfig};
use crate::credentials::CredentialStore;
use crate::debug_cache::RawResponseCache;
use crate::error::Result;
use crate::prompt::build_analysis_prompt;
use crate::recovery::recover;
use crate::transport::GeminiClient;
use std::sync::Arc;
use tracing::{debug, info};

pub struct WritingAnalyzer {
    client: GeminiClient,
    prompt_options: PromptOptions,
    debug_cache: Arc<RawResponseCache>,
}

impl WritingAnalyzer {
    pub fn new(client: GeminiClient, prompt_options: PromptOptions) -> Self {
        Self {
            client,
            prompt_options,
            debug_cache: Arc::new(RawResponseCache::new()),
        }
    }

    /// Analyzer over the real HTTP transport, with the debug mirror from `config`.
    pub fn from_config(config: &QuillConfig, store: &dyn CredentialStore) -> Result<Self> {
        let client = GeminiClient::from_config(config, store)?;
        let cache = match &config.debug.raw_response_path {
            Some(path) => RawResponseCache::with_mirror(path),
            None => RawResponseCache::new(),
        };
        Ok(Self::new(client, config.prompt.clone()).with_debug_cache(Arc::new(cache)))
    }

    pub fn with_debug_cache(mut self, cache: Arc<RawResponseCache>) -> Self {
        self.debug_cache = cache;
        self
    }

    pub fn debug_cache(&self) -> &Arc<RawResponseCache> {
        &self.debug_cache
    }

    pub fn client(&self) -> &GeminiClient {
        &self.client
    }

    /// Analyze a submission end to end.
    pub async fn analyze(&self, submission: &WritingSubmission) -> Result<NormalizedAnalysis> {
        let prompt = build_analysis_prompt(submission, &self.prompt_options);
        debug!(
            topic = %submission.topic.title,
            words = submission.word_count,
            prompt_len = prompt.len(),
            "Starting writing analysis"
        );

        let raw_text = self.client.send(&prompt).await?;
        self.debug_cache.record(&raw_text);

        let analysis = recover_analysis(&raw_text, submission, self.client.model());
        info!(
            grade = %analysis.overall_grade,
            fallback = analysis.is_fallback(),
            "Writing analysis complete"
        );
        Ok(analysis)
    }
}

/// Recover a normalized analysis from raw model text. Never fails.
pub fn recover_analysis(
    raw_text: &str,
    submission: &WritingSubmission,
    api_version: &str,
) -> NormalizedAnalysis {
    match recover(raw_text) {
        Ok(raw) => normalize(&raw, submission, api_version),
        Err(e) => fallback(submission, &e, api_version),
    }
}
