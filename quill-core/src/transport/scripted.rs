//! Scripted [`HttpTransport`] for tests.
//!
//! Available to this crate's unit tests and, behind the `test-util` feature,
//! to integration tests and downstream crates.

use super::{HttpReply, HttpTransport};
use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// In-memory transport that replays queued outcomes and records requests.
///
/// An exhausted queue yields a network error.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpReply, TransportError>>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply with the given status and body.
    pub fn push_reply(&self, status: u16, body: impl Into<String>) -> &Self {
        self.push(Ok(HttpReply::new(status, body)))
    }

    /// Queue a connection-level failure.
    pub fn push_network_error(&self, message: impl Into<String>) -> &Self {
        self.push(Err(TransportError::Network {
            message: message.into(),
        }))
    }

    /// Queue a 200 reply whose single candidate carries `text`.
    pub fn push_candidate_text(&self, text: &str) -> &Self {
        let envelope = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": text}]}}]
        });
        self.push_reply(200, envelope.to_string())
    }

    fn push(&self, outcome: Result<HttpReply, TransportError>) -> &Self {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
        self
    }

    /// Requests seen so far, as `(url, body)` pairs.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((url.to_string(), body.clone()));
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| {
                Err(TransportError::Network {
                    message: "no scripted reply left".to_string(),
                })
            })
    }
}
