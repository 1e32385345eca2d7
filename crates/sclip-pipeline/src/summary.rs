//! AI summary client.
//!
//! Calls a Gemini-style generateContent endpoint to produce a short
//! description of the clip, which the summary filter embeds as container
//! metadata and writes to a sidecar file.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the summary service.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("summary service not configured")]
    NotConfigured,

    #[error("summary service error ({status}): {message}")]
    Service { status: u16, message: String },

    #[error("summary service unreachable: {0}")]
    Network(String),

    #[error("empty response from summary service")]
    EmptyResponse,
}

impl From<reqwest::Error> for SummaryError {
    fn from(e: reqwest::Error) -> Self {
        SummaryError::Network(e.to_string())
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Flatten an SRT document into plain transcript text.
pub fn srt_to_text(srt: &str) -> String {
    let mut lines = Vec::new();
    for line in srt.lines() {
        let line = line.trim();
        if line.is_empty() || line.contains("-->") || line.parse::<u32>().is_ok() {
            continue;
        }
        lines.push(line);
    }
    lines.join(" ")
}

/// Client for the summary generation service.
pub struct SummaryClient {
    endpoint: String,
    api_key: String,
    http: reqwest::Client,
}

impl SummaryClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client construction cannot fail with static config");
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            http,
        }
    }

    /// Build a client from optional config values.
    pub fn from_config(url: Option<&str>, key: Option<&str>) -> Option<Self> {
        Some(Self::new(url?, key?))
    }

    /// Generate a one-paragraph summary for a clip.
    pub async fn summarize(
        &self,
        title: &str,
        duration_secs: f64,
        transcript: Option<&str>,
    ) -> Result<String, SummaryError> {
        let mut prompt = format!(
            "Write a single concise paragraph (max 60 words) summarizing a {:.0}-second \
             video clip taken from \"{}\".",
            duration_secs, title
        );
        if let Some(transcript) = transcript {
            // Cap transcript size so the request stays small
            let excerpt: String = transcript.chars().take(4000).collect();
            prompt.push_str("\n\nTranscript excerpt:\n");
            prompt.push_str(&excerpt);
        } else {
            prompt.push_str(" No transcript is available; describe it from the title alone.");
        }

        debug!(endpoint = %self.endpoint, "requesting clip summary");

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&GenerateRequest {
                contents: vec![Content {
                    parts: vec![Part { text: prompt }],
                }],
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SummaryError::Service {
                status: status.as_u16(),
                message: message.lines().next().unwrap_or("").to_string(),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SummaryError::Network(e.to_string()))?;

        let text = body
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(SummaryError::EmptyResponse)?;

        info!(chars = text.len(), "summary generated");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_summarize_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"parts": [{"text": "  A short summary.  "}]}
                }]
            })))
            .mount(&server)
            .await;

        let client = SummaryClient::new(server.uri(), "test-key");
        let summary = client.summarize("Test video", 74.0, None).await.unwrap();
        assert_eq!(summary, "A short summary.");
    }

    #[tokio::test]
    async fn test_summarize_empty_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})),
            )
            .mount(&server)
            .await;

        let client = SummaryClient::new(server.uri(), "test-key");
        let err = client.summarize("Test", 10.0, None).await.unwrap_err();
        assert!(matches!(err, SummaryError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_summarize_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let client = SummaryClient::new(server.uri(), "test-key");
        let err = client.summarize("Test", 10.0, None).await.unwrap_err();
        assert!(matches!(err, SummaryError::Service { status: 429, .. }));
    }

    #[test]
    fn test_srt_to_text_strips_cue_structure() {
        let srt = "1\n00:00:01,000 --> 00:00:03,000\nhello there\n\n2\n00:00:04,000 --> 00:00:06,000\ngeneral kenobi\n";
        assert_eq!(srt_to_text(srt), "hello there general kenobi");
    }

    #[test]
    fn test_from_config_requires_both_values() {
        assert!(SummaryClient::from_config(Some("http://x"), Some("k")).is_some());
        assert!(SummaryClient::from_config(None, Some("k")).is_none());
        assert!(SummaryClient::from_config(Some("http://x"), None).is_none());
    }
}
