//! Attention classifier adapter
//!
//! The classifier is an external ML service. The pipeline only depends on
//! the `AttentionClassifier` trait; `HttpClassifier` is the production
//! implementation that POSTs base64 frames to the inference endpoint.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("classwatch-hub/", env!("CARGO_PKG_VERSION"));

/// Classifier client errors
///
/// Every variant is fatal for the frame being analyzed and worth retrying.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Classifier timed out")]
    Timeout,

    #[error("Classifier returned {0}: {1}")]
    Status(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// One frame to classify
#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub student_id: String,
    pub frame_id: String,
    pub frame: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl ClassifyRequest {
    pub fn new(student_id: &str, frame: Vec<u8>, timestamp: DateTime<Utc>) -> Self {
        Self {
            student_id: student_id.to_string(),
            frame_id: format!("frame_{}_{}", student_id, timestamp.timestamp_millis()),
            frame,
            timestamp,
        }
    }
}

/// Classifier response
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierOutput {
    /// Label as sent by the service; validated by the pipeline
    pub attention_label: String,
    pub student_id: Option<String>,
    pub attention_score: Option<f64>,
    /// Full response body, forwarded to observers unchanged
    pub raw: serde_json::Value,
}

impl ClassifierOutput {
    /// Extract the known fields from a response body
    pub fn from_json(raw: serde_json::Value) -> Result<Self, ClassifierError> {
        let attention_label = raw
            .get("attentionLabel")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ClassifierError::Parse("response has no attentionLabel".to_string()))?
            .to_string();
        let student_id = raw
            .get("studentId")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let attention_score = raw.get("attentionScore").and_then(|v| v.as_f64());

        Ok(Self {
            attention_label,
            student_id,
            attention_score,
            raw,
        })
    }
}

/// Classifies the attention of the student in one frame
#[async_trait]
pub trait AttentionClassifier: Send + Sync {
    async fn classify(&self, request: ClassifyRequest) -> Result<ClassifierOutput, ClassifierError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyPayload<'a> {
    student_id: &'a str,
    frame_id: &'a str,
    frame_base64: String,
    timestamp: String,
}

/// HTTP client for the inference service
pub struct HttpClassifier {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AttentionClassifier for HttpClassifier {
    async fn classify(&self, request: ClassifyRequest) -> Result<ClassifierOutput, ClassifierError> {
        let payload = ClassifyPayload {
            student_id: &request.student_id,
            frame_id: &request.frame_id,
            frame_base64: STANDARD.encode(&request.frame),
            timestamp: request.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        };

        tracing::debug!(
            student_id = %request.student_id,
            frame_id = %request.frame_id,
            frame_bytes = request.frame.len(),
            "Sending frame to classifier"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout
                } else {
                    ClassifierError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Status(status.as_u16(), error_text));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ClassifierError::Timeout
            } else {
                ClassifierError::Parse(e.to_string())
            }
        })?;

        ClassifierOutput::from_json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = HttpClassifier::new("http://127.0.0.1:9/analyze", Duration::from_secs(10));
        assert!(client.is_ok());
        assert_eq!(client.unwrap().endpoint(), "http://127.0.0.1:9/analyze");
    }

    #[test]
    fn test_frame_id_includes_student_and_time() {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let request = ClassifyRequest::new("s-7", vec![1, 2, 3], ts);
        assert_eq!(request.frame_id, format!("frame_s-7_{}", ts.timestamp_millis()));
    }

    #[test]
    fn test_output_keeps_unknown_fields() {
        let body = json!({
            "attentionLabel": "attentive",
            "studentId": "s-1",
            "attentionScore": 0.82,
            "gaze": {"yaw": 3.5}
        });
        let output = ClassifierOutput::from_json(body.clone()).unwrap();
        assert_eq!(output.attention_label, "attentive");
        assert_eq!(output.student_id.as_deref(), Some("s-1"));
        assert_eq!(output.attention_score, Some(0.82));
        assert_eq!(output.raw, body);
    }

    #[test]
    fn test_output_without_label_is_parse_error() {
        let result = ClassifierOutput::from_json(json!({"studentId": "s-1"}));
        assert!(matches!(result, Err(ClassifierError::Parse(_))));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        // Port 9 (discard) is not expected to run an HTTP server
        let client = HttpClassifier::new("http://127.0.0.1:9/analyze", Duration::from_secs(2)).unwrap();
        let request = ClassifyRequest::new("s-1", vec![0u8; 4], Utc::now());
        let result = client.classify(request).await;
        assert!(matches!(
            result,
            Err(ClassifierError::Network(_)) | Err(ClassifierError::Timeout)
        ));
    }
}
