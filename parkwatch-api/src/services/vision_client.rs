//! Vision model API client
//!
//! Sends one multimodal `generateContent` request per run: a fixed parking
//! monitoring prompt plus the target image inline (base64). The model is
//! asked for a JSON-only reply carrying a `car_count` estimate.
//!
//! Video inputs cannot be inlined; they go through the provider's file
//! upload endpoint and the remote processing state is polled on a fixed
//! interval until the file is ready.

use crate::models::{CountSource, CountingResult};
use crate::services::numeric_count;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const UPLOAD_BASE_URL: &str = "https://generativelanguage.googleapis.com/upload/v1beta";
const USER_AGENT: &str = "parkwatch/0.1.0";
const VIDEO_POLL_INTERVAL: Duration = Duration::from_secs(2);

const PARKING_PROMPT: &str = r#"You are a parking lot monitoring system.
Look at the image and reply with exactly this JSON shape:
{
    "status": "empty" or "busy" or "full",
    "occupancy_rate": number 0-100,
    "car_count": estimated number of visible vehicles,
    "notes": "anything noteworthy",
    "description": "short summary, at most 20 characters"
}"#;

/// Vision client errors
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Media upload failed: {0}")]
    UploadFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// --- generateContent wire types ---

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(rename = "fileData", skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
            file_data: None,
        }
    }

    fn inline(mime_type: impl Into<String>, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data,
            }),
            file_data: None,
        }
    }

    fn file(mime_type: impl Into<String>, file_uri: String) -> Self {
        Self {
            text: None,
            inline_data: None,
            file_data: Some(FileData {
                mime_type: mime_type.into(),
                file_uri,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct FileData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    #[serde(rename = "fileUri")]
    file_uri: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

// --- file upload wire types ---

#[derive(Debug, Deserialize)]
struct UploadFileResponse {
    file: RemoteFile,
}

#[derive(Debug, Deserialize)]
struct RemoteFile {
    /// Resource name, e.g. "files/abc123"
    name: String,
    uri: String,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    state: Option<String>,
}

/// Vision model API client
pub struct VisionClient {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
}

impl VisionClient {
    pub fn new(api_key: String, model: String) -> Result<Self, VisionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VisionError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            model,
        })
    }

    /// Analyze one media file and extract the raw vehicle count.
    ///
    /// Images are sent inline; anything else is uploaded and referenced by
    /// URI once the remote processing completes.
    pub async fn analyze(
        &self,
        media_path: &Path,
        mime_type: &str,
    ) -> Result<CountingResult, VisionError> {
        let media_part = if mime_type.starts_with("image/") {
            let bytes = tokio::fs::read(media_path).await?;
            use base64::Engine;
            let data = base64::engine::general_purpose::STANDARD.encode(bytes);
            Part::inline(mime_type, data)
        } else {
            let remote = self.upload_and_wait(media_path, mime_type).await?;
            Part::file(
                remote.mime_type.unwrap_or_else(|| mime_type.to_string()),
                remote.uri,
            )
        };

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::text(PARKING_PROMPT), media_part],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        tracing::debug!(
            media = %media_path.display(),
            mime_type,
            model = %self.model,
            "Querying vision model"
        );

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            API_BASE_URL, self.model, self.api_key
        );

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| VisionError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(VisionError::InvalidApiKey);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VisionError::ApiError(status.as_u16(), error_text));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| VisionError::MalformedResponse(e.to_string()))?;

        let analysis_text = extract_response_text(&body)
            .ok_or_else(|| VisionError::MalformedResponse("empty response".to_string()))?;

        parse_analysis(&analysis_text)
    }

    /// Upload a media file, then poll until the remote processing finishes.
    async fn upload_and_wait(
        &self,
        media_path: &Path,
        mime_type: &str,
    ) -> Result<RemoteFile, VisionError> {
        let bytes = tokio::fs::read(media_path).await?;

        tracing::info!(
            media = %media_path.display(),
            size_bytes = bytes.len(),
            "Uploading media for remote processing"
        );

        let url = format!(
            "{}/files?key={}&uploadType=media",
            UPLOAD_BASE_URL, self.api_key
        );

        let response = self
            .http_client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| VisionError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VisionError::UploadFailed(format!(
                "upload returned {}: {}",
                status, error_text
            )));
        }

        let uploaded: UploadFileResponse = response
            .json()
            .await
            .map_err(|e| VisionError::MalformedResponse(e.to_string()))?;

        let mut file = uploaded.file;

        // Fixed-interval poll until the file leaves PROCESSING
        while file.state.as_deref() == Some("PROCESSING") {
            tracing::debug!(file = %file.name, "Remote media still processing");
            tokio::time::sleep(VIDEO_POLL_INTERVAL).await;
            file = self.get_file(&file.name).await?;
        }

        if file.state.as_deref() == Some("FAILED") {
            return Err(VisionError::UploadFailed(format!(
                "remote processing failed for {}",
                file.name
            )));
        }

        Ok(file)
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, VisionError> {
        let url = format!("{}/{}?key={}", API_BASE_URL, name, self.api_key);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| VisionError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VisionError::ApiError(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| VisionError::MalformedResponse(e.to_string()))
    }
}

/// Pull the text payload out of the first candidate part
fn extract_response_text(response: &GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .first()?
        .content
        .as_ref()?
        .parts
        .iter()
        .find_map(|p| p.text.clone())
}

/// Parse the model's JSON reply and coerce `car_count` to a number
fn parse_analysis(analysis_text: &str) -> Result<CountingResult, VisionError> {
    let analysis: serde_json::Value = serde_json::from_str(analysis_text)
        .map_err(|e| VisionError::MalformedResponse(format!("{}: {}", e, analysis_text)))?;

    let raw_count = numeric_count(analysis.get("car_count")).ok_or_else(|| {
        VisionError::MalformedResponse(format!(
            "car_count is missing or not numeric: {}",
            analysis
        ))
    })?;

    Ok(CountingResult {
        raw_count,
        source: CountSource::Vision,
        analysis,
    })
}

/// Synthetic result used when no API key is configured but a fallback
/// count is. The store still gets updated; the analysis payload records
/// the degraded path for the diagnostic artifact.
pub fn fallback_result(fallback_count: f64) -> CountingResult {
    let raw_count = fallback_count.round().max(0.0);
    CountingResult {
        raw_count,
        source: CountSource::ManualFallback,
        analysis: serde_json::json!({
            "status": "unknown",
            "occupancy_rate": null,
            "car_count": raw_count,
            "notes": "API key not configured; statically configured fallback count used",
            "description": "manual estimate",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_analysis() {
        let text = r#"{"status":"busy","occupancy_rate":62,"car_count":74,"notes":"","description":"fairly full"}"#;
        let result = parse_analysis(text).unwrap();
        assert_eq!(result.raw_count, 74.0);
        assert_eq!(result.source, CountSource::Vision);
        assert_eq!(result.analysis["status"], "busy");
    }

    #[test]
    fn coerces_string_car_count() {
        let text = r#"{"status":"empty","car_count":"5"}"#;
        let result = parse_analysis(text).unwrap();
        assert_eq!(result.raw_count, 5.0);
    }

    #[test]
    fn rejects_non_numeric_car_count() {
        let text = r#"{"status":"busy","car_count":"several"}"#;
        let err = parse_analysis(text).unwrap_err();
        assert!(matches!(err, VisionError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_missing_car_count() {
        let err = parse_analysis(r#"{"status":"busy"}"#).unwrap_err();
        assert!(matches!(err, VisionError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_non_json_reply() {
        let err = parse_analysis("The lot looks busy today.").unwrap_err();
        assert!(matches!(err, VisionError::MalformedResponse(_)));
    }

    #[test]
    fn extracts_text_from_first_candidate() {
        let body = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "{\"car_count\": 2}"}]}}
            ]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            extract_response_text(&response),
            Some("{\"car_count\": 2}".to_string())
        );
    }

    #[test]
    fn empty_candidates_yield_no_text() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(extract_response_text(&response), None);
    }

    #[test]
    fn request_parts_use_wire_field_names() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::text("prompt"), Part::inline("image/jpeg", "QUJD".into())],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "prompt");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert!(parts[1].get("text").is_none());
    }

    #[test]
    fn fallback_result_is_tagged_manual() {
        let result = fallback_result(7.4);
        assert_eq!(result.raw_count, 7.0);
        assert_eq!(result.source, CountSource::ManualFallback);
        assert_eq!(result.analysis["description"], "manual estimate");
    }

    #[test]
    fn fallback_result_floors_negative_counts() {
        assert_eq!(fallback_result(-3.0).raw_count, 0.0);
    }
}
