//! Upload of captured audio to the recognition endpoints and validation of
//! what comes back.

use crate::audio_toolkit::upload_file_name;
use crate::error::RecognitionError;
use crate::models::RecognizedItem;
use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::multipart::{Form, Part};
use serde_json::Value;

pub const VOICE_RECOGNITION_PATH: &str = "/api/ai/voice-recognition";
pub const INVENTORY_VOICE_PATH: &str = "/api/ai/inventory-voice";

/// Audio finalised by a capture session, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAudio {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl CapturedAudio {
    pub fn file_name(&self) -> String {
        upload_file_name(&self.mime_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRequest {
    pub audio: CapturedAudio,
    /// Location catalog sent by the inventory flow.
    pub context: Option<Value>,
    /// Sent as a form field by the voice flow only.
    pub temporary_only: Option<bool>,
}

#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(
        &self,
        endpoint: &str,
        request: RecognitionRequest,
    ) -> Result<Vec<RecognizedItem>, RecognitionError>;
}

pub struct HttpRecognizer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecognizer {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn build_form(request: RecognitionRequest) -> Result<Form, RecognitionError> {
        let file_name = request.audio.file_name();
        let mime_type = request.audio.mime_type;

        let audio_part = Part::bytes(request.audio.data)
            .file_name(file_name)
            .mime_str(&mime_type)
            .map_err(|e| {
                RecognitionError::UnsupportedFormat(format!("Invalid audio type {}: {}", mime_type, e))
            })?;

        let mut form = Form::new()
            .part("audio", audio_part)
            .text("mime_type", mime_type);

        if let Some(temporary_only) = request.temporary_only {
            form = form.text("temporary_only", temporary_only.to_string());
        }
        if let Some(context) = request.context {
            form = form.text("context", context.to_string());
        }

        Ok(form)
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn recognize(
        &self,
        endpoint: &str,
        request: RecognitionRequest,
    ) -> Result<Vec<RecognizedItem>, RecognitionError> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(
            "Sending {} bytes of {} to {}",
            request.audio.data.len(),
            request.audio.mime_type,
            url
        );

        let form = Self::build_form(request)?;
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        debug!("Recognition response: {}", status);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(classify_error_body(
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                &body,
            ));
        }

        let body = response.text().await.map_err(classify_transport_error)?;
        parse_recognition_body(&body)
    }
}

pub fn classify_transport_error(err: reqwest::Error) -> RecognitionError {
    if err.is_connect() || err.is_timeout() {
        RecognitionError::ServiceUnavailable(format!("Recognition service unreachable: {}", err))
    } else {
        RecognitionError::Transport(err.to_string())
    }
}

/// Maps a non-2xx reply onto the error taxonomy.
pub fn classify_error_body(status: u16, reason: &str, body: &str) -> RecognitionError {
    let mut message = format!("Error {}: {}", status, reason);
    let mut error_type = String::from("unknown");

    match serde_json::from_str::<Value>(body) {
        Ok(json) => {
            error!("Recognition server error: {}", json);
            if let Some(server_message) = json.get("error").and_then(Value::as_str) {
                message = server_message.to_string();
                if let Some(kind) = json.get("error_type").and_then(Value::as_str) {
                    error_type = kind.to_string();
                }
            }
        }
        Err(_) => error!("Recognition server error (raw): {}", body),
    }

    match error_type.as_str() {
        "ai_service_error" => RecognitionError::ServiceUnavailable(message),
        "audio_format_error" => RecognitionError::UnsupportedFormat(message),
        _ => RecognitionError::Unknown(message),
    }
}

pub fn parse_recognition_body(body: &str) -> Result<Vec<RecognizedItem>, RecognitionError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| RecognitionError::MalformedResponse(e.to_string()))?;
    parse_recognition_response(&json)
}

/// Keeps entries that are objects with a non-empty string `name`.
pub fn parse_recognition_response(json: &Value) -> Result<Vec<RecognizedItem>, RecognitionError> {
    let Some(entries) = json.get("items").and_then(Value::as_array) else {
        warn!("Response has no items array: {}", json);
        return Err(RecognitionError::MalformedResponse(
            "missing items array".to_string(),
        ));
    };

    let valid: Vec<RecognizedItem> = entries
        .iter()
        .filter(|entry| {
            entry
                .as_object()
                .and_then(|obj| obj.get("name"))
                .and_then(Value::as_str)
                .is_some_and(|name| !name.is_empty())
        })
        .map(RecognizedItem::from_server)
        .collect();

    if valid.is_empty() && !entries.is_empty() {
        warn!("None of the {} recognised entries is usable", entries.len());
        return Err(RecognitionError::NoValidItems);
    }

    debug!("{} of {} recognised entries kept", valid.len(), entries.len());
    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_items_is_malformed() {
        assert!(matches!(
            parse_recognition_response(&json!({"result": []})),
            Err(RecognitionError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_recognition_response(&json!({"items": "Marteau"})),
            Err(RecognitionError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_recognition_body("<html>502</html>"),
            Err(RecognitionError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_entries_without_name_are_dropped() {
        let items =
            parse_recognition_response(&json!({"items": [{"name": "Marteau"}, {"name": ""}]}))
                .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Marteau");
        assert!(items[0].included);

        let items = parse_recognition_response(&json!({
            "items": [null, 3, {"name": 12}, {"name": "Vis", "zone_id": 1}]
        }))
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].zone_id, Some(1));
    }

    #[test]
    fn test_all_invalid_is_no_valid_items() {
        assert_eq!(
            parse_recognition_response(&json!({"items": [{"name": ""}]})),
            Err(RecognitionError::NoValidItems)
        );
    }

    #[test]
    fn test_empty_list_is_empty_result() {
        assert_eq!(parse_recognition_response(&json!({"items": []})), Ok(vec![]));
    }

    #[test]
    fn test_error_type_classification() {
        let err = classify_error_body(
            503,
            "Service Unavailable",
            r#"{"error": "Gemini down", "error_type": "ai_service_error"}"#,
        );
        assert_eq!(err, RecognitionError::ServiceUnavailable("Gemini down".into()));

        let err = classify_error_body(
            400,
            "Bad Request",
            r#"{"error": "bad codec", "error_type": "audio_format_error"}"#,
        );
        assert_eq!(err, RecognitionError::UnsupportedFormat("bad codec".into()));

        let err = classify_error_body(500, "Internal Server Error", r#"{"error": "boom"}"#);
        assert_eq!(err, RecognitionError::Unknown("boom".into()));
    }

    #[test]
    fn test_non_json_error_uses_status_line() {
        let err = classify_error_body(502, "Bad Gateway", "upstream timed out");
        assert_eq!(err, RecognitionError::Unknown("Error 502: Bad Gateway".into()));
    }

    #[test]
    fn test_form_accepts_codec_parameters() {
        let request = RecognitionRequest {
            audio: CapturedAudio {
                data: vec![0; 16],
                mime_type: "audio/webm;codecs=opus".into(),
            },
            context: Some(json!({"zones": []})),
            temporary_only: Some(true),
        };
        assert_eq!(request.audio.file_name(), "recording.webm");
        assert!(HttpRecognizer::build_form(request).is_ok());
    }

    #[tokio::test]
    async fn test_refused_connection_is_service_unavailable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let recognizer = HttpRecognizer::new(client, format!("http://127.0.0.1:{}", port));
        let request = RecognitionRequest {
            audio: CapturedAudio {
                data: vec![0; 16],
                mime_type: "audio/wav".into(),
            },
            context: None,
            temporary_only: Some(true),
        };

        let err = recognizer
            .recognize(VOICE_RECOGNITION_PATH, request)
            .await
            .unwrap_err();
        assert!(matches!(err, RecognitionError::ServiceUnavailable(_)));
        assert_eq!(err.title(), "AI service unavailable");
    }
}
