//! HTTP client for the media-processing backend.

use std::time::Duration;

use {
    bytes::Bytes,
    futures::TryStreamExt,
    reqwest::{
        Body, Client,
        header::CONTENT_TYPE,
        multipart::{Form, Part},
    },
    serde::Deserialize,
    tracing::{debug, info, warn},
};

use {
    voxrelay_common::{MediaRef, UserId},
    voxrelay_config::BackendConfig,
};

use crate::{
    error::{MediaStreamError, SubmissionError},
    media::{MediaSource, media_extension},
};

/// Backend operation, which also selects the endpoint and response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendAction {
    Transcribe,
    Synthesize,
}

impl BackendAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transcribe => "transcribe",
            Self::Synthesize => "synthesize",
        }
    }

    fn path(self) -> &'static str {
        match self {
            Self::Transcribe => "/api/transcribe",
            Self::Synthesize => "/api/synthesize",
        }
    }
}

impl std::fmt::Display for BackendAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the pipeline needs, copied out of the session up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub user_id: UserId,
    pub action: BackendAction,
    pub media_ref: MediaRef,
    /// Sent as the `text` field when non-empty.
    pub text_input: String,
    /// Sent as the `language` field when non-empty.
    pub language: String,
}

/// Backend result, ready to relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Transcribed text.
    Transcript(String),
    /// Synthesized audio.
    Audio {
        data: Bytes,
        filename: String,
        content_type: Option<String>,
        /// Body was below the configured minimum size.
        undersized: bool,
    },
}

/// Filename used when relaying synthesized audio.
const AUDIO_FILENAME: &str = "result.wav";

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Client for `POST /api/transcribe` and `POST /api/synthesize`.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    min_audio_bytes: usize,
    max_media_bytes: u64,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Build a client from backend settings.
    pub fn from_config(config: &BackendConfig) -> reqwest::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            min_audio_bytes: config.min_audio_bytes,
            max_media_bytes: config.max_media_bytes,
        })
    }

    #[must_use]
    pub fn endpoint(&self, action: BackendAction) -> String {
        format!("{}{}", self.base_url, action.path())
    }

    /// Run one submission: fetch media, post it, interpret the answer.
    pub async fn submit(
        &self,
        media: &dyn MediaSource,
        request: &SubmissionRequest,
    ) -> Result<Reply, SubmissionError> {
        let user_id = request.user_id;
        let action = request.action;

        let location = media
            .resolve(&request.media_ref)
            .await
            .map_err(|e| SubmissionError::media_fetch(format!("{e:#}")))?;

        if let Some(size) = location.size
            && size > self.max_media_bytes
        {
            return Err(SubmissionError::media_fetch(format!(
                "file is too large ({size} bytes, limit {})",
                self.max_media_bytes
            )));
        }

        let extension = media_extension(&location.path);
        debug!(%user_id, path = %location.path, extension, "resolved media");

        let stream = media
            .fetch_stream(&location)
            .await
            .map_err(|e| SubmissionError::media_fetch(format!("failed to download media file: {e:#}")))?;

        let body = Body::wrap_stream(stream.map_err(MediaStreamError));
        let file_part = match location.size {
            Some(len) => Part::stream_with_length(body, len),
            None => Part::stream(body),
        }
        .file_name(format!("media.{extension}"));

        let mut form = Form::new().part("file", file_part);
        if !request.text_input.is_empty() {
            form = form.text("text", request.text_input.clone());
        }
        if !request.language.is_empty() {
            form = form.text("language", request.language.clone());
        }

        let url = self.endpoint(action);
        info!(%user_id, %action, url, "submitting to backend");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(SubmissionError::from_transport)?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        // Read everything before branching so error statuses never get relayed.
        let body = response
            .bytes()
            .await
            .map_err(SubmissionError::from_transport)?;

        if status.is_client_error() || status.is_server_error() {
            warn!(
                %user_id,
                %action,
                status = status.as_u16(),
                body = %String::from_utf8_lossy(&body[..body.len().min(256)]),
                "backend returned error status"
            );
            return Err(SubmissionError::BackendStatus {
                status: status.as_u16(),
            });
        }

        match action {
            BackendAction::Transcribe => parse_transcript(&body).map(Reply::Transcript),
            BackendAction::Synthesize => {
                let undersized = body.len() < self.min_audio_bytes;
                if undersized {
                    warn!(
                        %user_id,
                        size = body.len(),
                        min = self.min_audio_bytes,
                        content_type = ?content_type,
                        "synthesized audio body is suspiciously small"
                    );
                } else {
                    debug!(%user_id, size = body.len(), content_type = ?content_type, "received synthesized audio");
                }
                Ok(Reply::Audio {
                    data: body,
                    filename: AUDIO_FILENAME.to_string(),
                    content_type,
                    undersized,
                })
            },
        }
    }
}

fn parse_transcript(body: &[u8]) -> Result<String, SubmissionError> {
    let invalid = |message: String| SubmissionError::InvalidResponse {
        action: BackendAction::Transcribe.as_str(),
        message,
    };

    let parsed: TranscribeResponse =
        serde_json::from_slice(body).map_err(|e| invalid(e.to_string()))?;
    match parsed.text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        Some(_) => Err(invalid("empty text".into())),
        None => Err(invalid("missing text field".into())),
    }
}
