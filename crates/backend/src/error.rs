use {reqwest::StatusCode, thiserror::Error};

/// Ways a submission can fail. Each maps to exactly one chat message.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The user's attachment could not be retrieved from the chat platform.
    #[error("failed to get file: {message}")]
    MediaFetch { message: String },

    /// Network failure or timeout talking to the backend.
    #[error("failed to send request to backend: {source}")]
    BackendUnreachable {
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a client or server error status.
    #[error("backend returned error: {}", status_line(*status))]
    BackendStatus { status: u16 },

    /// Success status, but the payload is unusable for the requested action.
    #[error("invalid {action} response: {message}")]
    InvalidResponse {
        action: &'static str,
        message: String,
    },
}

/// An error raised by the media stream while it feeds the upload body.
///
/// reqwest reports it as a request error; it is recognized by type in the
/// error's source chain.
#[derive(Debug, Error)]
#[error("failed to download media file: {0}")]
pub(crate) struct MediaStreamError(#[source] pub std::io::Error);

impl SubmissionError {
    #[must_use]
    pub fn media_fetch(message: impl Into<String>) -> Self {
        Self::MediaFetch {
            message: message.into(),
        }
    }

    /// Classify a reqwest failure: a broken media download inside the body
    /// is a fetch failure, anything else means the backend is unreachable.
    pub(crate) fn from_transport(source: reqwest::Error) -> Self {
        let media = std::iter::successors(
            Some(&source as &(dyn std::error::Error + 'static)),
            |e| e.source(),
        )
        .find_map(|e| e.downcast_ref::<MediaStreamError>())
        .map(ToString::to_string);

        match media {
            Some(message) => Self::media_fetch(message),
            None => Self::BackendUnreachable { source },
        }
    }

    /// Text sent to the user when the submission fails.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::BackendUnreachable { source } if source.is_timeout() => {
                "Error sending to backend: the backend did not answer in time.".to_string()
            },
            other => format!("Error sending to backend: {other}"),
        }
    }

    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MediaFetch { .. } => "media_fetch",
            Self::BackendUnreachable { .. } => "backend_unreachable",
            Self::BackendStatus { .. } => "backend_status",
            Self::InvalidResponse { .. } => "invalid_response",
        }
    }
}

fn status_line(status: u16) -> String {
    match StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
    {
        Some(reason) => format!("{status} {reason}"),
        None => status.to_string(),
    }
}
