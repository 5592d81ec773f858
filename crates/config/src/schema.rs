/// Config schema types (telegram transport, media backend).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxrelayConfig {
    pub telegram: TelegramConfig,
    pub backend: BackendConfig,
}

/// Telegram bot connection settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Long-polling timeout passed to `getUpdates` (seconds).
    pub poll_timeout_secs: u32,

    /// Override for the Bot API base URL (self-hosted Bot API servers, tests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl TelegramConfig {
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            poll_timeout_secs: 30,
            api_url: None,
        }
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Media-processing backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base address; `/api/transcribe` and `/api/synthesize` are appended.
    pub base_url: String,

    /// Per-request timeout for backend calls (seconds). Synthesis is slow.
    pub timeout_secs: u64,

    /// Synthesized audio smaller than this is logged as suspicious.
    pub min_audio_bytes: usize,

    /// Attachments larger than this are rejected before download.
    pub max_media_bytes: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://backend:5000".into(),
            timeout_secs: 720,
            min_audio_bytes: 100,
            max_media_bytes: 20 * 1024 * 1024,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = VoxrelayConfig::default();
        assert!(!cfg.telegram.has_token());
        assert_eq!(cfg.telegram.poll_timeout_secs, 30);
        assert_eq!(cfg.backend.base_url, "http://backend:5000");
        assert_eq!(cfg.backend.timeout_secs, 720);
        assert_eq!(cfg.backend.min_audio_bytes, 100);
    }

    #[test]
    fn deserialize_partial_toml() {
        let cfg: VoxrelayConfig = toml::from_str(
            r#"
[telegram]
token = "123:ABC"

[backend]
base_url = "http://localhost:5000"
"#,
        )
        .unwrap();
        assert_eq!(cfg.telegram.token.expose_secret(), "123:ABC");
        assert_eq!(cfg.backend.base_url, "http://localhost:5000");
        // defaults for unspecified fields
        assert_eq!(cfg.backend.timeout_secs, 720);
        assert_eq!(cfg.telegram.poll_timeout_secs, 30);
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = TelegramConfig {
            token: Secret::new("super-secret-token".into()),
            ..Default::default()
        };
        let debug_output = format!("{cfg:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-token"));
    }

    #[test]
    fn serialize_roundtrip_keeps_token() {
        let cfg = VoxrelayConfig {
            telegram: TelegramConfig {
                token: Secret::new("tok".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: VoxrelayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg2.telegram.token.expose_secret(), "tok");
    }
}
