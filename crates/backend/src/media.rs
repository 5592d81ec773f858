use std::path::Path;

use {anyhow::Result, async_trait::async_trait, bytes::Bytes, futures::stream::BoxStream};

use voxrelay_common::MediaRef;

/// Byte stream of a downloaded attachment.
pub type MediaStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Where a [`MediaRef`] can be downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLocation {
    /// Platform-side path of the file; also the source of the extension.
    pub path: String,
    /// Size reported by the platform, when known.
    pub size: Option<u64>,
}

/// Media transport: turns an opaque attachment handle into bytes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Resolve an attachment handle to a downloadable location.
    async fn resolve(&self, media_ref: &MediaRef) -> Result<MediaLocation>;

    /// Open a byte stream for a resolved location.
    async fn fetch_stream(&self, location: &MediaLocation) -> Result<MediaStream>;
}

/// Extension of the media file named by `path`, lower-cased, or `bin`.
#[must_use]
pub fn media_extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map_or_else(|| "bin".to_string(), str::to_ascii_lowercase)
}
