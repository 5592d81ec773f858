use {
    anyhow::Result,
    async_trait::async_trait,
    futures::{StreamExt, TryStreamExt},
    teloxide::{net::Download, prelude::*},
    tracing::debug,
    voxrelay_backend::{MediaLocation, MediaSource, MediaStream},
    voxrelay_common::MediaRef,
};

/// Downloads user attachments through the Bot API file endpoint.
#[derive(Clone)]
pub struct TelegramMedia {
    bot: Bot,
}

impl TelegramMedia {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MediaSource for TelegramMedia {
    async fn resolve(&self, media_ref: &MediaRef) -> Result<MediaLocation> {
        let file = self.bot.get_file(media_ref.as_str()).await?;
        let size = reported_size(file.size);
        debug!(file_id = %media_ref, path = %file.path, ?size, "resolved telegram file");
        Ok(MediaLocation {
            path: file.path,
            size,
        })
    }

    async fn fetch_stream(&self, location: &MediaLocation) -> Result<MediaStream> {
        Ok(self
            .bot
            .download_file_stream(&location.path)
            .map_err(std::io::Error::other)
            .boxed())
    }
}

/// teloxide fills in `u32::MAX` when `getFile` omits `file_size`.
fn reported_size(size: u32) -> Option<u64> {
    (size != u32::MAX).then(|| u64::from(size))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::testing::MockTelegramApi};

    #[tokio::test]
    async fn resolves_and_streams_an_attachment() {
        let api = MockTelegramApi::start_with_file("voice/file_9.oga", b"OggS-payload").await;
        let media = TelegramMedia::new(api.bot());

        let location = media.resolve(&MediaRef::new("file-1")).await.unwrap();
        assert_eq!(location, MediaLocation {
            path: "voice/file_9.oga".into(),
            size: Some(12),
        });

        let chunks: Vec<_> = media
            .fetch_stream(&location)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), b"OggS-payload");

        let get_file = api.calls_to("GetFile");
        assert_eq!(get_file[0].json()["file_id"], "file-1");
        assert_eq!(api.calls_to("download")[0].raw, "voice/file_9.oga");

        api.shutdown().await;
    }

    #[tokio::test]
    async fn missing_file_size_is_unknown() {
        let api = MockTelegramApi::start_with_unsized_file("documents/file_3.mp3", b"ID3").await;
        let media = TelegramMedia::new(api.bot());

        let location = media.resolve(&MediaRef::new("file-1")).await.unwrap();
        assert_eq!(location, MediaLocation {
            path: "documents/file_3.mp3".into(),
            size: None,
        });

        api.shutdown().await;
    }

    #[test]
    fn size_fallback_is_not_a_size() {
        assert_eq!(reported_size(u32::MAX), None);
        assert_eq!(reported_size(0), Some(0));
        assert_eq!(reported_size(20 * 1024 * 1024), Some(20_971_520));
    }

    #[tokio::test]
    async fn unknown_file_fails_to_resolve() {
        let api = MockTelegramApi::start().await;
        let media = TelegramMedia::new(api.bot());

        let err = media.resolve(&MediaRef::new("missing")).await.unwrap_err();
        assert!(err.to_string().contains("no such file"), "{err}");

        api.shutdown().await;
    }
}
