use {anyhow::Result, async_trait::async_trait, bytes::Bytes, voxrelay_common::UserId};

/// One inline button: what the user sees and what comes back on press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOption {
    pub label: String,
    pub selection_id: String,
}

impl SelectionOption {
    pub fn new(label: impl Into<String>, selection_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            selection_id: selection_id.into(),
        }
    }
}

/// Send messages back to the chat platform.
#[async_trait]
pub trait ChatOutbound: Send + Sync {
    async fn send_text(&self, to: UserId, text: &str) -> Result<()>;

    /// Text with a one-row reply keyboard of `labels`.
    async fn send_keyboard(&self, to: UserId, text: &str, labels: &[&str]) -> Result<()>;

    /// Text with inline buttons laid out in `rows`.
    async fn send_inline_selection(
        &self,
        to: UserId,
        text: &str,
        rows: &[Vec<SelectionOption>],
    ) -> Result<()>;

    async fn send_audio(&self, to: UserId, data: Bytes, filename: &str) -> Result<()>;

    /// Answer a button press, optionally with a short notice.
    async fn acknowledge_selection(&self, selection_id: &str, text: Option<&str>) -> Result<()>;
}
