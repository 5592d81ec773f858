use {
    anyhow::Result,
    async_trait::async_trait,
    bytes::Bytes,
    std::{future::Future, time::Duration},
    teloxide::{
        RequestError,
        payloads::{AnswerCallbackQuerySetters, SendMessageSetters},
        prelude::*,
        types::{
            ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton,
            KeyboardMarkup,
        },
    },
    tracing::{debug, info, warn},
    voxrelay_common::UserId,
    voxrelay_conversation::{ChatOutbound, SelectionOption},
};

/// Placeholder shown in the input field while the action keyboard is open.
const KEYBOARD_PLACEHOLDER: &str = "Select one";

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Outbound message sender for Telegram.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn run_telegram_request_with_retry<T, F, Fut>(
        &self,
        to: UserId,
        operation: &'static str,
        mut request: F,
    ) -> std::result::Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            chat_id = to.0,
                            operation,
                            retries,
                            max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        chat_id = to.0,
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

/// One-row reply keyboard with the given labels.
fn reply_keyboard(labels: &[&str]) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        labels
            .iter()
            .map(|l| KeyboardButton::new(*l))
            .collect::<Vec<_>>(),
    ])
    .resize_keyboard()
    .input_field_placeholder(KEYBOARD_PLACEHOLDER)
}

fn inline_keyboard(rows: &[Vec<SelectionOption>]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(rows.iter().map(|row| {
        row.iter()
            .map(|o| InlineKeyboardButton::callback(o.label.clone(), o.selection_id.clone()))
            .collect::<Vec<_>>()
    }))
}

#[async_trait]
impl ChatOutbound for TelegramOutbound {
    async fn send_text(&self, to: UserId, text: &str) -> Result<()> {
        let chat_id = ChatId(to.0);
        self.run_telegram_request_with_retry(to, "send message", || {
            self.bot.send_message(chat_id, text).send()
        })
        .await?;
        debug!(chat_id = to.0, text_len = text.len(), "telegram outbound text sent");
        Ok(())
    }

    async fn send_keyboard(&self, to: UserId, text: &str, labels: &[&str]) -> Result<()> {
        let chat_id = ChatId(to.0);
        let keyboard = reply_keyboard(labels);
        self.run_telegram_request_with_retry(to, "send keyboard", || {
            self.bot
                .send_message(chat_id, text)
                .reply_markup(keyboard.clone())
                .send()
        })
        .await?;
        debug!(chat_id = to.0, buttons = labels.len(), "telegram outbound keyboard sent");
        Ok(())
    }

    async fn send_inline_selection(
        &self,
        to: UserId,
        text: &str,
        rows: &[Vec<SelectionOption>],
    ) -> Result<()> {
        let chat_id = ChatId(to.0);
        let keyboard = inline_keyboard(rows);
        self.run_telegram_request_with_retry(to, "send inline keyboard", || {
            self.bot
                .send_message(chat_id, text)
                .reply_markup(keyboard.clone())
                .send()
        })
        .await?;
        debug!(chat_id = to.0, rows = rows.len(), "telegram outbound selection sent");
        Ok(())
    }

    async fn send_audio(&self, to: UserId, data: Bytes, filename: &str) -> Result<()> {
        let chat_id = ChatId(to.0);
        let size = data.len();
        self.run_telegram_request_with_retry(to, "send audio", || {
            let input = InputFile::memory(data.to_vec()).file_name(filename.to_string());
            self.bot.send_audio(chat_id, input).send()
        })
        .await?;
        info!(chat_id = to.0, size, filename, "telegram outbound audio sent");
        Ok(())
    }

    async fn acknowledge_selection(&self, selection_id: &str, text: Option<&str>) -> Result<()> {
        let mut request = self.bot.answer_callback_query(selection_id.to_string());
        if let Some(text) = text {
            request = request.text(text);
        }
        request.await?;
        Ok(())
    }
}
