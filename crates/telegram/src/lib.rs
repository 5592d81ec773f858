//! Telegram transport: long polling, update mapping, outbound messages and
//! attachment downloads.

pub mod bot;
pub mod handlers;
pub mod media;
pub mod outbound;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod testing;

pub use {
    bot::{build_bot, start_polling},
    media::TelegramMedia,
    outbound::TelegramOutbound,
};
