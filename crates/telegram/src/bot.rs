use std::{collections::HashMap, time::Duration};

use {
    secrecy::ExposeSecret,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand},
    },
    tokio::sync::mpsc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
    voxrelay_common::UserId,
    voxrelay_config::TelegramConfig,
    voxrelay_conversation::{Engine, InboundEvent},
};

use crate::handlers;

/// Extra HTTP client time on top of the long-polling timeout.
const CLIENT_TIMEOUT_MARGIN_SECS: u64 = 15;

/// Wait after a failed `getUpdates` before polling again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Build a bot client for `config`.
///
/// The HTTP timeout is longer than the long-polling timeout so the client
/// doesn't abort the request before Telegram responds.
pub fn build_bot(config: &TelegramConfig) -> anyhow::Result<Bot> {
    let timeout = u64::from(config.poll_timeout_secs) + CLIENT_TIMEOUT_MARGIN_SECS;
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(timeout))
        .build()?;
    let bot = Bot::with_client(config.token.expose_secret(), client);
    Ok(match config.api_url.as_deref() {
        Some(url) => bot.set_api_url(reqwest::Url::parse(url)?),
        None => bot,
    })
}

/// Connect and start long polling.
///
/// Spawns a background task that hands every update to `engine` until the
/// returned `CancellationToken` is cancelled.
pub async fn start_polling(
    bot: Bot,
    config: &TelegramConfig,
    engine: Engine,
) -> anyhow::Result<CancellationToken> {
    // Verify credentials and get bot username.
    let me = bot.get_me().await?;

    // Delete any existing webhook so long polling works.
    bot.delete_webhook().send().await?;

    let commands = vec![
        BotCommand::new("start", "Show the action menu"),
        BotCommand::new("transcribe", "Transcribe an audio or video file"),
        BotCommand::new("synthesize", "Synthesize speech from text"),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(username = ?me.username, "telegram bot connected (webhook cleared)");

    let cancel = CancellationToken::new();
    tokio::spawn(poll_updates(
        bot,
        config.poll_timeout_secs,
        engine,
        cancel.clone(),
    ));
    Ok(cancel)
}

async fn poll_updates(bot: Bot, timeout: u32, engine: Engine, cancel: CancellationToken) {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;
    let mut queues = ChatQueues::new(engine);

    loop {
        let request = bot
            .get_updates()
            .offset(offset)
            .timeout(timeout)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

        let result = tokio::select! {
            () = cancel.cancelled() => break,
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    if let Some(event) = handlers::event_from_update(update) {
                        queues.push(event);
                    }
                }
            },
            Err(e) => {
                // Another bot instance is running with the same token.
                if matches!(&e, RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) {
                    warn!("telegram polling disabled: another instance is already running with this token");
                    cancel.cancel();
                    break;
                }

                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                }
            },
        }
    }

    info!("telegram polling stopped");
}

/// Per-chat FIFO queues. Events from one chat are handled in arrival order;
/// different chats proceed concurrently. Dropping the queues lets each
/// worker finish what it already received and exit.
struct ChatQueues {
    engine: Engine,
    queues: HashMap<UserId, mpsc::UnboundedSender<InboundEvent>>,
}

impl ChatQueues {
    fn new(engine: Engine) -> Self {
        Self {
            engine,
            queues: HashMap::new(),
        }
    }

    fn push(&mut self, event: InboundEvent) {
        let user = event.user;
        let event = match self.queues.get(&user) {
            Some(tx) => match tx.send(event) {
                Ok(()) => return,
                // Worker died (a panic in `handle`); start a fresh one.
                Err(mpsc::error::SendError(event)) => event,
            },
            None => event,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_chat_queue(self.engine.clone(), rx));
        if tx.send(event).is_err() {
            warn!(%user, "chat queue closed before first event");
        }
        self.queues.insert(user, tx);
    }
}

async fn run_chat_queue(engine: Engine, mut rx: mpsc::UnboundedReceiver<InboundEvent>) {
    while let Some(event) = rx.recv().await {
        engine.handle(event).await;
    }
}
