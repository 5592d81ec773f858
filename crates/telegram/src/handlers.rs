//! Translate Telegram updates into conversation events.

use {
    teloxide::types::{CallbackQuery, MediaKind, Message, MessageKind, Update, UpdateKind, User},
    tracing::debug,
    voxrelay_common::{MediaRef, UserId},
    voxrelay_conversation::{EventKind, InboundEvent},
};

/// Map one update, or `None` for updates the conversation ignores.
pub fn event_from_update(update: Update) -> Option<InboundEvent> {
    match update.kind {
        UpdateKind::Message(msg) => event_from_message(&msg),
        UpdateKind::CallbackQuery(query) => event_from_callback(&query),
        other => {
            debug!("ignoring non-message update: {other:?}");
            None
        },
    }
}

/// Conversations are keyed by chat.
pub fn event_from_message(msg: &Message) -> Option<InboundEvent> {
    if !is_user_message(&msg.kind) {
        debug!(chat_id = msg.chat.id.0, "ignoring service message");
        return None;
    }

    let user = UserId(msg.chat.id.0);
    let sender_name = msg.from.as_ref().and_then(display_name);

    if let Some(file_id) = extract_media_file(msg) {
        return Some(InboundEvent {
            user,
            sender_name,
            kind: EventKind::Media {
                media_ref: MediaRef::new(file_id),
            },
        });
    }

    if let Some(text) = extract_text(msg) {
        return Some(InboundEvent::from_text(user, sender_name, text));
    }

    debug!(
        chat_id = msg.chat.id.0,
        kind = describe_media_kind(msg).unwrap_or("unknown"),
        "unsupported message kind"
    );
    Some(InboundEvent {
        user,
        sender_name,
        kind: EventKind::Other,
    })
}

/// Anything a user sent, as opposed to a chat service notice. `Empty` is
/// what teloxide yields for payloads it cannot classify.
fn is_user_message(kind: &MessageKind) -> bool {
    matches!(
        kind,
        MessageKind::Common(_)
            | MessageKind::Dice(_)
            | MessageKind::WebAppData(_)
            | MessageKind::Empty {}
    )
}

/// Button presses belong to the chat the keyboard was sent to; the sender's
/// id stands in when Telegram omits the message.
pub fn event_from_callback(query: &CallbackQuery) -> Option<InboundEvent> {
    let user = match query.message.as_ref() {
        Some(m) => UserId(m.chat().id.0),
        None => UserId(i64::try_from(query.from.id.0).ok()?),
    };

    Some(InboundEvent {
        user,
        sender_name: display_name(&query.from),
        kind: EventKind::Selection {
            selection_id: query.id.clone(),
            payload: query.data.clone().unwrap_or_default(),
        },
    })
}

/// Username when set, otherwise the first name.
fn display_name(user: &User) -> Option<String> {
    user.username
        .clone()
        .or_else(|| Some(user.first_name.clone()))
        .filter(|n| !n.trim().is_empty())
}

/// Text of a plain text message. Captions on attachments are not commands.
fn extract_text(msg: &Message) -> Option<String> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(t) => Some(t.text.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// File id of a document, audio, video or voice attachment.
fn extract_media_file(msg: &Message) -> Option<String> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Document(d) => Some(d.document.file.id.clone()),
            MediaKind::Audio(a) => Some(a.audio.file.id.clone()),
            MediaKind::Video(v) => Some(v.video.file.id.clone()),
            MediaKind::Voice(v) => Some(v.voice.file.id.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Describe a media kind for logging purposes.
fn describe_media_kind(msg: &Message) -> Option<&'static str> {
    match &msg.kind {
        MessageKind::Common(common) => match &common.media_kind {
            MediaKind::Text(_) => None,
            MediaKind::Animation(_) => Some("animation/GIF"),
            MediaKind::Audio(_) => Some("audio"),
            MediaKind::Contact(_) => Some("contact"),
            MediaKind::Document(_) => Some("document"),
            MediaKind::Location(_) => Some("location"),
            MediaKind::Photo(_) => Some("photo"),
            MediaKind::Poll(_) => Some("poll"),
            MediaKind::Sticker(_) => Some("sticker"),
            MediaKind::Venue(_) => Some("venue"),
            MediaKind::Video(_) => Some("video"),
            MediaKind::VideoNote(_) => Some("video note"),
            MediaKind::Voice(_) => Some("voice"),
            _ => Some("unknown media"),
        },
        _ => None,
    }
}
