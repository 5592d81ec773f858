use voxrelay_common::{MediaRef, UserId};

/// One inbound update, already stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub user: UserId,
    /// Display name used in the action-choice prompt.
    pub sender_name: Option<String>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Inline button press.
    Selection {
        /// Platform id used to acknowledge the press.
        selection_id: String,
        payload: String,
    },
    Text {
        text: String,
    },
    Media {
        media_ref: MediaRef,
    },
    Command(Command),
    /// Anything the conversation has no use for (stickers, photos, ...).
    Other,
}

/// Action-choice commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Transcribe,
    Synthesize,
}

impl Command {
    /// Keyboard label for the command.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Transcribe => "Transcribe",
            Self::Synthesize => "Synthesize",
        }
    }

    /// Recognise a keyboard label or a `/transcribe`, `/synthesize` slash
    /// command (optionally addressed as `/cmd@botname`).
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text {
            "Transcribe" => return Some(Self::Transcribe),
            "Synthesize" => return Some(Self::Synthesize),
            _ => {},
        }

        let command = text.strip_prefix('/')?;
        let command = command.split_whitespace().next()?;
        let command = command.split('@').next().unwrap_or(command);
        if command.eq_ignore_ascii_case("transcribe") {
            Some(Self::Transcribe)
        } else if command.eq_ignore_ascii_case("synthesize") {
            Some(Self::Synthesize)
        } else {
            None
        }
    }
}

impl InboundEvent {
    /// Build a text event, promoting command text to [`EventKind::Command`].
    pub fn from_text(user: UserId, sender_name: Option<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = match Command::parse(&text) {
            Some(command) => EventKind::Command(command),
            None => EventKind::Text { text },
        };
        Self {
            user,
            sender_name,
            kind,
        }
    }

    /// Short label for logs.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            EventKind::Selection { .. } => "selection",
            EventKind::Text { .. } => "text",
            EventKind::Media { .. } => "media",
            EventKind::Command(_) => "command",
            EventKind::Other => "other",
        }
    }
}
