//! Per-user conversation state machine.
//!
//! [`transition`] is pure: it mutates the session record and returns the
//! effects to perform, leaving all I/O to the caller.
//!
//! | Current       | Event       | Guard                          | Next          |
//! |---------------|-------------|--------------------------------|---------------|
//! | any           | Transcribe  |                                | Transcribe    |
//! | any           | Synthesize  |                                | Synthesize    |
//! | Transcribe    | Media       |                                | None (submit) |
//! | Synthesize    | Media       |                                | Synthesize    |
//! | Synthesize    | Text        | media captured, text not blank | AwaitLanguage |
//! | AwaitLanguage | Selection   | known `lang_<code>` payload    | None (submit) |
//! | otherwise     |             |                                | unchanged     |
//!
//! Unmatched events get the action-choice prompt; button presses are always
//! acknowledged.

use {
    voxrelay_backend::{BackendAction, SubmissionRequest},
    voxrelay_sessions::{Action, Session},
};

use crate::{
    event::{Command, EventKind, InboundEvent},
    language,
};

pub const SEND_FILE_PROMPT: &str = "Now, send a file (mp4, mp3, ogg, wav).";
pub const PLEASE_WAIT: &str = "Please wait...";
pub const SEND_TEXT_PROMPT: &str = "Now send the text to synthesize.";
pub const LANGUAGE_PROMPT: &str = "Choose output language (default is English):";
pub const PROCESSING: &str = "Processing...";

/// Labels of the action-choice keyboard.
pub const MENU_LABELS: [&str; 2] = ["Transcribe", "Synthesize"];

/// Something the engine must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SendText(String),
    /// Action-choice prompt with the [`MENU_LABELS`] keyboard.
    SendMenu { text: String },
    SendLanguageSelection,
    AcknowledgeSelection {
        selection_id: String,
        text: Option<String>,
    },
    /// Submit to the backend. `cycle` is the session cycle at dispatch time.
    Dispatch {
        request: SubmissionRequest,
        cycle: u64,
    },
}

/// Action-choice prompt, addressed to the sender when their name is known.
#[must_use]
pub fn menu_prompt(sender_name: Option<&str>) -> String {
    match sender_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("{name}, please choose an action:"),
        None => "Please choose an action:".to_string(),
    }
}

/// Apply `event` to `session` and return the resulting effects.
pub fn transition(session: &mut Session, event: &InboundEvent) -> Vec<Effect> {
    match (&event.kind, session.action) {
        (EventKind::Command(Command::Transcribe), _) => {
            session.begin(Action::Transcribe);
            vec![Effect::SendText(SEND_FILE_PROMPT.into())]
        },
        (EventKind::Command(Command::Synthesize), _) => {
            session.begin(Action::Synthesize);
            session.text_input.clear();
            vec![Effect::SendText(SEND_FILE_PROMPT.into())]
        },
        (EventKind::Media { media_ref }, Action::Transcribe) => {
            session.capture_media(media_ref.clone());
            session.action = Action::None;
            let request = SubmissionRequest {
                user_id: session.user_id,
                action: BackendAction::Transcribe,
                media_ref: media_ref.clone(),
                text_input: String::new(),
                language: String::new(),
            };
            vec![Effect::SendText(PLEASE_WAIT.into()), Effect::Dispatch {
                request,
                cycle: session.cycle,
            }]
        },
        (EventKind::Media { media_ref }, Action::Synthesize) => {
            session.capture_media(media_ref.clone());
            vec![Effect::SendText(SEND_TEXT_PROMPT.into())]
        },
        (EventKind::Text { text }, Action::Synthesize)
            if session.has_media && !text.trim().is_empty() =>
        {
            session.text_input = text.clone();
            session.action = Action::AwaitLanguage;
            vec![Effect::SendLanguageSelection]
        },
        (
            EventKind::Selection {
                selection_id,
                payload,
            },
            Action::AwaitLanguage,
        ) => {
            let Some(lang) = language::from_selection(payload) else {
                return unmatched(event);
            };
            let Some(media_ref) = session.media().cloned() else {
                return unmatched(event);
            };
            session.language = lang.code.to_string();
            session.action = Action::None;
            let request = SubmissionRequest {
                user_id: session.user_id,
                action: BackendAction::Synthesize,
                media_ref,
                text_input: session.text_input.clone(),
                language: session.language.clone(),
            };
            vec![
                Effect::AcknowledgeSelection {
                    selection_id: selection_id.clone(),
                    text: Some(format!("Language set to: {}", lang.code)),
                },
                Effect::SendText(PROCESSING.into()),
                Effect::Dispatch {
                    request,
                    cycle: session.cycle,
                },
            ]
        },
        _ => unmatched(event),
    }
}

fn unmatched(event: &InboundEvent) -> Vec<Effect> {
    let mut effects = Vec::with_capacity(2);
    if let EventKind::Selection { selection_id, .. } = &event.kind {
        effects.push(Effect::AcknowledgeSelection {
            selection_id: selection_id.clone(),
            text: None,
        });
    }
    effects.push(Effect::SendMenu {
        text: menu_prompt(event.sender_name.as_deref()),
    });
    effects
}
