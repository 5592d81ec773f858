use {
    serde::{Deserialize, Serialize},
    voxrelay_common::{MediaRef, UserId},
};

/// What the user is currently doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    None,
    Transcribe,
    Synthesize,
    /// Synthesis has media and text; waiting for the output language.
    AwaitLanguage,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Transcribe => "transcribe",
            Self::Synthesize => "synthesize",
            Self::AwaitLanguage => "await_language",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversation state for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub action: Action,
    pub has_media: bool,
    /// Only meaningful while `has_media` is true.
    pub media_ref: Option<MediaRef>,
    pub text_input: String,
    /// Empty means the backend default.
    pub language: String,
    /// Bumped whenever a new action cycle starts.
    pub cycle: u64,
}

impl Session {
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            action: Action::None,
            has_media: false,
            media_ref: None,
            text_input: String::new(),
            language: String::new(),
            cycle: 0,
        }
    }

    /// Start a new action cycle.
    pub fn begin(&mut self, action: Action) {
        self.action = action;
        self.has_media = false;
        self.cycle = self.cycle.wrapping_add(1);
    }

    pub fn capture_media(&mut self, media_ref: MediaRef) {
        self.media_ref = Some(media_ref);
        self.has_media = true;
    }

    /// The captured media, if the current cycle has one.
    #[must_use]
    pub fn media(&self) -> Option<&MediaRef> {
        self.media_ref.as_ref().filter(|_| self.has_media)
    }

    /// Settle `action` to `None` after a submission for `cycle` finished.
    ///
    /// A dispatching transition already leaves the session idle, so on the
    /// same cycle this is normally a no-op that pins the post-submission
    /// state. A newer cycle (the user started another action meanwhile) is
    /// left untouched. Returns whether `cycle` was still current.
    pub fn finish_dispatch(&mut self, cycle: u64) -> bool {
        if self.cycle != cycle {
            return false;
        }
        self.action = Action::None;
        true
    }
}
