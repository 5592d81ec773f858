//! Output languages offered for synthesis.

use crate::outbound::SelectionOption;

/// Prefix of every language selection payload.
pub const SELECTION_PREFIX: &str = "lang_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub label: &'static str,
    /// Code sent to the backend.
    pub code: &'static str,
}

/// Offered languages, in display order.
pub const LANGUAGES: &[Language] = &[
    Language { label: "English", code: "en" },
    Language { label: "Arabic", code: "ar" },
    Language { label: "Czech", code: "cz" },
    Language { label: "Dutch", code: "nl" },
    Language { label: "Deutsch", code: "de" },
    Language { label: "Français", code: "fr" },
    Language { label: "Español", code: "es" },
    Language { label: "Italiano", code: "it" },
    Language { label: "Portuguese", code: "pt" },
    Language { label: "Polish", code: "pl" },
    Language { label: "Turkish", code: "tr" },
    Language { label: "Hungarian", code: "hu" },
    Language { label: "Russian", code: "ru" },
    Language { label: "Chinese", code: "zh" },
];

/// Keyboard row lengths; they sum to `LANGUAGES.len()`.
const ROWS: [usize; 3] = [4, 4, 6];

impl Language {
    #[must_use]
    pub fn selection_id(&self) -> String {
        format!("{SELECTION_PREFIX}{}", self.code)
    }
}

/// Language named by a selection payload such as `lang_fr`.
#[must_use]
pub fn from_selection(payload: &str) -> Option<&'static Language> {
    let code = payload.strip_prefix(SELECTION_PREFIX)?;
    LANGUAGES.iter().find(|l| l.code == code)
}

/// Language keyboard layout.
#[must_use]
pub fn selection_rows() -> Vec<Vec<SelectionOption>> {
    let mut remaining = LANGUAGES;
    let mut rows = Vec::with_capacity(ROWS.len());
    for len in ROWS {
        let (row, rest) = remaining.split_at(len.min(remaining.len()));
        rows.push(
            row.iter()
                .map(|l| SelectionOption::new(l.label, l.selection_id()))
                .collect(),
        );
        remaining = rest;
    }
    rows
}
