//! Downstream backend selectors and their static metadata.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which downstream model/service handles a request.
///
/// Opaque to the gate beyond the static [`BackendInfo`] below; the dispatch
/// layer maps it onto a concrete client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// Google Gemini 2.0 Flash.
    Gemini,
    /// Anthropic Claude 3.5 Sonnet.
    Claude,
}

/// Static description of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackendInfo {
    /// Human-readable model name.
    pub name: &'static str,
    /// Company operating the model.
    pub provider: &'static str,
    /// Model identifier sent to the provider API.
    pub model: &'static str,
    /// Context window in tokens.
    pub context_window: usize,
}

const GEMINI: BackendInfo = BackendInfo {
    name: "Gemini 2.0 Flash",
    provider: "Google",
    model: "gemini-2.0-flash-exp",
    context_window: 32_000,
};

const CLAUDE: BackendInfo = BackendInfo {
    name: "Claude 3.5 Sonnet",
    provider: "Anthropic",
    model: "claude-3-5-sonnet-20241022",
    context_window: 200_000,
};

impl BackendId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Gemini => "gemini",
            BackendId::Claude => "claude",
        }
    }

    pub fn info(&self) -> &'static BackendInfo {
        match self {
            BackendId::Gemini => &GEMINI,
            BackendId::Claude => &CLAUDE,
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BackendInfo {
    /// Whether `text` is estimated to fit in this backend's context window.
    pub fn fits_context(&self, text: &str) -> bool {
        estimate_tokens(text) < self.context_window
    }
}

/// Rough token estimate for mixed Japanese/English text.
///
/// Characters above U+3000 (kana, kanji, full-width forms) count as one
/// token each; everything else counts as a quarter token, rounded down
/// over the whole text.
pub fn estimate_tokens(text: &str) -> usize {
    let (wide, narrow) = text.chars().fold((0usize, 0usize), |(wide, narrow), c| {
        if c as u32 > 0x3000 {
            (wide + 1, narrow)
        } else {
            (wide, narrow + 1)
        }
    });
    wide + narrow / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_is_static_per_backend() {
        assert_eq!(BackendId::Gemini.info().context_window, 32_000);
        assert_eq!(BackendId::Claude.info().provider, "Anthropic");
        assert!(std::ptr::eq(BackendId::Claude.info(), BackendId::Claude.info()));
    }

    #[test]
    fn estimate_counts_japanese_per_char() {
        assert_eq!(estimate_tokens("確定申告"), 4);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("税金abcd"), 3);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn fits_context_is_strict() {
        let text = "あ".repeat(32_000);
        assert!(!BackendId::Gemini.info().fits_context(&text));
        assert!(BackendId::Claude.info().fits_context(&text));
        assert!(BackendId::Gemini.info().fits_context(&text[..3 * 31_999]));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let parsed: BackendId = serde_json::from_str("\"claude\"").unwrap();
        assert_eq!(parsed, BackendId::Claude);
        assert_eq!(serde_json::to_string(&BackendId::Gemini).unwrap(), "\"gemini\"");
    }
}
