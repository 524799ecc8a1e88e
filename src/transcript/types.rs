use crate::defaults::UNKNOWN_NAME;
use serde::{Deserialize, Serialize};

/// One line of the reconstructed dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: String,
    pub text: String,
}

impl ConversationTurn {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

/// Outcome of the audio track.
///
/// Failures are carried in `error`, never raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranscriptResult {
    pub guessed_name: Option<String>,
    pub conversation: Vec<ConversationTurn>,
    /// Timestamped transcript the name was extracted from.
    pub raw_text: String,
    pub error: Option<String>,
    /// Unparsed language model output, kept when it was not valid JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_output: Option<String>,
}

impl TranscriptResult {
    /// Degraded result: no name, no conversation.
    pub fn failed(raw_text: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// The guessed name if it can be enrolled under.
    pub fn usable_name(&self) -> Option<&str> {
        self.guessed_name.as_deref().filter(|name| is_usable_name(name))
    }
}

/// A name is usable when it is non-empty and not the unknown sentinel.
pub fn is_usable_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && !name.eq_ignore_ascii_case(UNKNOWN_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_and_blank_names_are_not_usable() {
        assert!(is_usable_name("Jimmy"));
        assert!(!is_usable_name(""));
        assert!(!is_usable_name("   "));
        assert!(!is_usable_name("unknown"));
        assert!(!is_usable_name("UNKNOWN"));
    }

    #[test]
    fn failed_result_has_no_name_or_conversation() {
        let result = TranscriptResult::failed("[0.00s–1.00s]: hi", "quota exceeded");
        assert_eq!(result.guessed_name, None);
        assert!(result.conversation.is_empty());
        assert_eq!(result.raw_text, "[0.00s–1.00s]: hi");
        assert_eq!(result.error.as_deref(), Some("quota exceeded"));
        assert_eq!(result.usable_name(), None);
    }

    #[test]
    fn usable_name_filters_sentinel() {
        let mut result = TranscriptResult {
            guessed_name: Some("Unknown".to_string()),
            ..TranscriptResult::default()
        };
        assert_eq!(result.usable_name(), None);
        result.guessed_name = Some("Parker".to_string());
        assert_eq!(result.usable_name(), Some("Parker"));
    }
}
