//! Name-extraction prompt and response parsing.

use crate::defaults::{SELF_SPEAKER, UNKNOWN_NAME};
use crate::error::{FacetrailError, Result};
use crate::stt::Segment;
use crate::transcript::types::ConversationTurn;
use serde::Deserialize;

/// One `[start–end]: text` line per segment.
pub fn format_transcript(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| format!("[{:.2}s–{:.2}s]: {}", s.start, s.end, s.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Instructions for pulling the other person's name and the dialogue out of
/// a two-person transcript.
pub fn build_prompt(transcript: &str) -> String {
    format!(
        r#"You are analyzing the transcript of a short two-person conversation.

Context:
- The person recording the video starts the conversation.
- The first personal name that directly follows a greeting ("hi", "hey", "hello", "good morning", "what's up", "yo", ...) belongs to the OTHER person.
- That name stays the other person's name for the whole conversation, even if other names come up later. "Hi Jimmy" means the other person is Jimmy even if "Nicko" is said afterwards.

Tasks:
1. Find the first name that follows a greeting. That is the other person's name.
2. Label the person recording as "{me}" and the other person with the detected name.
3. Reply with JSON only, in exactly this shape:

{{
  "guessed_name": "<detected name or {unknown}>",
  "conversation": [
    {{ "speaker": "{me}" or "<guessed_name>", "text": "<line exactly as spoken>" }}
  ]
}}

Rules:
- No markdown, comments or text outside the JSON.
- Keep every spoken line exactly as it appears.
- Use only the first name after a greeting and ignore later names.
- If no name is detected, set "guessed_name" to "{unknown}".

Transcript:
{transcript}
"#,
        me = SELF_SPEAKER,
        unknown = UNKNOWN_NAME,
    )
}

/// Remove a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Debug, Deserialize)]
struct Extraction {
    #[serde(default, alias = "guessedName")]
    guessed_name: Option<String>,
    #[serde(default)]
    conversation: Vec<ConversationTurn>,
}

/// Parse the model's reply into the guessed name and the dialogue.
///
/// A blank guessed name comes back as `None`.
pub fn parse_extraction(raw: &str) -> Result<(Option<String>, Vec<ConversationTurn>)> {
    let extraction: Extraction =
        serde_json::from_str(strip_code_fence(raw)).map_err(|e| FacetrailError::ResponseParse {
            message: e.to_string(),
        })?;
    let name = extraction
        .guessed_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    Ok((name, extraction.conversation))
}
