use crate::defaults::UNKNOWN_NAME;
use crate::transcript::{ConversationTurn, TranscriptResult};
use crate::transcript::types::is_usable_name;
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of the visual track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceStatus {
    /// Too few frames with a face.
    NoFace,
    /// Matched an enrolled person.
    Old,
    /// Not in the gallery.
    New,
    /// The visual track failed for another reason.
    Error,
}

/// What the visual track hands back to the merge.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualOutcome {
    pub status: FaceStatus,
    pub face_name: Option<String>,
    pub auto_enrolled: bool,
    pub similarity: Option<f64>,
    pub error: Option<String>,
}

impl VisualOutcome {
    pub fn no_face() -> Self {
        Self {
            status: FaceStatus::NoFace,
            face_name: None,
            auto_enrolled: false,
            similarity: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: FaceStatus::Error,
            error: Some(error.into()),
            ..Self::no_face()
        }
    }

    pub fn matched(name: String, similarity: f64) -> Self {
        Self {
            status: FaceStatus::Old,
            face_name: Some(name),
            similarity: Some(similarity),
            ..Self::no_face()
        }
    }

    /// Unmatched face, named `name` (or the unknown sentinel).
    pub fn unmatched(name: Option<String>, auto_enrolled: bool, best_similarity: f64) -> Self {
        Self {
            status: FaceStatus::New,
            face_name: Some(name.unwrap_or_else(|| UNKNOWN_NAME.to_string())),
            auto_enrolled,
            similarity: (best_similarity >= 0.0).then_some(best_similarity),
            error: None,
        }
    }
}

/// Merged result of one processed video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalResult {
    pub video_path: PathBuf,
    pub guessed_name: Option<String>,
    pub conversation: Vec<ConversationTurn>,
    pub face_status: FaceStatus,
    pub face_name: Option<String>,
    pub auto_enrolled: bool,
    /// Matched similarity, or best observed for an unmatched face.
    pub similarity: Option<f64>,
    pub transcript_error: Option<String>,
    pub face_error: Option<String>,
}

impl FinalResult {
    pub fn merge(video_path: PathBuf, visual: VisualOutcome, transcript: TranscriptResult) -> Self {
        Self {
            video_path,
            guessed_name: transcript.guessed_name,
            conversation: transcript.conversation,
            face_status: visual.status,
            face_name: visual.face_name,
            auto_enrolled: visual.auto_enrolled,
            similarity: visual.similarity,
            transcript_error: transcript.error,
            face_error: visual.error,
        }
    }

    /// Whose history this conversation belongs to.
    ///
    /// The face name wins unless it is the unknown sentinel, then the
    /// transcript's guess, then the sentinel.
    pub fn person_key(&self) -> &str {
        [self.face_name.as_deref(), self.guessed_name.as_deref()]
            .into_iter()
            .flatten()
            .find(|name| is_usable_name(name))
            .unwrap_or(UNKNOWN_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(face_name: Option<&str>, guessed_name: Option<&str>) -> FinalResult {
        FinalResult {
            video_path: PathBuf::from("v.mp4"),
            guessed_name: guessed_name.map(str::to_string),
            conversation: vec![],
            face_status: FaceStatus::New,
            face_name: face_name.map(str::to_string),
            auto_enrolled: false,
            similarity: None,
            transcript_error: None,
            face_error: None,
        }
    }

    #[test]
    fn person_key_priority() {
        assert_eq!(result(Some("Tim"), Some("Jimmy")).person_key(), "Tim");
        assert_eq!(result(None, Some("Jimmy")).person_key(), "Jimmy");
        assert_eq!(result(Some("Unknown"), Some("Jimmy")).person_key(), "Jimmy");
        assert_eq!(result(None, None).person_key(), "Unknown");
        assert_eq!(result(Some("Unknown"), Some("")).person_key(), "Unknown");
    }

    #[test]
    fn serializes_with_snake_case_status() {
        let mut r = result(None, None);
        r.face_status = FaceStatus::NoFace;
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["face_status"], "no_face");
        assert_eq!(json["auto_enrolled"], false);
        assert!(json["face_name"].is_null());
        assert_eq!(json["video_path"], "v.mp4");
    }

    #[test]
    fn unmatched_without_name_uses_sentinel() {
        let outcome = VisualOutcome::unmatched(None, false, -1.0);
        assert_eq!(outcome.face_name.as_deref(), Some("Unknown"));
        assert_eq!(outcome.similarity, None);

        let outcome = VisualOutcome::unmatched(Some("Jimmy".into()), true, 40.0);
        assert_eq!(outcome.similarity, Some(40.0));
        assert!(outcome.auto_enrolled);
    }
}
