//! Match a candidate crop against the gallery.

use crate::defaults::NO_SIMILARITY;
use crate::error::{FacetrailError, Result};
use crate::identity::enrollment::{EnrolledPerson, EnrollmentStore};
use crate::identity::similarity::FaceComparer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum MatchResult {
    Matched {
        name: String,
        similarity: f64,
    },
    Unmatched {
        candidate_image_path: PathBuf,
        /// Highest similarity seen, or `NO_SIMILARITY` when nothing compared.
        best_similarity: f64,
    },
}

impl MatchResult {
    /// Matched similarity or best observed one.
    pub fn similarity(&self) -> f64 {
        match self {
            MatchResult::Matched { similarity, .. } => *similarity,
            MatchResult::Unmatched {
                best_similarity, ..
            } => *best_similarity,
        }
    }
}

pub struct IdentityMatcher {
    store: Arc<EnrollmentStore>,
    comparer: Arc<dyn FaceComparer>,
    threshold: f64,
}

impl IdentityMatcher {
    pub fn new(store: Arc<EnrollmentStore>, comparer: Arc<dyn FaceComparer>, threshold: f64) -> Self {
        Self {
            store,
            comparer,
            threshold,
        }
    }

    pub fn store(&self) -> &Arc<EnrollmentStore> {
        &self.store
    }

    /// Compare `candidate` with every enrolled person.
    ///
    /// People are visited in name order. A comparison that fails, or a
    /// reference image that cannot be loaded, is logged and skipped.
    ///
    /// # Errors
    /// `ImageUnreadable` if the candidate file itself cannot be read.
    pub async fn match_face(&self, candidate: &Path) -> Result<MatchResult> {
        let started = Instant::now();
        let candidate_bytes =
            tokio::fs::read(candidate)
                .await
                .map_err(|e| FacetrailError::ImageUnreadable {
                    path: candidate.display().to_string(),
                    message: e.to_string(),
                })?;

        let store = self.store.clone();
        let gallery = tokio::task::spawn_blocking(move || store.list())
            .await
            .map_err(|e| FacetrailError::Other(format!("gallery listing task failed: {e}")))?;
        let mut best_similarity = NO_SIMILARITY;
        let mut best_name: Option<String> = None;
        let mut compared = 0usize;

        for person in gallery {
            let reference = match self.load_reference(&person).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    tracing::warn!(name = %person.name, image = %person.image, "reference image missing, skipping");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(name = %person.name, error = %e, "cannot load reference image, skipping");
                    continue;
                }
            };

            match self.comparer.similarity(&candidate_bytes, &reference).await {
                Ok(similarity) => {
                    compared += 1;
                    tracing::debug!(name = %person.name, similarity, "compared");
                    if similarity > best_similarity {
                        best_similarity = similarity;
                        best_name = Some(person.name);
                    }
                }
                Err(e) => {
                    tracing::warn!(name = %person.name, error = %e, "comparison failed, skipping");
                }
            }
        }

        tracing::info!(
            compared,
            best_similarity,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "gallery comparison finished"
        );

        Ok(match best_name {
            Some(name) if best_similarity >= self.threshold => {
                tracing::info!(%name, similarity = best_similarity, "face matched");
                MatchResult::Matched {
                    name,
                    similarity: best_similarity,
                }
            }
            _ => {
                tracing::info!(best_similarity, "no gallery match");
                MatchResult::Unmatched {
                    candidate_image_path: candidate.to_path_buf(),
                    best_similarity,
                }
            }
        })
    }

    async fn load_reference(&self, person: &EnrolledPerson) -> Result<Option<Vec<u8>>> {
        let store = self.store.clone();
        let person = person.clone();
        tokio::task::spawn_blocking(move || store.reference_image(&person))
            .await
            .map_err(|e| FacetrailError::Other(format!("reference loading task failed: {e}")))?
    }
}
