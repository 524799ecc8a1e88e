//! Gallery of known people.
//!
//! Reference images live in one store under `<normalized name>.jpg`; the
//! index (`index.json`, display name → image key) lives in another. All
//! writes go through a single-writer lock so concurrent enrollments in this
//! process cannot lose each other's index updates.

use crate::defaults::INDEX_FILE;
use crate::error::{FacetrailError, Result};
use crate::storage::{KeyValueStore, normalize_key};
use crate::vision::detector::FaceDetector;
use image::ImageFormat;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// One known person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrolledPerson {
    /// Name as given at enrollment.
    pub name: String,
    /// Key of the reference image in the image store.
    pub image: String,
}

type Index = BTreeMap<String, String>;

pub struct EnrollmentStore {
    index: Arc<dyn KeyValueStore>,
    images: Arc<dyn KeyValueStore>,
    detector: Arc<dyn FaceDetector>,
    writer: Mutex<()>,
}

impl EnrollmentStore {
    pub fn new(
        index: Arc<dyn KeyValueStore>,
        images: Arc<dyn KeyValueStore>,
        detector: Arc<dyn FaceDetector>,
    ) -> Self {
        Self {
            index,
            images,
            detector,
            writer: Mutex::new(()),
        }
    }

    /// Image key a name is stored under.
    pub fn image_key(name: &str) -> String {
        format!("{}.jpg", normalize_key(name))
    }

    /// Enroll `name` with the face in `image_path`, replacing any previous
    /// entry of that name.
    ///
    /// The whole source image is stored, not just the face.
    ///
    /// # Errors
    /// `Enrollment` when the image cannot be read or shows no face.
    pub fn enroll(&self, name: &str, image_path: &Path) -> Result<EnrolledPerson> {
        let name = name.trim();
        let fail = |message: String| FacetrailError::Enrollment {
            name: name.to_string(),
            message,
        };
        if name.is_empty() {
            return Err(fail("name is empty".to_string()));
        }

        let source = image::open(image_path)
            .map_err(|e| fail(format!("cannot read {}: {e}", image_path.display())))?
            .to_rgb8();

        let faces = self
            .detector
            .detect(&source)
            .map_err(|e| fail(e.to_string()))?;
        let Some(face) = faces.first() else {
            return Err(fail("no face detected".to_string()));
        };
        tracing::debug!(name, ?face, "face found for enrollment");

        let mut encoded = Vec::new();
        source.write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg)?;

        let key = Self::image_key(name);
        let _guard = self.writer.lock().map_err(|e| FacetrailError::Storage {
            message: format!("enrollment lock poisoned: {e}"),
        })?;

        self.images.put(&key, &encoded)?;

        let mut index = self.load_index();
        let previous = index.insert(name.to_string(), key.clone());
        self.save_index(&index)?;

        // An index written under other key rules (or by hand) can point the
        // name at a different file.
        if let Some(old) = previous
            && old != key
            && !index.values().any(|k| *k == old)
        {
            self.images.delete(&old)?;
        }

        tracing::info!(name, image = %key, "enrolled");
        Ok(EnrolledPerson {
            name: name.to_string(),
            image: key,
        })
    }

    /// All enrolled people, sorted by name.
    pub fn list(&self) -> Vec<EnrolledPerson> {
        self.load_index()
            .into_iter()
            .map(|(name, image)| EnrolledPerson { name, image })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<EnrolledPerson> {
        self.load_index()
            .remove_entry(name.trim())
            .map(|(name, image)| EnrolledPerson { name, image })
    }

    /// Encoded reference image of `person`, `None` if the file is gone.
    pub fn reference_image(&self, person: &EnrolledPerson) -> Result<Option<Vec<u8>>> {
        self.images.get(&person.image)
    }

    /// A missing or unparseable index counts as empty.
    fn load_index(&self) -> Index {
        let bytes = match self.index.get(INDEX_FILE) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Index::new(),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read enrollment index, treating as empty");
                return Index::new();
            }
        };
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "corrupt enrollment index, treating as empty");
            Index::new()
        })
    }

    fn save_index(&self, index: &Index) -> Result<()> {
        let json = serde_json::to_vec_pretty(index)?;
        self.index.put(INDEX_FILE, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::vision::detector::MockFaceDetector;
    use crate::vision::types::FaceBox;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        image: std::path::PathBuf,
        index: Arc<MemoryStore>,
        images: Arc<MemoryStore>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("face.png");
        RgbImage::from_pixel(32, 32, Rgb([200, 150, 120]))
            .save(&image)
            .unwrap();
        Fixture {
            _dir: dir,
            image,
            index: Arc::new(MemoryStore::new()),
            images: Arc::new(MemoryStore::new()),
        }
    }

    fn store(f: &Fixture, detector: MockFaceDetector) -> EnrollmentStore {
        EnrollmentStore::new(f.index.clone(), f.images.clone(), Arc::new(detector))
    }

    fn face() -> MockFaceDetector {
        MockFaceDetector::always(vec![FaceBox::new(4, 28, 28, 4)])
    }

    #[test]
    fn enroll_stores_image_and_index_entry() {
        let f = fixture();
        let store = store(&f, face());

        let person = store.enroll("Jimmy Page", &f.image).unwrap();
        assert_eq!(person.image, "jimmy_page.jpg");

        let stored = f.images.get("jimmy_page.jpg").unwrap().unwrap();
        assert_eq!(
            image::guess_format(&stored).unwrap(),
            ImageFormat::Jpeg
        );
        // Uncropped: same size as the source
        assert_eq!(image::load_from_memory(&stored).unwrap().width(), 32);
        assert_eq!(store.list(), vec![person]);
    }

    #[test]
    fn enroll_without_face_fails_and_leaves_store_untouched() {
        let f = fixture();
        let store = store(&f, MockFaceDetector::empty());

        match store.enroll("Tim", &f.image) {
            Err(FacetrailError::Enrollment { name, message }) => {
                assert_eq!(name, "Tim");
                assert!(message.contains("no face"));
            }
            other => panic!("Expected Enrollment error, got {other:?}"),
        }
        assert!(f.images.list().unwrap().is_empty());
        assert!(f.index.get(INDEX_FILE).unwrap().is_none());
    }

    #[test]
    fn enroll_unreadable_image_fails() {
        let f = fixture();
        let store = store(&f, face());
        let err = store.enroll("Tim", Path::new("/nonexistent/face.jpg")).err();
        assert!(matches!(err, Some(FacetrailError::Enrollment { .. })));
    }

    #[test]
    fn reenroll_replaces_entry_and_image() {
        let f = fixture();
        let store = store(&f, face());
        store.enroll("Parker", &f.image).unwrap();
        let first = f.images.get("parker.jpg").unwrap().unwrap();

        RgbImage::from_pixel(48, 48, Rgb([10, 20, 30]))
            .save(&f.image)
            .unwrap();
        store.enroll("Parker", &f.image).unwrap();
        let second = f.images.get("parker.jpg").unwrap().unwrap();

        assert_ne!(first, second);
        assert_eq!(store.list().len(), 1);
        assert_eq!(f.images.list().unwrap(), vec!["parker.jpg"]);
    }

    #[test]
    fn reenroll_drops_image_under_stale_key() {
        let f = fixture();
        f.index
            .put(INDEX_FILE, br#"{"Tim": "tim-2019.png", "Bruce": "bruce.png"}"#)
            .unwrap();
        f.images.put("tim-2019.png", b"old").unwrap();
        f.images.put("bruce.png", b"kept").unwrap();
        let store = store(&f, face());

        let person = store.enroll("Tim", &f.image).unwrap();

        assert_eq!(person.image, "tim.jpg");
        assert_eq!(store.get("Tim"), Some(person));
        assert!(f.images.get("tim-2019.png").unwrap().is_none());
        assert_eq!(f.images.get("bruce.png").unwrap().as_deref(), Some(&b"kept"[..]));
    }

    #[test]
    fn stale_key_shared_with_another_name_is_kept() {
        let f = fixture();
        f.index
            .put(INDEX_FILE, br#"{"Tim": "shared.png", "Timothy": "shared.png"}"#)
            .unwrap();
        f.images.put("shared.png", b"old").unwrap();
        let store = store(&f, face());

        store.enroll("Tim", &f.image).unwrap();

        assert!(f.images.get("shared.png").unwrap().is_some());
    }

    #[test]
    fn corrupt_index_is_treated_as_empty() {
        let f = fixture();
        f.index.put(INDEX_FILE, b"{not json").unwrap();
        let store = store(&f, face());

        assert!(store.list().is_empty());
        store.enroll("Nicko", &f.image).unwrap();
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn list_is_sorted_by_name() {
        let f = fixture();
        let store = store(&f, face());
        for name in ["Tim", "Nicko", "Parker"] {
            store.enroll(name, &f.image).unwrap();
        }
        let names: Vec<_> = store.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Nicko", "Parker", "Tim"]);
        assert_eq!(store.get("Tim").map(|p| p.image), Some("tim.jpg".to_string()));
        assert!(store.get("Bruce").is_none());
    }

    #[test]
    fn concurrent_enrollments_keep_every_entry() {
        let f = fixture();
        let store = Arc::new(store(&f, face()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let image = f.image.clone();
                std::thread::spawn(move || store.enroll(&format!("person{i}"), &image).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.list().len(), 8);
    }
}
