//! Known face registry — built from a directory of registration images,
//! one identity per file, filename stem = identity name.

use crate::types::{AnalyzeError, Embedding, FaceAnalyzer, Frame};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot read faces directory {path}: {source}")]
    DirUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
}

/// A known identity, immutable for the lifetime of the registry.
#[derive(Debug, Clone)]
pub struct KnownIdentity {
    pub name: String,
    pub embedding: Embedding,
}

/// In-memory set of (name, embedding) pairs. Rebuilt on every session
/// activation; an empty registry is valid but refuses to back a session
/// (enforced by the engine).
#[derive(Debug, Default)]
pub struct FaceRegistry {
    entries: Vec<KnownIdentity>,
}

impl FaceRegistry {
    /// Scan `faces_dir` and extract one embedding per image file.
    ///
    /// Images that fail to decode or contain no detectable face are
    /// skipped with a warning. When an image contains several faces the
    /// first detection wins. Analyzer errors abort the build: a broken
    /// model would fail every file.
    pub fn build(
        faces_dir: &Path,
        analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<Self, RegistryError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(faces_dir)
            .map_err(|source| RegistryError::DirUnreadable {
                path: faces_dir.display().to_string(),
                source,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image_file(p))
            .collect();
        paths.sort();

        let mut entries = Vec::new();
        let mut seen = BTreeSet::new();

        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !seen.insert(name.to_string()) {
                tracing::warn!(
                    file = %path.display(),
                    name,
                    "duplicate identity name, keeping the first image"
                );
                continue;
            }

            let img = match image::open(&path) {
                Ok(img) => img.to_luma8(),
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "skipping unreadable image");
                    continue;
                }
            };

            let faces = analyzer.analyze(&Frame::from_luma(img))?;
            match faces.into_iter().next() {
                Some(face) => {
                    tracing::debug!(name, "registered identity");
                    entries.push(KnownIdentity {
                        name: name.to_string(),
                        embedding: face.embedding,
                    });
                }
                None => {
                    tracing::warn!(file = %path.display(), "no face found in registration image");
                }
            }
        }

        tracing::info!(identities = entries.len(), "face registry built");
        Ok(Self { entries })
    }

    /// Assemble a registry directly from entries (tests, pre-computed sets).
    pub fn from_entries(entries: Vec<KnownIdentity>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[KnownIdentity] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Names with a registration image in `faces_dir`, sorted and deduplicated,
/// without running any face analysis.
pub fn roster(faces_dir: &Path) -> Result<Vec<String>, RegistryError> {
    let mut names: Vec<String> = std::fs::read_dir(faces_dir)
        .map_err(|source| RegistryError::DirUnreadable {
            path: faces_dir.display().to_string(),
            source,
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_image_file(p))
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DetectedFace, FaceBox};

    /// Reports one face per frame that contains any bright pixel; the
    /// embedding encodes the brightest pixel value.
    struct BrightPixelAnalyzer;

    impl FaceAnalyzer for BrightPixelAnalyzer {
        fn analyze(&mut self, frame: &Frame) -> Result<Vec<DetectedFace>, AnalyzeError> {
            let brightest = frame.data.iter().copied().max().unwrap_or(0);
            if brightest < 128 {
                return Ok(vec![]);
            }
            Ok(vec![DetectedFace {
                bounds: FaceBox { top: 0.0, right: 8.0, bottom: 8.0, left: 0.0 },
                embedding: Embedding::new(vec![brightest as f32]),
            }])
        }
    }

    struct FailingAnalyzer;

    impl FaceAnalyzer for FailingAnalyzer {
        fn analyze(&mut self, _frame: &Frame) -> Result<Vec<DetectedFace>, AnalyzeError> {
            Err(AnalyzeError::Inference("model exploded".into()))
        }
    }

    fn write_gray_image(dir: &Path, name: &str, luma: u8) {
        let img = image::GrayImage::from_pixel(8, 8, image::Luma([luma]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn build_skips_faceless_images_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        write_gray_image(dir.path(), "alice.png", 200);
        write_gray_image(dir.path(), "nobody.png", 0);

        let registry = FaceRegistry::build(dir.path(), &mut BrightPixelAnalyzer).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].name, "alice");
    }

    #[test]
    fn build_names_come_from_file_stems_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write_gray_image(dir.path(), "carol.png", 220);
        write_gray_image(dir.path(), "alice.png", 200);
        write_gray_image(dir.path(), "bob.png", 210);

        let registry = FaceRegistry::build(dir.path(), &mut BrightPixelAnalyzer).unwrap();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names, vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn build_ignores_non_image_files() {
        let dir = tempfile::tempdir().unwrap();
        write_gray_image(dir.path(), "alice.png", 200);
        std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();

        let registry = FaceRegistry::build(dir.path(), &mut BrightPixelAnalyzer).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn build_keeps_first_of_duplicate_stems() {
        let dir = tempfile::tempdir().unwrap();
        write_gray_image(dir.path(), "alice.jpg", 200);
        write_gray_image(dir.path(), "alice.png", 250);

        let registry = FaceRegistry::build(dir.path(), &mut BrightPixelAnalyzer).unwrap();
        assert_eq!(registry.len(), 1);
        // Sorted order puts alice.jpg first; allow for JPEG rounding.
        assert!((registry.entries()[0].embedding.values[0] - 200.0).abs() <= 3.0);
    }

    #[test]
    fn build_empty_directory_is_valid_but_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FaceRegistry::build(dir.path(), &mut BrightPixelAnalyzer).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn build_missing_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = FaceRegistry::build(&missing, &mut BrightPixelAnalyzer);
        assert!(matches!(result, Err(RegistryError::DirUnreadable { .. })));
    }

    #[test]
    fn roster_lists_stems_sorted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        write_gray_image(dir.path(), "carol.png", 10);
        write_gray_image(dir.path(), "alice.png", 10);
        write_gray_image(dir.path(), "alice.jpg", 10);
        std::fs::write(dir.path().join("readme.md"), b"x").unwrap();

        let names = roster(dir.path()).unwrap();
        assert_eq!(names, vec!["alice", "carol"]);
    }

    #[test]
    fn build_propagates_analyzer_errors() {
        let dir = tempfile::tempdir().unwrap();
        write_gray_image(dir.path(), "alice.png", 200);
        let result = FaceRegistry::build(dir.path(), &mut FailingAnalyzer);
        assert!(matches!(result, Err(RegistryError::Analyze(_))));
    }
}
