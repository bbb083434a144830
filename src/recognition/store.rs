//! Labeled reference images for template matching.
//!
//! Templates load once per engine start from a directory; the file stem,
//! uppercased, becomes the label. A `BTreeMap` keeps iteration lexical by
//! label, which fixes the tie-break order of the matcher.

use image::GrayImage;
use std::collections::BTreeMap;
use std::path::Path;

use crate::logging::LogSink;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Immutable label -> grayscale reference image collection.
#[derive(Default)]
pub struct TemplateSet {
    templates: BTreeMap<String, GrayImage>,
}

impl TemplateSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: &str, image: GrayImage) {
        self.templates.insert(label.to_uppercase(), image);
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Iterates in lexical label order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &GrayImage)> {
        self.templates.iter()
    }

    /// Loads every readable image in `dir`. Unreadable files and files
    /// without an image extension are skipped; a missing directory yields an
    /// empty set, leaving the caller on the OCR fallback path.
    pub fn load_from_dir(dir: &Path, log: &dyn LogSink) -> Self {
        let mut set = Self::empty();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log.append(&format!(
                    "Template directory {} not readable: {}",
                    dir.display(),
                    e
                ));
                return set;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            if !ext.is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str())) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match image::open(&path) {
                Ok(img) => set.insert(stem, img.to_luma8()),
                Err(e) => {
                    log.append(&format!("Skipping template {}: {}", path.display(), e));
                }
            }
        }

        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLog;
    use image::GrayImage;

    #[test]
    fn test_load_uppercases_stems_and_skips_junk() {
        let dir = tempfile::tempdir().unwrap();

        let img = GrayImage::from_fn(4, 4, |x, y| image::Luma([(x * 16 + y) as u8]));
        img.save(dir.path().join("stamina.png")).unwrap();
        img.save(dir.path().join("Q.png")).unwrap();

        // Not an image despite the extension, and a file with no extension.
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let set = TemplateSet::load_from_dir(dir.path(), &NullLog);
        assert_eq!(set.len(), 2);
        let labels: Vec<&String> = set.iter().map(|(label, _)| label).collect();
        assert_eq!(labels, ["Q", "STAMINA"]);
    }

    #[test]
    fn test_load_missing_directory_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let set = TemplateSet::load_from_dir(&dir.path().join("absent"), &NullLog);
        assert!(set.is_empty());
    }

    #[test]
    fn test_iteration_is_lexical() {
        let mut set = TemplateSet::empty();
        let img = GrayImage::new(2, 2);
        set.insert("w", img.clone());
        set.insert("A", img.clone());
        set.insert("Q", img);

        let labels: Vec<&String> = set.iter().map(|(label, _)| label).collect();
        assert_eq!(labels, ["A", "Q", "W"]);
    }
}
