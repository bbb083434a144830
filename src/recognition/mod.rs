//! Recognition pipeline: template matching with an OCR fallback.
//!
//! Template matching is the primary path; it is fast and precise when
//! reference images exist but brittle to UI scaling or theme changes. OCR
//! generalizes but is slower and noisier, so it only runs when templates
//! decide nothing.

pub mod ocr;
pub mod store;
pub mod template;

pub use store::TemplateSet;
pub use template::{MatchResult, match_templates};

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;

use crate::logging::LogSink;
use ocr::{TextReader, binarize, classify};
use template::to_luma;

/// Which recognizer produced the decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecognitionSource {
    Template,
    Ocr,
    None,
}

impl fmt::Display for RecognitionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecognitionSource::Template => write!(f, "template"),
            RecognitionSource::Ocr => write!(f, "ocr"),
            RecognitionSource::None => write!(f, "none"),
        }
    }
}

/// The fused decision handed to the cycle engine.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognitionOutcome {
    pub label: Option<String>,
    pub source: RecognitionSource,
}

impl RecognitionOutcome {
    pub fn none() -> Self {
        Self {
            label: None,
            source: RecognitionSource::None,
        }
    }
}

/// Seam the engine recognizes through; lets tests script outcomes.
pub trait Recognition: Send + Sync {
    /// Recognizes a label in `image`. `threshold` overrides the configured
    /// general template gate for this call site.
    fn recognize(
        &self,
        image: &RgbaImage,
        templates: &TemplateSet,
        candidates: &[&str],
        threshold: Option<f32>,
    ) -> RecognitionOutcome;
}

/// Tunables for the production recognizer.
#[derive(Clone, Copy, Debug)]
pub struct RecognizerConfig {
    /// Template gate used when the call site does not pass its own.
    pub default_threshold: f32,
    /// Luminance cutoff for OCR binarization.
    pub ocr_cutoff: u8,
    /// Whether OCR runs at all when templates decide nothing.
    pub ocr_fallback: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            default_threshold: 0.75,
            ocr_cutoff: 180,
            ocr_fallback: true,
        }
    }
}

pub struct Recognizer {
    reader: Box<dyn TextReader>,
    log: Arc<dyn LogSink>,
    config: RecognizerConfig,
}

impl Recognizer {
    pub fn new(reader: Box<dyn TextReader>, log: Arc<dyn LogSink>, config: RecognizerConfig) -> Self {
        Self {
            reader,
            log,
            config,
        }
    }
}

impl Recognition for Recognizer {
    fn recognize(
        &self,
        image: &RgbaImage,
        templates: &TemplateSet,
        candidates: &[&str],
        threshold: Option<f32>,
    ) -> RecognitionOutcome {
        let threshold = threshold.unwrap_or(self.config.default_threshold);

        if !templates.is_empty() {
            let gray = to_luma(image);
            let result = match_templates(&gray, templates, threshold, self.log.as_ref());
            if let Some(label) = result.label {
                self.log.append(&format!(
                    "Found '{}' by template (score={:.2}, {}x{})",
                    label, result.score, result.width, result.height
                ));
                return RecognitionOutcome {
                    label: Some(label),
                    source: RecognitionSource::Template,
                };
            }
            self.log.append(&format!(
                "No template match above {:.2} (best score {:.2})",
                threshold, result.score
            ));
        }

        if self.config.ocr_fallback {
            let prepared = binarize(image, self.config.ocr_cutoff);
            match self.reader.read_line(&prepared) {
                Ok(text) => {
                    self.log.append(&format!("OCR read: '{}'", text));
                    if let Some(label) = classify(&text, candidates) {
                        return RecognitionOutcome {
                            label: Some(label.to_string()),
                            source: RecognitionSource::Ocr,
                        };
                    }
                }
                Err(e) => {
                    self.log.append(&format!("OCR failed: {}", e));
                }
            }
        }

        RecognitionOutcome::none()
    }
}

/// Scripted recognizer for engine tests: answers the word stage and the key
/// stage with fixed labels, telling the stages apart by their candidate set.
#[cfg(test)]
pub struct ScriptedRecognizer {
    word: Option<&'static str>,
    key: Option<&'static str>,
}

#[cfg(test)]
impl ScriptedRecognizer {
    pub fn new(word: Option<&'static str>, key: Option<&'static str>) -> Self {
        Self { word, key }
    }
}

#[cfg(test)]
impl Recognition for ScriptedRecognizer {
    fn recognize(
        &self,
        _image: &RgbaImage,
        _templates: &TemplateSet,
        candidates: &[&str],
        _threshold: Option<f32>,
    ) -> RecognitionOutcome {
        let word_stage = candidates.contains(&"STAMINA");
        let label = if word_stage { self.word } else { self.key };
        match label {
            Some(l) => RecognitionOutcome {
                label: Some(l.to_string()),
                source: RecognitionSource::Template,
            },
            None => RecognitionOutcome::none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLog;
    use anyhow::anyhow;
    use image::{GrayImage, Rgba};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedReader {
        calls: Arc<AtomicUsize>,
        response: Option<&'static str>,
    }

    impl TextReader for ScriptedReader {
        fn read_line(&self, _image: &GrayImage) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.response {
                Some(text) => Ok(text.to_string()),
                None => Err(anyhow!("scripted failure")),
            }
        }
    }

    fn recognizer(
        response: Option<&'static str>,
        fallback: bool,
    ) -> (Recognizer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let reader = ScriptedReader {
            calls: Arc::clone(&calls),
            response,
        };
        let config = RecognizerConfig {
            ocr_fallback: fallback,
            ..RecognizerConfig::default()
        };
        (
            Recognizer::new(Box::new(reader), Arc::new(NullLog), config),
            calls,
        )
    }

    // Bright nonuniform frame: to_luma keeps contrast for matching.
    fn frame() -> RgbaImage {
        RgbaImage::from_fn(30, 20, |x, y| {
            let v = ((x * 13 + y * 31) * (x + y * y + 7) % 256) as u8;
            Rgba([v, v, v, 255])
        })
    }

    fn matching_set(img: &RgbaImage) -> TemplateSet {
        let gray = to_luma(img);
        let tpl = GrayImage::from_fn(8, 6, |x, y| *gray.get_pixel(x + 5, y + 4));
        let mut set = TemplateSet::empty();
        set.insert("STAMINA", tpl);
        set
    }

    #[test]
    fn test_template_hit_skips_ocr() {
        let img = frame();
        let set = matching_set(&img);
        let (recognizer, calls) = recognizer(Some("STRENGTH"), true);

        let outcome = recognizer.recognize(&img, &set, &["STAMINA", "STRENGTH"], Some(0.9));
        assert_eq!(outcome.label.as_deref(), Some("STAMINA"));
        assert_eq!(outcome.source, RecognitionSource::Template);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_template_set_goes_straight_to_ocr() {
        let img = frame();
        let (recognizer, calls) = recognizer(Some("THE STAMINA BAR IS FULL"), true);

        let outcome =
            recognizer.recognize(&img, &TemplateSet::empty(), &["STAMINA", "STRENGTH"], None);
        assert_eq!(outcome.label.as_deref(), Some("STAMINA"));
        assert_eq!(outcome.source, RecognitionSource::Ocr);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_both_paths_missing_yields_none() {
        let img = frame();
        let (recognizer, calls) = recognizer(Some("NOISE"), true);

        let outcome = recognizer.recognize(&img, &TemplateSet::empty(), &["STAMINA"], None);
        assert_eq!(outcome, RecognitionOutcome::none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reader_error_degrades_to_none() {
        let img = frame();
        let (recognizer, calls) = recognizer(None, true);

        let outcome = recognizer.recognize(&img, &TemplateSet::empty(), &["STAMINA"], None);
        assert_eq!(outcome, RecognitionOutcome::none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disabled_fallback_never_invokes_ocr() {
        let img = frame();
        let (recognizer, calls) = recognizer(Some("THE STAMINA BAR IS FULL"), false);

        let outcome = recognizer.recognize(&img, &TemplateSet::empty(), &["STAMINA"], None);
        assert_eq!(outcome, RecognitionOutcome::none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
