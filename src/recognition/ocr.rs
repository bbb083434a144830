//! OCR fallback for the recognition pipeline.
//!
//! The capture is binarized at a fixed luminance cutoff to separate the
//! short, large on-screen labels from the background, then handed to an
//! external `tesseract` process in single-line mode. Reader errors are
//! never fatal; the caller treats them as "no text".

use anyhow::{Result, anyhow};
use image::{GrayImage, Luma, RgbaImage};
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

/// Binarizes at `cutoff`: pixels with luminance above it become white,
/// everything else black.
pub fn binarize(img: &RgbaImage, cutoff: u8) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w, h);
    for (x, y, pixel) in img.enumerate_pixels() {
        let luma =
            0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32;
        let value = if luma > cutoff as f32 { 255u8 } else { 0u8 };
        out.put_pixel(x, y, Luma([value]));
    }
    out
}

/// Extracts one line of text from a preprocessed image.
pub trait TextReader: Send + Sync {
    /// Returns the recognized text, uppercased and trimmed.
    fn read_line(&self, image: &GrayImage) -> Result<String>;
}

/// Shells out to a locally installed `tesseract` executable.
pub struct TesseractReader {
    exe: PathBuf,
}

impl TesseractReader {
    pub fn new() -> Self {
        Self {
            exe: PathBuf::from("tesseract"),
        }
    }

    pub fn with_executable(exe: PathBuf) -> Self {
        Self { exe }
    }
}

impl Default for TesseractReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TextReader for TesseractReader {
    fn read_line(&self, image: &GrayImage) -> Result<String> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        image.save(temp_input.path())?;

        let output = Command::new(&self.exe)
            .arg(temp_input.path())
            .arg("stdout")
            .arg("-l")
            .arg("eng")
            .arg("--psm")
            .arg("7") // Treat the image as a single text line
            .output()
            .map_err(|e| anyhow!("failed to run {}: {}", self.exe.display(), e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .trim()
            .to_uppercase())
    }
}

/// Returns the first candidate contained in `text`, scanning candidates in
/// order. Exact substring containment, no fuzzy matching.
pub fn classify<'a>(text: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates.iter().copied().find(|c| text.contains(c))
}
