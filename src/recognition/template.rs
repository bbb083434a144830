//! Template matching over grayscale captures.
//!
//! Every template is scored with the same zero-mean normalized
//! cross-correlation, slid over all placements, so scores are comparable
//! across the set. A template that cannot be scored (larger than the
//! capture, empty, or without contrast) produces a per-template error that
//! is skipped and logged; it never aborts the batch.

use anyhow::{Result, anyhow};
use image::{GrayImage, Luma, RgbaImage};

use super::store::TemplateSet;
use crate::logging::LogSink;

/// Outcome of one matching attempt across a template set.
///
/// `score` is the best similarity observed, in [0, 1], and is reported even
/// when it stayed below the threshold and `label` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub label: Option<String>,
    pub score: f32,
    pub location: Option<(u32, u32)>,
    pub width: u32,
    pub height: u32,
}

impl MatchResult {
    fn no_match(score: f32) -> Self {
        Self {
            label: None,
            score,
            location: None,
            width: 0,
            height: 0,
        }
    }
}

/// ITU-R BT.601 luma conversion, the same weighting for captures and
/// templates.
pub fn to_luma(img: &RgbaImage) -> GrayImage {
    let (w, h) = img.dimensions();
    let mut out = GrayImage::new(w, h);
    for (x, y, pixel) in img.enumerate_pixels() {
        let luma =
            0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32;
        out.put_pixel(x, y, Luma([luma.round().min(255.0) as u8]));
    }
    out
}

/// Scores a single template against every placement in the capture.
/// Returns the best similarity and its top-left placement.
fn match_one(region: &GrayImage, template: &GrayImage) -> Result<(f32, (u32, u32))> {
    let (rw, rh) = region.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 {
        return Err(anyhow!("template is empty"));
    }
    if tw > rw || th > rh {
        return Err(anyhow!(
            "template {}x{} exceeds capture {}x{}",
            tw,
            th,
            rw,
            rh
        ));
    }

    let n = (tw as f64) * (th as f64);
    let tpl: Vec<f64> = template.pixels().map(|p| p[0] as f64).collect();
    let t_mean = tpl.iter().sum::<f64>() / n;
    let t_dev: Vec<f64> = tpl.iter().map(|v| v - t_mean).collect();
    let t_norm = t_dev.iter().map(|v| v * v).sum::<f64>().sqrt();
    if t_norm == 0.0 {
        return Err(anyhow!("template has no contrast"));
    }

    let mut best: Option<(f64, (u32, u32))> = None;
    for oy in 0..=(rh - th) {
        for ox in 0..=(rw - tw) {
            let mut sum = 0.0;
            for y in 0..th {
                for x in 0..tw {
                    sum += region.get_pixel(ox + x, oy + y)[0] as f64;
                }
            }
            let r_mean = sum / n;

            let mut cross = 0.0;
            let mut r_sq = 0.0;
            let mut i = 0;
            for y in 0..th {
                for x in 0..tw {
                    let r = region.get_pixel(ox + x, oy + y)[0] as f64 - r_mean;
                    cross += r * t_dev[i];
                    r_sq += r * r;
                    i += 1;
                }
            }
            // A flat window has no defined correlation; skip the placement.
            if r_sq == 0.0 {
                continue;
            }

            let score = cross / (r_sq.sqrt() * t_norm);
            if best.is_none_or(|(s, _)| score > s) {
                best = Some((score, (ox, oy)));
            }
        }
    }

    match best {
        Some((score, at)) => Ok((score.clamp(0.0, 1.0) as f32, at)),
        None => Err(anyhow!("capture has no contrast anywhere")),
    }
}

/// Matches the capture against every template in the set and returns the
/// best-scoring label if it clears `threshold`.
///
/// Ties break to the lexically-first label: iteration is in `TemplateSet`
/// order and only a strictly greater score replaces the running best.
pub fn match_templates(
    region: &GrayImage,
    set: &TemplateSet,
    threshold: f32,
    log: &dyn LogSink,
) -> MatchResult {
    let mut best: Option<MatchResult> = None;

    for (label, template) in set.iter() {
        match match_one(region, template) {
            Ok((score, location)) => {
                if best.as_ref().is_none_or(|b| score > b.score) {
                    best = Some(MatchResult {
                        label: Some(label.clone()),
                        score,
                        location: Some(location),
                        width: template.width(),
                        height: template.height(),
                    });
                }
            }
            Err(e) => {
                log.append(&format!("Template '{}' skipped: {}", label, e));
            }
        }
    }

    match best {
        Some(result) if result.score >= threshold => result,
        Some(result) => MatchResult::no_match(result.score),
        None => MatchResult::no_match(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NullLog;

    // Nonlinear so that shifted windows decorrelate; a plain gradient is
    // shift-invariant under zero-mean correlation and would match anywhere.
    fn patterned(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            Luma([((x * 13 + y * 31) * (x + y * y + 7) % 256) as u8])
        })
    }

    fn crop(img: &GrayImage, x0: u32, y0: u32, w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| *img.get_pixel(x0 + x, y0 + y))
    }

    #[test]
    fn test_exact_copy_matches_at_its_location() {
        let region = patterned(40, 30);
        let mut set = TemplateSet::empty();
        set.insert("STAMINA", crop(&region, 10, 5, 8, 6));

        let result = match_templates(&region, &set, 0.9, &NullLog);
        assert_eq!(result.label.as_deref(), Some("STAMINA"));
        assert!(result.score > 0.99, "score was {}", result.score);
        assert_eq!(result.location, Some((10, 5)));
        assert_eq!((result.width, result.height), (8, 6));
    }

    #[test]
    fn test_matching_is_deterministic() {
        let region = patterned(32, 24);
        let mut set = TemplateSet::empty();
        set.insert("A", crop(&region, 3, 3, 6, 6));
        set.insert("B", patterned(6, 6));

        let first = match_templates(&region, &set, 0.5, &NullLog);
        let second = match_templates(&region, &set, 0.5, &NullLog);
        assert_eq!(first, second);
    }

    #[test]
    fn test_below_threshold_reports_score_without_label() {
        let region = patterned(30, 20);
        // Inverted pattern correlates negatively, which clamps to zero.
        let inverted = GrayImage::from_fn(12, 10, |x, y| {
            Luma([255 - ((x * 13 + y * 31) * (x + y * y + 7) % 256) as u8])
        });
        let mut set = TemplateSet::empty();
        set.insert("STRENGTH", inverted);

        let result = match_templates(&region, &set, 0.72, &NullLog);
        assert_eq!(result.label, None);
        assert!(result.score < 0.72);
    }

    #[test]
    fn test_tie_breaks_to_lexically_first_label() {
        let region = patterned(30, 20);
        let template = crop(&region, 4, 4, 6, 6);
        let mut set = TemplateSet::empty();
        set.insert("W", template.clone());
        set.insert("A", template);

        let result = match_templates(&region, &set, 0.9, &NullLog);
        assert_eq!(result.label.as_deref(), Some("A"));
    }

    #[test]
    fn test_unmatchable_template_is_skipped_not_fatal() {
        let region = patterned(20, 20);
        let mut set = TemplateSet::empty();
        set.insert("HUGE", patterned(100, 100));
        set.insert("FLAT", GrayImage::from_pixel(4, 4, Luma([128])));
        set.insert("GOOD", crop(&region, 2, 2, 5, 5));

        let result = match_templates(&region, &set, 0.9, &NullLog);
        assert_eq!(result.label.as_deref(), Some("GOOD"));
    }

    #[test]
    fn test_empty_set_yields_no_match() {
        let region = patterned(20, 20);
        let result = match_templates(&region, &TemplateSet::empty(), 0.5, &NullLog);
        assert_eq!(result.label, None);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_to_luma_weighting() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 0, image::Rgba([255, 0, 0, 255]));

        let gray = to_luma(&img);
        assert_eq!(gray.get_pixel(0, 0)[0], 255);
        assert_eq!(gray.get_pixel(1, 0)[0], 76);
    }
}
