//! Capture region geometry.
//!
//! The trainer watches a fixed-size rectangle centered on the display. The
//! rectangle is recomputed from the live screen size at the start of every
//! cycle, so a resolution change between runs needs no restart.

use serde::{Deserialize, Serialize};

/// Absolute pixel bounds of the capture rectangle.
///
/// Invariant: `0 <= left < right <= screen_w` and `0 <= top < bottom <= screen_h`
/// for the screen the region was computed against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureRegion {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CaptureRegion {
    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
}

/// Configured size and vertical offset of the capture rectangle.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Width of the capture zone in pixels.
    pub width: u32,
    /// Height of the capture zone in pixels.
    pub height: u32,
    /// Offset from the screen center, positive is down.
    pub y_offset: i32,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            width: 420,
            height: 220,
            y_offset: 0,
        }
    }
}

impl RegionConfig {
    pub fn resolve(&self, screen_w: u32, screen_h: u32) -> CaptureRegion {
        compute_region(screen_w, screen_h, self.width, self.height, self.y_offset)
    }
}

/// Computes a `target_w` x `target_h` rectangle centered at
/// `(screen_w / 2, screen_h / 2 + y_offset)`, clamped to the screen bounds.
///
/// Clamping never errors: near a screen edge the rectangle shrinks instead.
/// The result always spans at least one pixel in each direction, so callers
/// must pass a screen of at least 1x1.
pub fn compute_region(
    screen_w: u32,
    screen_h: u32,
    target_w: u32,
    target_h: u32,
    y_offset: i32,
) -> CaptureRegion {
    debug_assert!(screen_w > 0 && screen_h > 0);
    let sw = screen_w.max(1) as i64;
    let sh = screen_h.max(1) as i64;
    let tw = target_w.max(1) as i64;
    let th = target_h.max(1) as i64;

    let cx = sw / 2;
    let cy = sh / 2 + y_offset as i64;

    let left = (cx - tw / 2).clamp(0, sw - 1);
    let right = (cx + (tw - tw / 2)).clamp(left + 1, sw);
    let top = (cy - th / 2).clamp(0, sh - 1);
    let bottom = (cy + (th - th / 2)).clamp(top + 1, sh);

    CaptureRegion {
        left: left as u32,
        top: top as u32,
        right: right as u32,
        bottom: bottom as u32,
    }
}
