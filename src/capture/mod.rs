//! Screen frame acquisition.
//!
//! The engine only sees the `FrameSource` trait; the factory picks the GDI
//! implementation on Windows and a stub everywhere else. Capture failures
//! surface as errors the engine downgrades to "no detection this cycle".

pub mod stub;

#[cfg(windows)]
pub mod gdi;

use std::sync::Arc;

use anyhow::Result;
use image::RgbaImage;

use crate::region::CaptureRegion;

/// Provides the current screen size and pixel captures of a region of it.
pub trait FrameSource: Send + Sync {
    /// Full size of the primary display in pixels.
    fn screen_size(&self) -> Result<(u32, u32)>;

    /// Captures the given region. The returned buffer matches the region's
    /// dimensions exactly.
    fn capture(&self, region: &CaptureRegion) -> Result<RgbaImage>;
}

/// Creates the frame source appropriate for the current platform.
pub fn create_frame_source() -> Arc<dyn FrameSource> {
    #[cfg(windows)]
    {
        return Arc::new(gdi::GdiFrameSource::new());
    }
    #[cfg(not(windows))]
    {
        return Arc::new(stub::StubFrameSource::new(1920, 1080));
    }
}
