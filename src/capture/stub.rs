//! Stub frame source for platforms without a capture backend.
//!
//! Returns solid black frames, which the recognition pipeline reports as
//! "not detected". Keeps the cycle loop and the test suite runnable
//! anywhere.

use anyhow::Result;
use image::{Rgba, RgbaImage};

use super::FrameSource;
use crate::region::CaptureRegion;

pub struct StubFrameSource {
    width: u32,
    height: u32,
}

impl StubFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl FrameSource for StubFrameSource {
    fn screen_size(&self) -> Result<(u32, u32)> {
        Ok((self.width, self.height))
    }

    fn capture(&self, region: &CaptureRegion) -> Result<RgbaImage> {
        Ok(RgbaImage::from_pixel(
            region.width(),
            region.height(),
            Rgba([0, 0, 0, 255]),
        ))
    }
}
