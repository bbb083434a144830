//! Whole-screen capture via GDI BitBlt.
//!
//! Copies the requested region of the screen DC into a 32-bit top-down DIB
//! and converts BGRA to RGBA. Slower than the Graphics Capture API but has
//! no device setup and works for the desktop as a whole, which is all the
//! trainer needs.

use anyhow::{Result, anyhow};
use image::RgbaImage;

use windows::Win32::Graphics::Gdi::{
    BI_RGB, BITMAPINFO, BITMAPINFOHEADER, BitBlt, CreateCompatibleBitmap, CreateCompatibleDC,
    DIB_RGB_COLORS, DeleteDC, DeleteObject, GetDC, GetDIBits, ReleaseDC, SRCCOPY, SelectObject,
};
use windows::Win32::UI::WindowsAndMessaging::{GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN};

use super::FrameSource;
use crate::region::CaptureRegion;

pub struct GdiFrameSource;

impl GdiFrameSource {
    pub fn new() -> Self {
        Self
    }
}

impl FrameSource for GdiFrameSource {
    fn screen_size(&self) -> Result<(u32, u32)> {
        let w = unsafe { GetSystemMetrics(SM_CXSCREEN) };
        let h = unsafe { GetSystemMetrics(SM_CYSCREEN) };
        if w <= 0 || h <= 0 {
            return Err(anyhow!("GetSystemMetrics returned {}x{}", w, h));
        }
        Ok((w as u32, h as u32))
    }

    fn capture(&self, region: &CaptureRegion) -> Result<RgbaImage> {
        let width = region.width() as i32;
        let height = region.height() as i32;

        unsafe {
            let screen_dc = GetDC(None);
            if screen_dc.is_invalid() {
                return Err(anyhow!("GetDC failed for the screen"));
            }

            let mem_dc = CreateCompatibleDC(screen_dc);
            if mem_dc.is_invalid() {
                ReleaseDC(None, screen_dc);
                return Err(anyhow!("CreateCompatibleDC failed"));
            }

            let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            if bitmap.is_invalid() {
                let _ = DeleteDC(mem_dc);
                ReleaseDC(None, screen_dc);
                return Err(anyhow!("CreateCompatibleBitmap failed ({}x{})", width, height));
            }

            let previous = SelectObject(mem_dc, bitmap.into());
            let blt = BitBlt(
                mem_dc,
                0,
                0,
                width,
                height,
                screen_dc,
                region.left as i32,
                region.top as i32,
                SRCCOPY,
            );

            let mut pixels = vec![0u8; (width * height * 4) as usize];
            let mut copied_rows = 0;
            if blt.is_ok() {
                // Negative height requests a top-down DIB.
                let mut info = BITMAPINFO {
                    bmiHeader: BITMAPINFOHEADER {
                        biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                        biWidth: width,
                        biHeight: -height,
                        biPlanes: 1,
                        biBitCount: 32,
                        biCompression: BI_RGB.0,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                copied_rows = GetDIBits(
                    mem_dc,
                    bitmap,
                    0,
                    height as u32,
                    Some(pixels.as_mut_ptr() as *mut _),
                    &mut info,
                    DIB_RGB_COLORS,
                );
            }

            SelectObject(mem_dc, previous);
            let _ = DeleteObject(bitmap.into());
            let _ = DeleteDC(mem_dc);
            ReleaseDC(None, screen_dc);

            if blt.is_err() {
                return Err(anyhow!("BitBlt failed: {:?}", blt));
            }
            if copied_rows != height {
                return Err(anyhow!(
                    "GetDIBits copied {} of {} rows",
                    copied_rows,
                    height
                ));
            }

            // GDI hands back BGRA; swap to RGBA in place.
            for chunk in pixels.chunks_exact_mut(4) {
                chunk.swap(0, 2);
                chunk[3] = 255;
            }

            RgbaImage::from_raw(width as u32, height as u32, pixels)
                .ok_or_else(|| anyhow!("captured buffer has unexpected size"))
        }
    }
}
