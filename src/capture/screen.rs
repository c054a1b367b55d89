//! Screen region capture using GDI.
//!
//! Copies the region from the screen DC into a 32-bit top-down DIB and
//! converts BGRA to RGB. Device contexts are acquired and released on every
//! capture, so a source holds no GDI handles between frames.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CAPTUREBLT, DIB_RGB_COLORS,
    SRCCOPY,
};

use super::{CaptureBackend, CaptureRegion, Frame, FrameSource};

/// Opens GDI screen capture sources.
#[derive(Default)]
pub struct GdiCapture;

impl CaptureBackend for GdiCapture {
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(GdiSource { closed: false }))
    }
}

/// One run's capture handle.
pub struct GdiSource {
    closed: bool,
}

impl FrameSource for GdiSource {
    fn capture(&mut self, region: &CaptureRegion) -> Option<Frame> {
        if self.closed || region.is_empty() {
            return None;
        }
        match capture_region(region) {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::debug!("Screen capture missed: {:#}", e);
                None
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Captures a screen region into an RGB frame.
pub fn capture_region(region: &CaptureRegion) -> Result<Frame> {
    let width = region.width as i32;
    let height = region.height as i32;

    unsafe {
        let screen_dc = GetDC(HWND::default());
        if screen_dc.is_invalid() {
            return Err(anyhow!("GetDC failed for the screen"));
        }
        let mem_dc = CreateCompatibleDC(screen_dc);
        let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
        let previous = SelectObject(mem_dc, bitmap);

        let result = BitBlt(
            mem_dc,
            0,
            0,
            width,
            height,
            screen_dc,
            region.x,
            region.y,
            SRCCOPY | CAPTUREBLT,
        )
        .map_err(|e| anyhow!("BitBlt failed: {}", e))
        .and_then(|_| read_bitmap(mem_dc, bitmap, region.width, region.height));

        SelectObject(mem_dc, previous);
        let _ = DeleteObject(bitmap);
        let _ = DeleteDC(mem_dc);
        ReleaseDC(HWND::default(), screen_dc);

        result
    }
}

/// Reads a selected bitmap as 32-bit BGRA rows and converts to RGB.
unsafe fn read_bitmap(
    dc: windows::Win32::Graphics::Gdi::HDC,
    bitmap: windows::Win32::Graphics::Gdi::HBITMAP,
    width: u32,
    height: u32,
) -> Result<Frame> {
    let mut info = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width as i32,
            // Negative height: top-down rows
            biHeight: -(height as i32),
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut bgra = vec![0u8; (width * height * 4) as usize];
    let lines = unsafe {
        GetDIBits(
            dc,
            bitmap,
            0,
            height,
            Some(bgra.as_mut_ptr() as *mut _),
            &mut info,
            DIB_RGB_COLORS,
        )
    };
    if lines != height as i32 {
        return Err(anyhow!("GetDIBits copied {} of {} lines", lines, height));
    }

    Ok(bgra_to_rgb(&bgra, width, height))
}

fn bgra_to_rgb(bgra: &[u8], width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let offset = ((y * width + x) * 4) as usize;
        // BGRA -> RGB
        Rgb([bgra[offset + 2], bgra[offset + 1], bgra[offset]])
    })
}
