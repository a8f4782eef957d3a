//! Frame buffers and pixel operations.
//!
//! The pipeline treats a frame as an owned RGB24 byte buffer plus its
//! dimensions. JPEG encode/decode is delegated to the `image` crate; ROI
//! cropping and the evidence overlay (rectangle + label) operate on the raw
//! buffer directly.

use anyhow::{anyhow, Context, Result};
use image::ImageEncoder;

use crate::config::Roi;

pub const EVIDENCE_GREEN: [u8; 3] = [0, 255, 0];

/// An owned RGB24 frame.
#[derive(Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

/// One captured frame with its wall-clock capture time (epoch seconds).
pub struct Sample {
    pub frame: Frame,
    pub captured_ts: f64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(anyhow!(
                "frame buffer is {} bytes; expected {} for {}x{} RGB24",
                data.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Decode a JPEG buffer into an RGB24 frame.
    pub fn from_jpeg(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("decode jpeg")?;
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(rgb.into_raw(), width, height)
    }

    /// Encode this frame as JPEG.
    pub fn to_jpeg(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new(&mut out)
            .write_image(
                &self.data,
                self.width,
                self.height,
                image::ExtendedColorType::Rgb8,
            )
            .context("jpeg encode frame")?;
        Ok(out)
    }

    fn put_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data[idx..idx + 3].copy_from_slice(&color);
    }
}

/// Map one ROI axis to pixel bounds.
///
/// A value ≤ 1 is normalized, larger values are absolute pixels (decided per
/// component). The origin is clamped into the frame first and the upper
/// bound is computed from the clamped origin, so an out-of-range rectangle
/// slides to the frame edge keeping its extent, and a crop is never empty.
fn axis_bounds(origin: f64, extent: f64, limit: u32) -> (u32, u32) {
    let limit_i = i64::from(limit);
    let e = scale_coord(extent, limit);
    let lo = scale_coord(origin, limit).clamp(0, limit_i - 1);
    let hi = limit_i.min((lo + 1).max(lo + e));
    (lo as u32, hi as u32)
}

fn scale_coord(value: f64, limit: u32) -> i64 {
    if value <= 1.0 {
        (value * f64::from(limit)).round() as i64
    } else {
        value.round() as i64
    }
}

/// ROI rectangle in pixel coordinates: `(x1, y1, x2, y2)`, exclusive ends.
pub fn roi_pixel_rect(roi: &Roi, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let (x1, x2) = axis_bounds(roi.x, roi.w, width);
    let (y1, y2) = axis_bounds(roi.y, roi.h, height);
    (x1, y1, x2, y2)
}

/// Crop a frame to an ROI. The output is always at least 1x1.
pub fn crop_roi(frame: &Frame, roi: &Roi) -> Frame {
    let (x1, y1, x2, y2) = roi_pixel_rect(roi, frame.width, frame.height);
    let crop_width = x2 - x1;
    let crop_height = y2 - y1;
    let mut data = Vec::with_capacity((crop_width * crop_height * 3) as usize);
    for row in y1..y2 {
        let start = ((row * frame.width + x1) * 3) as usize;
        let end = start + (crop_width * 3) as usize;
        data.extend_from_slice(&frame.data[start..end]);
    }
    Frame {
        data,
        width: crop_width,
        height: crop_height,
    }
}

/// Outline a pixel rectangle with a border of the given thickness.
pub fn draw_rect(frame: &mut Frame, rect: (u32, u32, u32, u32), thickness: u32, color: [u8; 3]) {
    let (x1, y1, x2, y2) = rect;
    for t in 0..thickness {
        for x in x1..x2 {
            frame.put_pixel(x, y1 + t, color);
            frame.put_pixel(x, y2.saturating_sub(1 + t), color);
        }
        for y in y1..y2 {
            frame.put_pixel(x1 + t, y, color);
            frame.put_pixel(x2.saturating_sub(1 + t), y, color);
        }
    }
}

const GLYPH_COLS: u32 = 5;
const GLYPH_SCALE: u32 = 2;

/// Stamp a short label onto the frame from the built-in 5x7 glyph table.
///
/// Characters without a glyph still advance the pen, so unknown characters
/// render as gaps rather than shifting the rest of the text.
pub fn draw_label(frame: &mut Frame, text: &str, x0: u32, y0: u32, color: [u8; 3]) {
    let mut pen_x = x0;
    for c in text.chars() {
        if let Some(rows) = glyph(c.to_ascii_uppercase()) {
            for (gy, row) in rows.iter().enumerate() {
                for gx in 0..GLYPH_COLS {
                    if row & (1 << (GLYPH_COLS - 1 - gx)) == 0 {
                        continue;
                    }
                    for sy in 0..GLYPH_SCALE {
                        for sx in 0..GLYPH_SCALE {
                            frame.put_pixel(
                                pen_x + gx * GLYPH_SCALE + sx,
                                y0 + gy as u32 * GLYPH_SCALE + sy,
                                color,
                            );
                        }
                    }
                }
            }
        }
        pen_x += (GLYPH_COLS + 1) * GLYPH_SCALE;
    }
}

/// 5x7 bitmap glyphs, one row per byte, MSB-left in the low 5 bits.
fn glyph(c: char) -> Option<[u8; 7]> {
    let rows = match c {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b11011, 0b10001],
        'X' => [0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b01010, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        _ => return None,
    };
    Some(rows)
}
