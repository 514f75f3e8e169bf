//! Capture and detection seams.
//!
//! Both the capture source and the detection algorithm are external
//! collaborators; the traits here are the contract the watch loop runs
//! against. The synthetic implementations back the demo binary and tests.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// One captured video frame, tightly packed RGB8.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; (width * height * 3) as usize],
        }
    }
}

/// Detection result: the (possibly annotated) frame plus the match flag.
#[derive(Debug)]
pub struct Detection {
    pub frame: Frame,
    pub matched: bool,
}

/// Produces frames on demand. `None` means the source is exhausted —
/// a clean stop for the watch loop, never an error.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Consumes a frame, returns it annotated together with a match flag.
pub trait Detector {
    fn detect(&mut self, frame: Frame) -> Detection;
}

/// Encode a frame as JPEG for transport.
pub fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 80)
        .encode(
            &frame.pixels,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )
        .context("jpeg encoding failed")?;
    Ok(out)
}

// ── Synthetic implementations ─────────────────────────────────────────────────

/// Deterministic frame generator: alternates runs of bright and dark
/// frames so a luma-based detector fires periodically.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    remaining: Option<u64>,
    tick: u64,
}

impl SyntheticSource {
    /// `frames` bounds the stream; `None` runs until stopped.
    pub fn new(width: u32, height: u32, frames: Option<u64>) -> Self {
        Self {
            width,
            height,
            remaining: frames,
            tick: 0,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Option<Frame> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }
        let value = if self.tick % 10 < 5 { 200 } else { 30 };
        self.tick += 1;
        Some(Frame::filled(self.width, self.height, value))
    }
}

/// Flags frames whose mean luma exceeds the threshold, marking the frame
/// with a red border.
pub struct LumaDetector {
    pub threshold: u8,
}

impl Default for LumaDetector {
    fn default() -> Self {
        Self { threshold: 128 }
    }
}

impl Detector for LumaDetector {
    fn detect(&mut self, mut frame: Frame) -> Detection {
        let sum: u64 = frame.pixels.iter().map(|&b| b as u64).sum();
        let mean = if frame.pixels.is_empty() {
            0
        } else {
            (sum / frame.pixels.len() as u64) as u8
        };
        let matched = mean > self.threshold;
        if matched {
            draw_border(&mut frame);
        }
        Detection { frame, matched }
    }
}

fn draw_border(frame: &mut Frame) {
    let (w, h) = (frame.width as usize, frame.height as usize);
    let mut paint = |x: usize, y: usize| {
        let i = (y * w + x) * 3;
        if i + 2 < frame.pixels.len() {
            frame.pixels[i] = 255;
            frame.pixels[i + 1] = 0;
            frame.pixels[i + 2] = 0;
        }
    };
    for x in 0..w {
        paint(x, 0);
        if h > 1 {
            paint(x, h - 1);
        }
    }
    for y in 0..h {
        paint(0, y);
        if w > 1 {
            paint(w - 1, y);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
