use image::imageops::{self, FilterType};

use crate::environment::collaborators::RawFrame;

/// Frame edge length the value network is built for
pub const FRAME_SIZE: usize = 84;

// ITU-R 601-2 luma
const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// Preprocessed game frame: single channel, `[1, height, width]`, row-major, normalized to `0.0..=1.0`
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    width: usize,
    height: usize,
    pixels: Vec<f32>,
}

impl Observation {
    pub fn from_pixels(
        width: usize,
        height: usize,
        pixels: Vec<f32>,
    ) -> Self {
        assert_eq!(pixels.len(), width * height, "pixel count does not match {}x{}", width, height);
        Self { width, height, pixels }
    }

    pub fn blank(
        width: usize,
        height: usize,
    ) -> Self {
        Self::from_pixels(width, height, vec![0.0; width * height])
    }

    /// `[channels, height, width]`
    pub fn dims(&self) -> [usize; 3] { [1, self.height, self.width] }

    pub fn width(&self) -> usize { self.width }

    pub fn height(&self) -> usize { self.height }

    pub fn pixels(&self) -> &[f32] { &self.pixels }

    pub fn pixel(
        &self,
        x: usize,
        y: usize,
    ) -> f32 {
        self.pixels[y * self.width + x]
    }
}

/// Converts raw screenshots into the network input: resize (bilinear) → grayscale → normalize.
#[derive(Debug, Clone, Copy)]
pub struct Preprocessor {
    width: u32,
    height: u32,
}

impl Default for Preprocessor {
    fn default() -> Self { Self::new(FRAME_SIZE, FRAME_SIZE) }
}

impl Preprocessor {
    pub fn new(
        width: usize,
        height: usize,
    ) -> Self {
        assert!(width > 0 && height > 0);
        Self {
            width: width as u32,
            height: height as u32,
        }
    }

    /// Frames which [Self::process] can take
    pub fn accepts(frame: &RawFrame) -> bool { frame.width() > 0 && frame.height() > 0 }

    /// # Panics
    /// for frames not passing [Self::accepts] - callers have to filter those out
    pub fn process(
        &self,
        frame: &RawFrame,
    ) -> Observation {
        assert!(Self::accepts(frame), "malformed frame {}x{}", frame.width(), frame.height());

        let resized = imageops::resize(frame, self.width, self.height, FilterType::Triangle);
        let pixels = resized
            .pixels()
            .map(|p| {
                let [r, g, b, _] = p.0;
                let luma = LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32;
                (luma / 255.0).min(1.0)
            })
            .collect();

        Observation::from_pixels(self.width as usize, self.height as usize, pixels)
    }
}
