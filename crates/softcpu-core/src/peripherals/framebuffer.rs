//! Headless double-buffered framebuffer.
//!
//! Pixels are stored row-major as 32-bit colour values. Out-of-range
//! coordinates are ignored.

use super::Display;
use crate::state::Word;

/// Default framebuffer width in pixels.
pub const DEFAULT_WIDTH: usize = 200;

/// Default framebuffer height in pixels.
pub const DEFAULT_HEIGHT: usize = 200;

const COLOR_MASK: Word = 0xFFFF_FFFF;

/// In-memory [`Display`] with a visible image and a back buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    image: Vec<u32>,
    buffer: Vec<u32>,
    color: Word,
    drawing_to_buffer: bool,
    dirty: bool,
    frames_presented: u64,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl FrameBuffer {
    /// Creates a cleared `width × height` framebuffer.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        let pixels = width * height;
        Self {
            width,
            height,
            image: vec![0; pixels],
            buffer: vec![0; pixels],
            color: 0,
            drawing_to_buffer: false,
            dirty: false,
            frames_presented: 0,
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Visible image pixel at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        self.index(x, y).map(|index| self.image[index])
    }

    /// Back buffer pixel at `(x, y)`.
    #[must_use]
    pub fn buffered_pixel(&self, x: usize, y: usize) -> Option<u32> {
        self.index(x, y).map(|index| self.buffer[index])
    }

    /// Last colour received through [`Display::set_color`].
    #[must_use]
    pub const fn color(&self) -> Word {
        self.color
    }

    /// Returns `true` when drawing into the back buffer.
    #[must_use]
    pub const fn is_drawing_to_buffer(&self) -> bool {
        self.drawing_to_buffer
    }

    /// Number of [`Display::update`] calls that presented changes.
    #[must_use]
    pub const fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    fn index(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }
}

impl Display for FrameBuffer {
    fn set_pixel(&mut self, x: Word, y: Word, color: Word) {
        let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
            return;
        };
        let Some(index) = self.index(x, y) else {
            return;
        };
        let value = u32::try_from(color & COLOR_MASK).unwrap_or(u32::MAX);
        if self.drawing_to_buffer {
            self.buffer[index] = value;
        } else {
            self.image[index] = value;
        }
        self.dirty = true;
    }

    fn clear_image(&mut self) {
        self.image.fill(0);
        self.dirty = true;
    }

    fn clear(&mut self) {
        self.clear_image();
        self.buffer.fill(0);
    }

    fn swap_buffer(&mut self) {
        std::mem::swap(&mut self.image, &mut self.buffer);
        self.dirty = true;
    }

    fn set_drawing_target(&mut self, to_buffer: bool) {
        self.drawing_to_buffer = to_buffer;
    }

    fn set_color(&mut self, color: Word) {
        self.color = color;
    }

    fn needs_update(&self) -> bool {
        self.dirty
    }

    fn update(&mut self) {
        if self.dirty {
            self.dirty = false;
            self.frames_presented += 1;
        }
    }
}
