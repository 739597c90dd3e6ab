use image::Rgba;

use crate::{layout::PALETTE_SIZE, texture::average_color, Error, Result};

const TRANSPARENT_INDEX: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaletteTransparency {
    Opaque,
    /// Index 255 becomes fully transparent black.
    Index255Transparent,
}

/// A 256 colour RGB palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<[u8; 3]>,
}

impl Palette {
    /// # Errors
    ///
    /// Returns `Err` if `bytes` is not exactly 768 bytes long.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PALETTE_SIZE {
            return Err(Error::Corrupted("palette has wrong size"));
        }

        Ok(Self {
            colors: bytes.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect(),
        })
    }

    #[must_use]
    pub fn color(&self, index: u8) -> [u8; 3] {
        self.colors[usize::from(index)]
    }

    /// Expands palette indices to RGBA8 pixels and averages the result.
    ///
    /// The average is the normalized mean of all pixels, transparent black for an empty image.
    #[must_use]
    pub fn indexed_to_rgba(
        &self,
        indices: &[u8],
        transparency: PaletteTransparency,
    ) -> (Vec<u8>, Rgba<f32>) {
        let mut rgba = Vec::with_capacity(indices.len() * 4);

        for &index in indices {
            if transparency == PaletteTransparency::Index255Transparent
                && index == TRANSPARENT_INDEX
            {
                rgba.extend_from_slice(&[0, 0, 0, 0]);
            } else {
                let [r, g, b] = self.color(index);
                rgba.extend_from_slice(&[r, g, b, 0xff]);
            }
        }

        let average = average_color(&rgba);

        (rgba, average)
    }
}
