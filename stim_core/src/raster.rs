//! Owned 8-bit image buffers.

use stim_traits::Rgb;

use crate::error::{Result, invalid};

/// Width and height of a produced frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputShape {
    pub width: usize,
    pub height: usize,
}

impl OutputShape {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

/// Row-major, interleaved-channel image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl Raster {
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(invalid("raster dimensions must be > 0"));
        }
        if !(1..=4).contains(&channels) {
            return Err(invalid("raster must have 1 to 4 channels"));
        }
        if data.len() != width * height * channels {
            return Err(invalid("raster data length does not match its shape"));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Zeroed buffer.
    pub fn blank(shape: OutputShape, channels: usize) -> Self {
        Self {
            width: shape.width,
            height: shape.height,
            channels,
            data: vec![0; shape.width * shape.height * channels],
        }
    }

    /// Whole-field RGB buffer of one colour.
    pub fn filled(shape: OutputShape, color: Rgb) -> Self {
        let px = [color.0, color.1, color.2];
        let data = px
            .iter()
            .copied()
            .cycle()
            .take(shape.width * shape.height * 3)
            .collect();
        Self {
            width: shape.width,
            height: shape.height,
            channels: 3,
            data,
        }
    }

    /// Vertical RGB stripes `period` pixels wide, alternating `a` and `b`.
    pub fn gratings(shape: OutputShape, period: usize, a: Rgb, b: Rgb) -> Self {
        let period = period.max(1);
        let mut out = Self::blank(shape, 3);
        for y in 0..shape.height {
            for x in 0..shape.width {
                let c = if (x / period) % 2 == 0 { a } else { b };
                let i = out.index(x, y);
                out.data[i..i + 3].copy_from_slice(&[c.0, c.1, c.2]);
            }
        }
        out
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn shape(&self) -> OutputShape {
        OutputShape::new(self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub(crate) fn index(&self, x: usize, y: usize) -> usize {
        (y * self.width + x) * self.channels
    }

    /// Channel values of pixel `(x, y)`; `None` outside the image.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        Some(&self.data[i..i + self.channels])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filled_is_uniform() {
        let r = Raster::filled(OutputShape::new(3, 2), Rgb(1, 2, 3));
        assert_eq!(r.data().len(), 18);
        assert_eq!(r.pixel(2, 1), Some(&[1u8, 2, 3][..]));
        assert_eq!(r.pixel(3, 0), None);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        assert!(Raster::new(2, 2, 3, vec![0; 11]).is_err());
        assert!(Raster::new(0, 2, 1, vec![]).is_err());
    }
}
