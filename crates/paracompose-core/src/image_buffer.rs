//! RGB pixel buffers with shareable backing storage.

use std::sync::Arc;

use crate::error::{ParacomposeError, Result};

/// Bytes per pixel.
pub const COMPONENTS: usize = 3;

/// A rectangular array of RGB triples, row-major, origin bottom-left.
///
/// Storage is reference counted so two buffers may alias the same pixels
/// (see [`ImageBuffer::share_from`]). Mutation goes through
/// [`ImageBuffer::pixels_mut`], which copies first if the storage is shared.
#[derive(Debug, Clone, Default)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    data: Arc<Vec<u8>>,
}

impl ImageBuffer {
    /// Creates a zero-filled image.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: Arc::new(vec![0; byte_len(width, height)]),
        }
    }

    /// Wraps existing RGB data.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = byte_len(width, height);
        if data.len() != expected {
            return Err(ParacomposeError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data: Arc::new(data),
        })
    }

    /// Creates an image filled with one color.
    #[must_use]
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(byte_len(width, height))
            .collect();
        Self {
            width,
            height,
            data: Arc::new(data),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the buffer holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw RGB bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Mutable RGB bytes, breaking any sharing first.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        Arc::make_mut(&mut self.data).as_mut_slice()
    }

    /// Resizes to `width` x `height`, reallocating only when the size changes.
    /// Contents are unspecified afterwards.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.size() == (width, height) && self.data.len() == byte_len(width, height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.data = Arc::new(vec![0; byte_len(width, height)]);
    }

    /// Replaces the contents with `data` read from a surface.
    pub fn assign(&mut self, width: u32, height: u32, data: Vec<u8>) -> Result<()> {
        *self = Self::from_raw(width, height, data)?;
        Ok(())
    }

    /// Whether both buffers point at the same backing storage.
    pub fn shares_storage(&self, other: &ImageBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Makes this buffer alias `other`'s storage without copying.
    pub fn share_from(&mut self, other: &ImageBuffer) {
        self.width = other.width;
        self.height = other.height;
        self.data = Arc::clone(&other.data);
    }

    /// Drops aliased storage, leaving this buffer empty and independent.
    ///
    /// Does nothing if the storage is not shared.
    pub fn release_shared_storage(&mut self) {
        if Arc::strong_count(&self.data) > 1 {
            *self = Self::default();
        }
    }

    /// RGB value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = self.offset(x, y);
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Sets the RGB value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` lies outside the image.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let i = self.offset(x, y);
        self.pixels_mut()[i..i + COMPONENTS].copy_from_slice(&rgb);
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height, "pixel out of range");
        (y as usize * self.width as usize + x as usize) * COMPONENTS
    }

    /// Copies the inclusive rectangle `(x1, y1)-(x2, y2)` into `out`.
    ///
    /// Corners may be given in any order. `out` is left untouched if the
    /// rectangle is not inside the image.
    pub fn copy_region(&self, x1: u32, y1: u32, x2: u32, y2: u32, out: &mut Vec<u8>) -> Result<()> {
        let (x1, x2) = (x1.min(x2), x1.max(x2));
        let (y1, y2) = (y1.min(y2), y1.max(y2));
        if x2 >= self.width || y2 >= self.height {
            log::error!(
                "requested pixels ({x1}, {y1})-({x2}, {y2}) outside of {}x{} image",
                self.width,
                self.height
            );
            return Err(ParacomposeError::RegionOutOfBounds {
                x1,
                y1,
                x2,
                y2,
                width: self.width,
                height: self.height,
            });
        }

        let row_bytes = (x2 - x1 + 1) as usize * COMPONENTS;
        out.clear();
        out.reserve(row_bytes * (y2 - y1 + 1) as usize);
        for y in y1..=y2 {
            let start = self.offset(x1, y);
            out.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Ok(())
    }

    /// Returns the inclusive rectangle `(x1, y1)-(x2, y2)` as RGB bytes.
    pub fn region(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.copy_region(x1, y1, x2, y2, &mut out)?;
        Ok(out)
    }

    /// Writes RGB `data` into the inclusive rectangle `(x1, y1)-(x2, y2)`.
    pub fn write_region(&mut self, x1: u32, y1: u32, x2: u32, y2: u32, data: &[u8]) -> Result<()> {
        let (x1, x2) = (x1.min(x2), x1.max(x2));
        let (y1, y2) = (y1.min(y2), y1.max(y2));
        if x2 >= self.width || y2 >= self.height {
            return Err(ParacomposeError::RegionOutOfBounds {
                x1,
                y1,
                x2,
                y2,
                width: self.width,
                height: self.height,
            });
        }
        let row_bytes = (x2 - x1 + 1) as usize * COMPONENTS;
        let expected = row_bytes * (y2 - y1 + 1) as usize;
        if data.len() != expected {
            return Err(ParacomposeError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let width = self.width as usize;
        let pixels = self.pixels_mut();
        for (row, src) in (y1..=y2).zip(data.chunks_exact(row_bytes)) {
            let start = (row as usize * width + x1 as usize) * COMPONENTS;
            pixels[start..start + row_bytes].copy_from_slice(src);
        }
        Ok(())
    }

    /// Nearest-neighbor upsampling of `self` into `dest`, which is resized
    /// to `width` x `height`.
    ///
    /// Destination row `y` samples source row `y * src_h / height`, column `x`
    /// samples `x * src_w / width`. With `repeat_rows` set, a destination row
    /// whose source row matches the previous one is copied from the previous
    /// destination row instead of being resampled.
    ///
    /// An empty source leaves `dest` black.
    pub fn magnify_into(&self, dest: &mut ImageBuffer, width: u32, height: u32, repeat_rows: bool) {
        dest.resize(width, height);
        if width == 0 || height == 0 {
            return;
        }
        if self.is_empty() {
            dest.pixels_mut().fill(0);
            return;
        }

        let (src_w, src_h) = (u64::from(self.width), u64::from(self.height));
        let row_bytes = width as usize * COMPONENTS;
        let src = self.pixels();
        let out = dest.pixels_mut();

        // Source byte offsets per destination column are the same for every row.
        let columns: Vec<usize> = (0..u64::from(width))
            .map(|x| (x * src_w / u64::from(width)) as usize * COMPONENTS)
            .collect();

        let mut last_src_row = None;
        for y in 0..height as usize {
            let src_row = (y as u64 * src_h / u64::from(height)) as usize;
            let dest_start = y * row_bytes;
            if repeat_rows && last_src_row == Some(src_row) {
                out.copy_within(dest_start - row_bytes..dest_start, dest_start);
                continue;
            }
            let src_start = src_row * src_w as usize * COMPONENTS;
            let dest_row = &mut out[dest_start..dest_start + row_bytes];
            for (pixel, &col) in dest_row.chunks_exact_mut(COMPONENTS).zip(&columns) {
                pixel.copy_from_slice(&src[src_start + col..src_start + col + COMPONENTS]);
            }
            last_src_row = Some(src_row);
        }
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * COMPONENTS
}
