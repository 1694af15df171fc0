//! Per-cycle image state: full and reduced images, freshness and timing.

use std::time::Instant;

use crate::error::{ParacomposeError, Result};
use crate::image_buffer::ImageBuffer;
use crate::surface::RenderSurface;

/// Images produced during one render cycle.
///
/// The freshness flags are cleared by [`FrameImages::begin_cycle`] and set
/// the first time the corresponding image is computed, so each read, magnify
/// or write-back happens at most once per cycle.
#[derive(Debug, Clone)]
pub struct FrameImages {
    full_image: ImageBuffer,
    reduced_image: ImageBuffer,
    full_size: (u32, u32),
    reduced_size: (u32, u32),
    reduction_factor: u32,
    full_image_fresh: bool,
    reduced_image_fresh: bool,
    surface_image_written: bool,
    cycle_seconds: f64,
    compositing_seconds: f64,
}

impl Default for FrameImages {
    fn default() -> Self {
        Self {
            full_image: ImageBuffer::default(),
            reduced_image: ImageBuffer::default(),
            full_size: (0, 0),
            reduced_size: (0, 0),
            reduction_factor: 1,
            full_image_fresh: false,
            reduced_image_fresh: false,
            surface_image_written: false,
            cycle_seconds: 0.0,
            compositing_seconds: 0.0,
        }
    }
}

impl FrameImages {
    /// Creates empty frame state at factor 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the freshness flags and breaks reduced/full aliasing.
    pub fn begin_cycle(&mut self) {
        self.full_image_fresh = false;
        self.reduced_image_fresh = false;
        self.surface_image_written = false;
        if self.reduced_image.shares_storage(&self.full_image) {
            self.reduced_image.release_shared_storage();
        }
    }

    /// Sets the full size and derives the reduced size by floor division.
    pub fn set_sizes(&mut self, full_size: (u32, u32), reduction_factor: u32) {
        let factor = reduction_factor.max(1);
        self.reduction_factor = factor;
        self.full_size = full_size;
        self.reduced_size = (full_size.0 / factor, full_size.1 / factor);
    }

    /// Sets sizes received from the root verbatim.
    pub fn set_received_sizes(
        &mut self,
        full_size: (u32, u32),
        reduced_size: (u32, u32),
        reduction_factor: u32,
    ) {
        self.reduction_factor = reduction_factor.max(1);
        self.full_size = full_size;
        self.reduced_size = reduced_size;
    }

    /// Full window size for this cycle.
    pub fn full_size(&self) -> (u32, u32) {
        self.full_size
    }

    /// Reduced render size for this cycle.
    pub fn reduced_size(&self) -> (u32, u32) {
        self.reduced_size
    }

    /// Reduction factor in effect for this cycle.
    pub fn reduction_factor(&self) -> u32 {
        self.reduction_factor
    }

    /// The full-resolution image.
    pub fn full_image(&self) -> &ImageBuffer {
        &self.full_image
    }

    /// The reduced-resolution image.
    pub fn reduced_image(&self) -> &ImageBuffer {
        &self.reduced_image
    }

    /// Whether the full image was computed this cycle.
    pub fn is_full_image_fresh(&self) -> bool {
        self.full_image_fresh
    }

    /// Whether the reduced image was read this cycle.
    pub fn is_reduced_image_fresh(&self) -> bool {
        self.reduced_image_fresh
    }

    /// Whether the final image was written back this cycle.
    pub fn is_surface_image_written(&self) -> bool {
        self.surface_image_written
    }

    /// Whether the reduced image currently aliases the full image.
    pub fn images_shared(&self) -> bool {
        self.reduced_image.shares_storage(&self.full_image)
    }

    /// Installs a composited reduced image produced by a render processor.
    pub fn set_reduced_image(&mut self, image: ImageBuffer) -> Result<()> {
        if image.size() != self.reduced_size {
            return Err(ParacomposeError::SizeMismatch {
                expected: self.reduced_size.0 as usize * self.reduced_size.1 as usize,
                actual: image.width() as usize * image.height() as usize,
            });
        }
        self.reduced_image = image;
        self.reduced_image_fresh = true;
        self.full_image_fresh = false;
        Ok(())
    }

    /// Duration of the current or last cycle, in seconds.
    pub fn cycle_seconds(&self) -> f64 {
        self.cycle_seconds
    }

    /// Records the duration of the current cycle.
    pub fn set_cycle_seconds(&mut self, seconds: f64) {
        self.cycle_seconds = seconds;
    }

    /// Time spent reading and compositing pixels this cycle, in seconds.
    pub fn compositing_seconds(&self) -> f64 {
        self.compositing_seconds
    }

    /// Zeroes the compositing time at the start of a cycle.
    pub fn reset_compositing_seconds(&mut self) {
        self.compositing_seconds = 0.0;
    }

    /// Adds compositing time measured by a render processor.
    pub fn add_compositing_seconds(&mut self, seconds: f64) {
        self.compositing_seconds += seconds;
    }

    /// Reads the reduced image from the surface, once per cycle.
    ///
    /// At factor 1 the full image is read instead and the reduced image is
    /// made to alias it.
    pub fn read_reduced_image(&mut self, surface: &dyn RenderSurface) -> Result<()> {
        if self.reduced_image_fresh {
            return Ok(());
        }
        let start = Instant::now();
        let front = surface.last_render_in_front_buffer();

        if self.reduction_factor > 1 {
            let (w, h) = self.reduced_size;
            if w == 0 || h == 0 {
                log::warn!("reduced image is empty at factor {}", self.reduction_factor);
                self.reduced_image = ImageBuffer::default();
            } else {
                let data = surface.read_pixels(0, 0, w - 1, h - 1, front);
                self.reduced_image.assign(w, h, data)?;
            }
        } else {
            let (w, h) = self.full_size;
            if w == 0 || h == 0 {
                self.full_image = ImageBuffer::default();
            } else {
                let data = surface.read_pixels(0, 0, w - 1, h - 1, front);
                self.full_image.assign(w, h, data)?;
            }
            self.reduced_image.share_from(&self.full_image);
            self.full_image_fresh = true;
        }
        self.reduced_image_fresh = true;
        self.compositing_seconds += start.elapsed().as_secs_f64();
        Ok(())
    }

    /// Brings the full image up to date, magnifying the reduced image if
    /// the two are distinct.
    ///
    /// Time spent here is billed to the cycle, not to compositing.
    pub fn magnify_reduced_image(&mut self, surface: &dyn RenderSurface) -> Result<()> {
        if self.full_image_fresh {
            return Ok(());
        }
        self.read_reduced_image(surface)?;
        if self.full_image_fresh {
            return Ok(());
        }

        let start = Instant::now();
        if !self.images_shared() {
            let (w, h) = self.full_size;
            self.reduced_image
                .magnify_into(&mut self.full_image, w, h, true);
        }
        self.full_image_fresh = true;
        self.cycle_seconds += start.elapsed().as_secs_f64();
        Ok(())
    }

    /// Writes the final image back into the surface, once per cycle.
    pub fn write_final_image(
        &mut self,
        surface: &mut dyn RenderSurface,
        write_back: bool,
        magnify: bool,
    ) -> Result<()> {
        if self.surface_image_written || !write_back {
            return Ok(());
        }
        let front = !surface.is_double_buffered();

        if magnify && self.reduction_factor > 1 {
            self.magnify_reduced_image(&*surface)?;
            let (w, h) = self.full_image.size();
            if w > 0 && h > 0 {
                surface.write_pixels(0, 0, w - 1, h - 1, self.full_image.pixels(), front);
            }
        } else if self.reduced_image_fresh {
            let (w, h) = self.reduced_image.size();
            if w > 0 && h > 0 {
                surface.write_pixels(0, 0, w - 1, h - 1, self.reduced_image.pixels(), front);
            }
        }
        self.surface_image_written = true;
        Ok(())
    }

    /// Copies a rectangle of the full image; the image must be fresh.
    pub fn full_pixels(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Vec<u8>> {
        check_region(self.full_size, x1, y1, x2, y2)?;
        self.full_image.region(x1, y1, x2, y2)
    }

    /// Copies a rectangle of the reduced image; the image must be fresh.
    pub fn reduced_pixels(&self, x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Vec<u8>> {
        check_region(self.reduced_size, x1, y1, x2, y2)?;
        self.reduced_image.region(x1, y1, x2, y2)
    }
}

fn check_region(size: (u32, u32), x1: u32, y1: u32, x2: u32, y2: u32) -> Result<()> {
    let (x1, x2) = (x1.min(x2), x1.max(x2));
    let (y1, y2) = (y1.min(y2), y1.max(y2));
    if x2 >= size.0 || y2 >= size.1 {
        log::error!(
            "requested pixels ({x1}, {y1})-({x2}, {y2}) outside of {}x{} image",
            size.0,
            size.1
        );
        return Err(ParacomposeError::RegionOutOfBounds {
            x1,
            y1,
            x2,
            y2,
            width: size.0,
            height: size.1,
        });
    }
    Ok(())
}
