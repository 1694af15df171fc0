//! Software render surface backed by in-memory front and back buffers.

use glam::DVec3;
use paracompose_core::image_buffer::ImageBuffer;
use paracompose_core::surface::{RenderEvent, RenderObserver, RenderSurface, Viewport};

/// Converts a `[0, 1]` color to RGB bytes.
#[must_use]
pub fn color_to_rgb(color: DVec3) -> [u8; 3] {
    let c = (color.clamp(DVec3::ZERO, DVec3::ONE) * 255.0).round();
    [c.x as u8, c.y as u8, c.z as u8]
}

/// A [`RenderSurface`] that draws each viewport as a flat fill of its
/// background color.
///
/// Single-buffered by default, so reads and writes go to the front buffer.
/// With double buffering, drawing targets the back buffer and, if buffer
/// swapping is on, the buffers are swapped before the end event fires.
#[derive(Debug)]
pub struct MemorySurface {
    size: (u32, u32),
    viewports: Vec<Viewport>,
    front: ImageBuffer,
    back: ImageBuffer,
    double_buffered: bool,
    swap_buffers: bool,
    offscreen: bool,
    desired_update_rate: f64,
    interactive_frames: u32,
    render_count: u64,
}

impl MemorySurface {
    /// Creates a single-buffered surface with no viewports.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            viewports: Vec::new(),
            front: ImageBuffer::new(width, height),
            back: ImageBuffer::new(width, height),
            double_buffered: false,
            swap_buffers: true,
            offscreen: false,
            desired_update_rate: 0.0,
            interactive_frames: 1,
            render_count: 0,
        }
    }

    /// Appends a viewport.
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewports.push(viewport);
        self
    }

    /// Renders into a back buffer instead of the front buffer.
    pub fn with_double_buffering(mut self, enabled: bool) -> Self {
        self.double_buffered = enabled;
        self
    }

    /// Swaps front and back buffers after each render.
    pub fn with_swap_buffers(mut self, enabled: bool) -> Self {
        self.swap_buffers = enabled;
        self
    }

    /// Sets the frame rate reported to the reduction controller.
    pub fn with_desired_update_rate(mut self, rate: f64) -> Self {
        self.desired_update_rate = rate;
        self
    }

    /// Number of frames [`RenderSurface::start_interactor`] renders.
    pub fn with_interactive_frames(mut self, frames: u32) -> Self {
        self.interactive_frames = frames;
        self
    }

    /// Adds a viewport after construction.
    pub fn add_viewport(&mut self, viewport: Viewport) {
        self.viewports.push(viewport);
    }

    /// The buffer currently shown.
    pub fn front_buffer(&self) -> &ImageBuffer {
        &self.front
    }

    /// The back buffer, only drawn into when double-buffered.
    pub fn back_buffer(&self) -> &ImageBuffer {
        &self.back
    }

    /// Whether rendering was switched to offscreen mode.
    pub fn is_offscreen(&self) -> bool {
        self.offscreen
    }

    /// Number of completed renders.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    fn draw(&mut self) {
        let (width, height) = self.size;
        let target = if self.double_buffered {
            &mut self.back
        } else {
            &mut self.front
        };
        target.resize(width, height);
        target.pixels_mut().fill(0);

        for viewport in &self.viewports {
            let rgb = color_to_rgb(viewport.background);
            let to_px = |v: f64, extent: u32| {
                ((v.clamp(0.0, 1.0) * f64::from(extent)).round() as u32).min(extent)
            };
            let (x0, x1) = (to_px(viewport.rect.x, width), to_px(viewport.rect.z, width));
            let (y0, y1) = (to_px(viewport.rect.y, height), to_px(viewport.rect.w, height));
            if x0 >= x1 || y0 >= y1 {
                continue;
            }
            let row: Vec<u8> = rgb
                .iter()
                .copied()
                .cycle()
                .take((x1 - x0) as usize * 3)
                .collect();
            let data = row.repeat((y1 - y0) as usize);
            if let Err(e) = target.write_region(x0, y0, x1 - 1, y1 - 1, &data) {
                log::error!("failed to fill viewport: {e}");
            }
        }

        if self.double_buffered && self.swap_buffers {
            std::mem::swap(&mut self.front, &mut self.back);
        }
    }

    fn buffer(&self, front: bool) -> &ImageBuffer {
        if front || !self.double_buffered {
            &self.front
        } else {
            &self.back
        }
    }
}

impl RenderSurface for MemorySurface {
    fn pixel_size(&self) -> (u32, u32) {
        self.size
    }

    fn set_pixel_size(&mut self, width: u32, height: u32) {
        if self.size == (width, height) {
            return;
        }
        self.size = (width, height);
        self.front.resize(width, height);
        self.back.resize(width, height);
    }

    fn viewports(&self) -> &[Viewport] {
        &self.viewports
    }

    fn viewports_mut(&mut self) -> &mut [Viewport] {
        &mut self.viewports
    }

    fn read_pixels(&self, x1: u32, y1: u32, x2: u32, y2: u32, front_buffer: bool) -> Vec<u8> {
        self.buffer(front_buffer)
            .region(x1, y1, x2, y2)
            .unwrap_or_default()
    }

    fn write_pixels(&mut self, x1: u32, y1: u32, x2: u32, y2: u32, data: &[u8], front_buffer: bool) {
        let target = if front_buffer || !self.double_buffered {
            &mut self.front
        } else {
            &mut self.back
        };
        if let Err(e) = target.write_region(x1, y1, x2, y2, data) {
            log::error!("write_pixels failed: {e}");
        }
    }

    fn desired_update_rate(&self) -> f64 {
        self.desired_update_rate
    }

    fn set_desired_update_rate(&mut self, rate: f64) {
        self.desired_update_rate = rate;
    }

    fn set_offscreen(&mut self, offscreen: bool) {
        self.offscreen = offscreen;
    }

    fn last_render_in_front_buffer(&self) -> bool {
        !self.double_buffered || self.swap_buffers
    }

    fn is_double_buffered(&self) -> bool {
        self.double_buffered
    }

    fn render(&mut self, observer: &mut dyn RenderObserver) {
        observer.on_render_event(RenderEvent::Start, self);
        self.draw();
        observer.on_render_event(RenderEvent::End, self);
        self.render_count += 1;
    }

    fn start_interactor(&mut self, observer: &mut dyn RenderObserver) {
        for _ in 0..self.interactive_frames {
            self.render(observer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec4;
    use paracompose_core::surface::NoObserver;

    fn halves() -> MemorySurface {
        MemorySurface::new(8, 4)
            .with_viewport(
                Viewport::new(DVec4::new(0.0, 0.0, 0.5, 1.0)).with_background(DVec3::X),
            )
            .with_viewport(
                Viewport::new(DVec4::new(0.5, 0.0, 1.0, 1.0)).with_background(DVec3::Z),
            )
    }

    #[test]
    fn test_color_to_rgb() {
        assert_eq!(color_to_rgb(DVec3::new(1.0, 0.5, -1.0)), [255, 128, 0]);
    }

    #[test]
    fn test_render_fills_viewports() {
        let mut surface = halves();
        surface.render(&mut NoObserver);
        assert_eq!(surface.render_count(), 1);
        let front = surface.front_buffer();
        assert_eq!(front.pixel(0, 0), [255, 0, 0]);
        assert_eq!(front.pixel(3, 3), [255, 0, 0]);
        assert_eq!(front.pixel(4, 0), [0, 0, 255]);
        assert_eq!(front.pixel(7, 3), [0, 0, 255]);
    }

    #[test]
    fn test_shrunk_viewport_leaves_rest_black() {
        let mut surface = MemorySurface::new(8, 8).with_viewport(
            Viewport::new(DVec4::new(0.0, 0.0, 0.25, 0.25)).with_background(DVec3::ONE),
        );
        surface.render(&mut NoObserver);
        assert_eq!(surface.read_pixels(0, 0, 1, 1, true), vec![255; 12]);
        assert_eq!(surface.front_buffer().pixel(2, 2), [0, 0, 0]);
    }

    #[test]
    fn test_double_buffer_swap() {
        let mut surface = halves().with_double_buffering(true);
        surface.render(&mut NoObserver);
        assert!(surface.last_render_in_front_buffer());
        assert_eq!(surface.front_buffer().pixel(0, 0), [255, 0, 0]);
        assert_eq!(surface.back_buffer().pixel(0, 0), [0, 0, 0]);

        let mut surface = halves()
            .with_double_buffering(true)
            .with_swap_buffers(false);
        surface.render(&mut NoObserver);
        assert!(!surface.last_render_in_front_buffer());
        assert_eq!(surface.read_pixels(0, 0, 0, 0, false), vec![255, 0, 0]);
        assert_eq!(surface.read_pixels(0, 0, 0, 0, true), vec![0, 0, 0]);
    }

    #[test]
    fn test_events_bracket_drawing() {
        struct Probe(Vec<(RenderEvent, [u8; 3])>);
        impl RenderObserver for Probe {
            fn on_render_event(&mut self, event: RenderEvent, surface: &mut dyn RenderSurface) {
                let px = surface.read_pixels(0, 0, 0, 0, true);
                self.0.push((event, [px[0], px[1], px[2]]));
            }
        }

        let mut surface = halves();
        let mut probe = Probe(Vec::new());
        surface.render(&mut probe);
        assert_eq!(
            probe.0,
            vec![(RenderEvent::Start, [0, 0, 0]), (RenderEvent::End, [255, 0, 0])]
        );
    }

    #[test]
    fn test_resize_and_out_of_range_read() {
        let mut surface = MemorySurface::new(4, 4);
        surface.set_pixel_size(10, 6);
        assert_eq!(surface.pixel_size(), (10, 6));
        assert_eq!(surface.front_buffer().size(), (10, 6));
        assert!(surface.read_pixels(0, 0, 10, 0, true).is_empty());
    }
}
