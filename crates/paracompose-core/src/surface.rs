//! Render surface contract and the scene state synchronized across processes.
//!
//! A [`RenderSurface`] owns a pixel buffer and an ordered list of
//! [`Viewport`]s. Each viewport carries a normalized rectangle, a camera,
//! a background color and lights. Every process holds its own copy; the
//! coordinator keeps them consistent by copying values over the channel.

use std::fmt;
use std::sync::{Arc, Mutex};

use glam::{DVec2, DVec3, DVec4};

/// Events a surface fires around each render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEvent {
    /// Fired before any viewport is drawn.
    Start,
    /// Fired after drawing and the buffer swap.
    End,
}

/// Receives render events from a surface.
pub trait RenderObserver {
    /// Called by the surface with itself as `surface`.
    fn on_render_event(&mut self, event: RenderEvent, surface: &mut dyn RenderSurface);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObserver;

impl RenderObserver for NoObserver {
    fn on_render_event(&mut self, _event: RenderEvent, _surface: &mut dyn RenderSurface) {}
}

/// The thing being rendered.
///
/// Pixel rectangles are inclusive `(x1, y1)-(x2, y2)` with the origin at the
/// bottom-left; pixel data is tightly packed RGB, row by row.
pub trait RenderSurface: Send {
    /// Current size in pixels.
    fn pixel_size(&self) -> (u32, u32);

    /// Resizes the surface.
    fn set_pixel_size(&mut self, width: u32, height: u32);

    /// Sub-viewports in drawing order.
    fn viewports(&self) -> &[Viewport];

    /// Mutable access to the sub-viewports.
    fn viewports_mut(&mut self) -> &mut [Viewport];

    /// Reads RGB pixels from the front or back buffer.
    fn read_pixels(&self, x1: u32, y1: u32, x2: u32, y2: u32, front_buffer: bool) -> Vec<u8>;

    /// Writes RGB pixels into the front or back buffer.
    fn write_pixels(&mut self, x1: u32, y1: u32, x2: u32, y2: u32, data: &[u8], front_buffer: bool);

    /// Requested frames per second; `0.0` means unbounded time.
    fn desired_update_rate(&self) -> f64;

    /// Sets the requested frames per second.
    fn set_desired_update_rate(&mut self, rate: f64);

    /// Switches between on-screen and offscreen rendering.
    fn set_offscreen(&mut self, offscreen: bool);

    /// Whether the last render ended up in the front buffer.
    fn last_render_in_front_buffer(&self) -> bool;

    /// Whether the surface has separate front and back buffers.
    fn is_double_buffered(&self) -> bool;

    /// Renders one frame, firing [`RenderEvent::Start`] and
    /// [`RenderEvent::End`] on `observer`.
    fn render(&mut self, observer: &mut dyn RenderObserver);

    /// Runs the surface's interactive loop, rendering through `observer`
    /// until the user ends the session.
    fn start_interactor(&mut self, observer: &mut dyn RenderObserver) {
        self.render(observer);
    }
}

/// Reference-counted handle the coordinator keeps on an attached surface.
pub type SharedSurface = Arc<Mutex<dyn RenderSurface>>;

/// Wraps a surface into a [`SharedSurface`].
pub fn share_surface<S: RenderSurface + 'static>(surface: S) -> SharedSurface {
    Arc::new(Mutex::new(surface))
}

/// Camera state that is synchronized every cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub position: DVec3,
    pub focal_point: DVec3,
    pub view_up: DVec3,
    /// Near and far clipping distances.
    pub clipping_range: DVec2,
    /// Off-axis / stereo window offset; cleared before synchronization.
    pub window_center: DVec2,
    pub parallel_scale: f64,
    /// Vertical view angle in degrees.
    pub view_angle: f64,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            position: DVec3::new(0.0, 0.0, 1.0),
            focal_point: DVec3::ZERO,
            view_up: DVec3::Y,
            clipping_range: DVec2::new(0.01, 1000.01),
            window_center: DVec2::ZERO,
            parallel_scale: 1.0,
            view_angle: 30.0,
        }
    }
}

/// How a light is attached to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightKind {
    /// Positioned at the camera, following it.
    Headlight,
    /// Fixed relative to the camera.
    CameraLight,
    /// Fixed in world space.
    #[default]
    SceneLight,
}

impl LightKind {
    /// Encodes the kind for a floating-point record.
    #[must_use]
    pub fn to_f64(self) -> f64 {
        match self {
            LightKind::Headlight => 1.0,
            LightKind::CameraLight => 2.0,
            LightKind::SceneLight => 3.0,
        }
    }

    /// Decodes a kind; unknown values become [`LightKind::SceneLight`].
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub fn from_f64(value: f64) -> Self {
        match value.round() as i64 {
            1 => LightKind::Headlight,
            2 => LightKind::CameraLight,
            3 => LightKind::SceneLight,
            _ => LightKind::SceneLight,
        }
    }
}

/// A light owned by a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Light {
    pub position: DVec3,
    pub focal_point: DVec3,
    pub kind: LightKind,
}

impl Light {
    /// Creates a scene light.
    #[must_use]
    pub fn new(position: DVec3, focal_point: DVec3) -> Self {
        Self {
            position,
            focal_point,
            kind: LightKind::SceneLight,
        }
    }
}

/// Axis-aligned bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: DVec3,
    pub max: DVec3,
}

impl Bounds {
    /// Bounds that contain nothing; the identity for [`Bounds::union`].
    pub const EMPTY: Bounds = Bounds {
        min: DVec3::splat(f64::MAX),
        max: DVec3::splat(-f64::MAX),
    };

    /// Creates bounds from two corners.
    #[must_use]
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Whether the bounds enclose at least one point.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// Smallest bounds containing both.
    #[must_use]
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// `[xmin, xmax, ymin, ymax, zmin, zmax]`.
    #[must_use]
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.min.x, self.max.x, self.min.y, self.max.y, self.min.z, self.max.z,
        ]
    }

    /// Inverse of [`Bounds::to_array`].
    #[must_use]
    pub fn from_array(b: [f64; 6]) -> Self {
        Self {
            min: DVec3::new(b[0], b[2], b[4]),
            max: DVec3::new(b[1], b[3], b[5]),
        }
    }
}

/// Capability of drawables whose data can be split across processes.
pub trait Partitionable {
    /// Requests piece `piece` of `number_of_pieces`.
    fn set_piece(&mut self, piece: usize, number_of_pieces: usize);
}

/// Geometry drawn inside a viewport.
pub trait Drawable: Send {
    /// Whether the drawable is currently shown.
    fn is_visible(&self) -> bool;

    /// World-space bounds, or `None` if the drawable has no extent.
    fn bounds(&self) -> Option<Bounds>;

    /// Returns the data-parallel partitioning capability, if supported.
    fn as_partitionable(&mut self) -> Option<&mut dyn Partitionable> {
        None
    }
}

/// A sub-viewport ("renderer") of a surface.
pub struct Viewport {
    /// Normalized `(xmin, ymin, xmax, ymax)`.
    pub rect: DVec4,
    pub camera: CameraState,
    pub background: DVec3,
    pub lights: Vec<Light>,
    pub drawables: Vec<Box<dyn Drawable>>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DVec4::new(0.0, 0.0, 1.0, 1.0))
    }
}

impl fmt::Debug for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Viewport")
            .field("rect", &self.rect)
            .field("camera", &self.camera)
            .field("background", &self.background)
            .field("lights", &self.lights)
            .field("drawables", &self.drawables.len())
            .finish()
    }
}

impl Viewport {
    /// Creates an empty viewport covering `rect`.
    #[must_use]
    pub fn new(rect: DVec4) -> Self {
        Self {
            rect,
            camera: CameraState::default(),
            background: DVec3::ZERO,
            lights: Vec::new(),
            drawables: Vec::new(),
        }
    }

    /// Sets the background color.
    #[must_use]
    pub fn with_background(mut self, background: DVec3) -> Self {
        self.background = background;
        self
    }

    /// Appends a light.
    #[must_use]
    pub fn with_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    /// Appends a drawable.
    #[must_use]
    pub fn with_drawable(mut self, drawable: Box<dyn Drawable>) -> Self {
        self.drawables.push(drawable);
        self
    }

    /// Union of the bounds of all visible drawables.
    #[must_use]
    pub fn visible_bounds(&self) -> Bounds {
        self.drawables
            .iter()
            .filter(|d| d.is_visible())
            .filter_map(|d| d.bounds())
            .fold(Bounds::EMPTY, |acc, b| acc.union(&b))
    }

    /// Creates or removes lights until exactly `count` remain.
    ///
    /// Returns `true` if the light list had to change length.
    pub fn reconcile_light_count(&mut self, count: usize) -> bool {
        let changed = self.lights.len() != count;
        self.lights.resize_with(count, Light::default);
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Cube(Bounds, bool);

    impl Drawable for Cube {
        fn is_visible(&self) -> bool {
            self.1
        }

        fn bounds(&self) -> Option<Bounds> {
            Some(self.0)
        }
    }

    #[test]
    fn test_empty_bounds_invalid() {
        assert!(!Bounds::EMPTY.is_valid());
        let b = Bounds::new(DVec3::ZERO, DVec3::ONE);
        assert!(b.is_valid());
        assert_eq!(Bounds::EMPTY.union(&b), b);
    }

    #[test]
    fn test_bounds_array_layout() {
        let b = Bounds::new(DVec3::new(1.0, 2.0, 3.0), DVec3::new(4.0, 5.0, 6.0));
        assert_eq!(b.to_array(), [1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(Bounds::from_array(b.to_array()), b);
    }

    #[test]
    fn test_visible_bounds_skips_hidden() {
        let vp = Viewport::default()
            .with_drawable(Box::new(Cube(
                Bounds::new(DVec3::ZERO, DVec3::ONE),
                true,
            )))
            .with_drawable(Box::new(Cube(
                Bounds::new(DVec3::splat(-10.0), DVec3::ZERO),
                false,
            )));
        assert_eq!(vp.visible_bounds(), Bounds::new(DVec3::ZERO, DVec3::ONE));
    }

    #[test]
    fn test_reconcile_light_count() {
        let mut vp = Viewport::default()
            .with_light(Light::default())
            .with_light(Light::default())
            .with_light(Light::default());
        assert!(vp.reconcile_light_count(1));
        assert_eq!(vp.lights.len(), 1);
        assert!(vp.reconcile_light_count(2));
        assert_eq!(vp.lights.len(), 2);
        assert!(!vp.reconcile_light_count(2));
    }

    #[test]
    fn test_light_kind_encoding() {
        for kind in [
            LightKind::Headlight,
            LightKind::CameraLight,
            LightKind::SceneLight,
        ] {
            assert_eq!(LightKind::from_f64(kind.to_f64()), kind);
        }
        assert_eq!(LightKind::from_f64(42.0), LightKind::SceneLight);
    }
}
