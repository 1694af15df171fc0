//! Fixed-layout records exchanged by the render protocol.
//!
//! Records are `#[repr(C)]` plain-old-data sent as raw native-endian bytes.
//! There is no header: a receiver must ask for the same record type, from the
//! same source, in the same order the sender produced them.

use bytemuck::{Pod, Zeroable};
use glam::{DVec2, DVec3, DVec4};

use crate::channel::{MessageTag, ProcessChannel};
use crate::error::ChannelResult;
use crate::surface::{Bounds, Light, LightKind, Viewport};

/// Window-level integer state.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct WindowInfoInt {
    pub full_size: [i32; 2],
    pub reduced_size: [i32; 2],
    pub number_of_viewports: i32,
    pub image_reduction_factor: i32,
    pub use_compositing: i32,
}

/// Window-level floating-point state.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct WindowInfoFloat {
    pub desired_update_rate: f64,
}

/// Per-viewport integer state.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ViewportInfoInt {
    pub number_of_lights: i32,
}

/// Per-viewport rectangle, camera and background.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ViewportInfoFloat {
    pub viewport: [f64; 4],
    pub camera_position: [f64; 3],
    pub camera_focal_point: [f64; 3],
    pub camera_view_up: [f64; 3],
    pub camera_clipping_range: [f64; 2],
    pub background: [f64; 3],
    pub camera_parallel_scale: f64,
    pub camera_view_angle: f64,
}

impl ViewportInfoFloat {
    /// Captures the synchronized state of `viewport`.
    #[must_use]
    pub fn capture(viewport: &Viewport) -> Self {
        let camera = &viewport.camera;
        Self {
            viewport: viewport.rect.to_array(),
            camera_position: camera.position.to_array(),
            camera_focal_point: camera.focal_point.to_array(),
            camera_view_up: camera.view_up.to_array(),
            camera_clipping_range: camera.clipping_range.to_array(),
            background: viewport.background.to_array(),
            camera_parallel_scale: camera.parallel_scale,
            camera_view_angle: camera.view_angle,
        }
    }

    /// Applies the record to `viewport`, leaving lights and drawables alone.
    pub fn apply(&self, viewport: &mut Viewport) {
        viewport.rect = DVec4::from_array(self.viewport);
        viewport.background = DVec3::from_array(self.background);
        let camera = &mut viewport.camera;
        camera.position = DVec3::from_array(self.camera_position);
        camera.focal_point = DVec3::from_array(self.camera_focal_point);
        camera.view_up = DVec3::from_array(self.camera_view_up);
        camera.clipping_range = DVec2::from_array(self.camera_clipping_range);
        camera.parallel_scale = self.camera_parallel_scale;
        camera.view_angle = self.camera_view_angle;
    }
}

/// Per-light state.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct LightInfo {
    pub position: [f64; 3],
    pub focal_point: [f64; 3],
    pub light_type: f64,
}

impl LightInfo {
    #[must_use]
    pub fn capture(light: &Light) -> Self {
        Self {
            position: light.position.to_array(),
            focal_point: light.focal_point.to_array(),
            light_type: light.kind.to_f64(),
        }
    }

    /// Copies the record into `light`.
    pub fn apply(&self, light: &mut Light) {
        light.position = DVec3::from_array(self.position);
        light.focal_point = DVec3::from_array(self.focal_point);
        light.kind = LightKind::from_f64(self.light_type);
    }
}

/// Viewport index of a bounds query.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ViewportId {
    pub index: i32,
}

/// Bounds reply, `[xmin, xmax, ymin, ymax, zmin, zmax]`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BoundsInfo {
    pub bounds: [f64; 6],
}

impl From<Bounds> for BoundsInfo {
    fn from(bounds: Bounds) -> Self {
        Self {
            bounds: bounds.to_array(),
        }
    }
}

impl From<BoundsInfo> for Bounds {
    fn from(info: BoundsInfo) -> Self {
        Bounds::from_array(info.bounds)
    }
}

/// Sends one record.
pub fn send_record<T: Pod>(
    channel: &dyn ProcessChannel,
    record: &T,
    dest: usize,
    tag: MessageTag,
) -> ChannelResult<()> {
    log::trace!("send {tag:?} ({} bytes) to {dest}", std::mem::size_of::<T>());
    channel.send(bytemuck::bytes_of(record), dest, tag)
}

/// Blocks for one record of type `T` from `source`.
pub fn receive_record<T: Pod>(
    channel: &dyn ProcessChannel,
    source: usize,
    tag: MessageTag,
) -> ChannelResult<T> {
    let mut record = T::zeroed();
    channel.receive(bytemuck::bytes_of_mut(&mut record), source, tag)?;
    log::trace!("received {tag:?} from {source}");
    Ok(record)
}
