//! Render-processor extension point.
//!
//! A [`RenderProcessor`] runs inside every cycle: once after the scene state
//! is synchronized and before the surface draws, and once after the surface
//! has drawn. The post hook is where images are gathered and composited;
//! when it returns, the frame's reduced (or full) image holds this process's
//! final pixels.

use crate::channel::{ProcessChannel, Role};
use crate::error::Result;
use crate::frame::FrameImages;
use crate::surface::RenderSurface;

/// Everything a processor may touch during a cycle.
pub struct FrameContext<'a> {
    pub role: Role,
    pub root_process_id: usize,
    pub images: &'a mut FrameImages,
    pub surface: &'a mut dyn RenderSurface,
    pub channel: &'a dyn ProcessChannel,
}

/// Hooks called around the surface's own drawing.
pub trait RenderProcessor: Send {
    /// Called at the end of the pre-render synchronization.
    fn pre_render_processing(&mut self, _frame: &mut FrameContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called after drawing, only when compositing is enabled.
    fn post_render_processing(&mut self, frame: &mut FrameContext<'_>) -> Result<()>;
}

/// Reads back each process's own rendering without combining images
/// across processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageReadback;

impl RenderProcessor for ImageReadback {
    fn post_render_processing(&mut self, frame: &mut FrameContext<'_>) -> Result<()> {
        frame.images.read_reduced_image(&*frame.surface)
    }
}
