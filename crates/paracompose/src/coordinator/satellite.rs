//! Satellite side of the render cycle.

use std::time::Instant;

use paracompose_core::records::{
    receive_record, LightInfo, ViewportInfoFloat, ViewportInfoInt, WindowInfoFloat, WindowInfoInt,
};
use paracompose_core::{FrameContext, MessageTag, ProcessChannel, RenderSurface, Result, Role};

use super::{CycleEvent, RenderCoordinator};

fn to_size(size: [i32; 2]) -> (u32, u32) {
    (size[0].max(0) as u32, size[1].max(0) as u32)
}

impl RenderCoordinator {
    /// Renders in response to the root's render request; the surface's
    /// events then run the satellite cycle.
    pub(crate) fn handle_render_rmi(&mut self) -> Result<()> {
        self.render()
    }

    /// Receives the root's window and viewport state and applies it locally.
    pub(crate) fn satellite_begin_render(&mut self, surface: &mut dyn RenderSurface) -> Result<()> {
        let channel = self.require_channel()?;
        self.frame.begin_cycle();
        if !self.options.parallel_rendering {
            return Ok(());
        }

        self.notify(CycleEvent::Start);
        self.cycle_start = Some(Instant::now());
        let root = self.options.root_process_id;

        let window: WindowInfoInt = receive_record(&*channel, root, MessageTag::WinInfoInt)?;
        let window_float: WindowInfoFloat =
            receive_record(&*channel, root, MessageTag::WinInfoFloat)?;

        surface.set_desired_update_rate(window_float.desired_update_rate);
        self.options.compositing = window.use_compositing != 0;
        // The root's factor is authoritative, even above the local maximum.
        let factor = window.image_reduction_factor.max(1) as u32;
        self.options.image_reduction_factor = factor;
        let full = to_size(window.full_size);
        self.frame.set_received_sizes(full, to_size(window.reduced_size), factor);
        surface.set_pixel_size(full.0, full.1);

        let announced = window.number_of_viewports.max(0) as usize;
        if announced != surface.viewports().len() {
            log::warn!(
                "root announced {announced} viewports, {} exist locally",
                surface.viewports().len()
            );
        }
        for index in 0..announced {
            self.receive_viewport(&*channel, surface, index)?;
        }

        let mut frame = FrameContext {
            role: Role::Satellite,
            root_process_id: root,
            images: &mut self.frame,
            surface,
            channel: &*channel,
        };
        self.processor.pre_render_processing(&mut frame)
    }

    fn receive_viewport(
        &mut self,
        channel: &dyn ProcessChannel,
        surface: &mut dyn RenderSurface,
        index: usize,
    ) -> Result<()> {
        let root = self.options.root_process_id;
        let info: ViewportInfoFloat = receive_record(channel, root, MessageTag::RenInfoFloat)?;
        let lights: ViewportInfoInt = receive_record(channel, root, MessageTag::RenInfoInt)?;
        let count = lights.number_of_lights.max(0) as usize;

        let Some(viewport) = surface.viewports_mut().get_mut(index) else {
            // Drain the records so the stream stays aligned.
            log::error!("no local viewport {index}; discarding its state");
            for _ in 0..count {
                receive_record::<LightInfo>(channel, root, MessageTag::LightInfoFloat)?;
            }
            return Ok(());
        };

        info.apply(viewport);
        if viewport.reconcile_light_count(count) {
            log::warn!("viewport {index}: light count reconciled to {count}");
        }
        for light in &mut viewport.lights {
            let info: LightInfo = receive_record(channel, root, MessageTag::LightInfoFloat)?;
            info.apply(light);
        }
        Ok(())
    }

    /// Composites and writes the final image after the satellite has drawn.
    pub(crate) fn satellite_end_render(&mut self, surface: &mut dyn RenderSurface) -> Result<()> {
        if !self.options.parallel_rendering || !self.options.compositing {
            return Ok(());
        }
        let seconds = self
            .cycle_start
            .take()
            .map_or(0.0, |start| start.elapsed().as_secs_f64());
        self.frame.set_cycle_seconds(seconds);
        self.frame.reset_compositing_seconds();

        let channel = self.require_channel()?;
        let mut frame = FrameContext {
            role: Role::Satellite,
            root_process_id: self.options.root_process_id,
            images: &mut self.frame,
            surface: &mut *surface,
            channel: &*channel,
        };
        self.processor.post_render_processing(&mut frame)?;

        self.frame.write_final_image(
            surface,
            self.options.write_back_images,
            self.options.magnify_images,
        )?;
        self.notify(CycleEvent::End);
        Ok(())
    }
}
