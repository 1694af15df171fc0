//! Root side of the render cycle.

use std::time::Instant;

use glam::DVec2;
use paracompose_core::records::{
    send_record, LightInfo, ViewportInfoFloat, ViewportInfoInt, WindowInfoFloat, WindowInfoInt,
};
use paracompose_core::{
    FrameContext, MessageTag, ProcessChannel, ReductionSample, RenderSurface, Result, Role,
};

use super::{CycleEvent, RenderCoordinator};

impl RenderCoordinator {
    /// Starts a cycle: pushes window and viewport state to every satellite.
    ///
    /// Called on the surface's start event. Does nothing without a channel
    /// or while a cycle is already in progress.
    pub(crate) fn begin_render_cycle(&mut self, surface: &mut dyn RenderSurface) -> Result<()> {
        let Some(channel) = self.channel.clone() else {
            return Ok(());
        };
        if self.is_locked {
            return Ok(());
        }
        self.is_locked = true;
        self.frame.begin_cycle();

        if !self.options.parallel_rendering {
            self.is_locked = false;
            return Ok(());
        }

        self.notify(CycleEvent::Start);
        self.cycle_start = Some(Instant::now());

        if self.options.auto_image_reduction_factor {
            self.update_reduction_factor(surface.desired_update_rate());
        }

        let (mut width, mut height) = surface.pixel_size();
        if width == 0 || height == 0 {
            [width, height] = self.options.default_window_size;
            log::debug!("surface has zero extent, using {width}x{height}");
            surface.set_pixel_size(width, height);
        }
        self.frame.set_sizes((width, height), self.options.image_reduction_factor);
        self.shrink_viewports(surface);

        if let Err(e) = self.synchronize_satellites(&*channel, surface) {
            self.restore_viewports(surface);
            self.cycle_start = None;
            self.is_locked = false;
            return Err(e);
        }
        Ok(())
    }

    fn synchronize_satellites(
        &mut self,
        channel: &dyn ProcessChannel,
        surface: &mut dyn RenderSurface,
    ) -> Result<()> {
        let satellites = channel.satellites_of(self.options.root_process_id);
        let (full, reduced) = (self.frame.full_size(), self.frame.reduced_size());
        let factor = self.frame.reduction_factor();

        let window_int = WindowInfoInt {
            full_size: [full.0 as i32, full.1 as i32],
            reduced_size: [reduced.0 as i32, reduced.1 as i32],
            number_of_viewports: surface.viewports().len() as i32,
            image_reduction_factor: factor as i32,
            use_compositing: i32::from(self.options.compositing),
        };
        let window_float = WindowInfoFloat {
            desired_update_rate: surface.desired_update_rate(),
        };
        for &dest in &satellites {
            if self.options.render_event_propagation {
                channel.trigger_rmi(dest, MessageTag::RenderRmi, &[])?;
            }
            send_record(channel, &window_int, dest, MessageTag::WinInfoInt)?;
            send_record(channel, &window_float, dest, MessageTag::WinInfoFloat)?;
        }

        for viewport in surface.viewports_mut() {
            let info = ViewportInfoFloat::capture(viewport);
            viewport.camera.window_center = DVec2::ZERO;
            let lights = ViewportInfoInt {
                number_of_lights: viewport.lights.len() as i32,
            };
            for &dest in &satellites {
                send_record(channel, &info, dest, MessageTag::RenInfoFloat)?;
                send_record(channel, &lights, dest, MessageTag::RenInfoInt)?;
            }
            for light in &viewport.lights {
                let info = LightInfo::capture(light);
                for &dest in &satellites {
                    send_record(channel, &info, dest, MessageTag::LightInfoFloat)?;
                }
            }
        }
        log::trace!(
            "synchronized {} viewports with {} satellites",
            self.saved_viewports.len(),
            satellites.len()
        );

        let mut frame = FrameContext {
            role: Role::Root,
            root_process_id: self.options.root_process_id,
            images: &mut self.frame,
            surface,
            channel,
        };
        self.processor.pre_render_processing(&mut frame)
    }

    /// Finishes a cycle: composites, restores viewports and writes the
    /// final image back to the surface.
    pub(crate) fn end_render_cycle(&mut self, surface: &mut dyn RenderSurface) -> Result<()> {
        if !self.is_locked {
            return Ok(());
        }
        let seconds = self
            .cycle_start
            .take()
            .map_or(0.0, |start| start.elapsed().as_secs_f64());
        self.frame.set_cycle_seconds(seconds);
        self.frame.reset_compositing_seconds();

        let result = self.finish_cycle(surface);
        self.is_locked = false;
        result
    }

    fn finish_cycle(&mut self, surface: &mut dyn RenderSurface) -> Result<()> {
        if !self.options.parallel_rendering {
            return Ok(());
        }
        if !self.options.compositing {
            self.restore_viewports(surface);
            return Ok(());
        }

        let channel = self.require_channel()?;
        let processed = {
            let mut frame = FrameContext {
                role: Role::Root,
                root_process_id: self.options.root_process_id,
                images: &mut self.frame,
                surface: &mut *surface,
                channel: &*channel,
            };
            self.processor.post_render_processing(&mut frame)
        };
        self.restore_viewports(surface);
        processed?;

        self.frame.write_final_image(
            surface,
            self.options.write_back_images,
            self.options.magnify_images,
        )?;
        self.notify(CycleEvent::End);
        Ok(())
    }

    /// Saves every viewport rectangle and, when reducing, shrinks it by the
    /// reduction factor.
    fn shrink_viewports(&mut self, surface: &mut dyn RenderSurface) {
        self.saved_viewports = surface.viewports().iter().map(|v| v.rect).collect();
        let factor = self.frame.reduction_factor();
        if factor > 1 {
            let divisor = f64::from(factor);
            for viewport in surface.viewports_mut() {
                viewport.rect /= divisor;
            }
        }
    }

    /// Puts back the viewport rectangles shrunk at the start of the cycle.
    fn restore_viewports(&mut self, surface: &mut dyn RenderSurface) {
        if self.frame.reduction_factor() <= 1 {
            return;
        }
        let viewports = surface.viewports_mut();
        if viewports.len() != self.saved_viewports.len() {
            log::warn!(
                "viewport count changed during cycle ({} saved, {} now)",
                self.saved_viewports.len(),
                viewports.len()
            );
        }
        for (viewport, rect) in viewports.iter_mut().zip(&self.saved_viewports) {
            viewport.rect = *rect;
        }
    }

    /// Retunes the reduction factor from the previous cycle's timings.
    fn update_reduction_factor(&mut self, desired_update_rate: f64) {
        let (width, height) = self.frame.full_size();
        let sample = ReductionSample {
            desired_update_rate,
            full_pixel_count: u64::from(width) * u64::from(height),
            current_factor: self.options.image_reduction_factor,
            max_factor: self.options.max_image_reduction_factor,
            cycle_seconds: self.frame.cycle_seconds(),
            compositing_seconds: self.frame.compositing_seconds(),
        };
        let factor = self.controller.factor_for_update_rate(&sample);
        if factor != self.options.image_reduction_factor {
            log::debug!(
                "image reduction factor {} -> {factor}",
                self.options.image_reduction_factor
            );
        }
        self.options.image_reduction_factor = factor;
    }
}
