//! Attachment, observer wiring and the process main loops.

use std::sync::Arc;

use paracompose_core::{MessageTag, ParacomposeError, ProcessChannel, Result, Role, SharedSurface};

use super::{lock_surface, RenderCoordinator};

impl RenderCoordinator {
    /// Attaches the render surface, or detaches it with `None`.
    ///
    /// Once a surface is attached it cannot be swapped for a different one;
    /// reattaching the same surface is a no-op.
    pub fn attach_surface(&mut self, surface: Option<SharedSurface>) -> Result<()> {
        match (&self.surface, surface) {
            (Some(current), Some(new)) => {
                if Arc::ptr_eq(current, &new) {
                    return Ok(());
                }
                log::error!("a render surface is already attached");
                Err(ParacomposeError::SurfaceAlreadyAttached)
            }
            (None, Some(new)) => {
                self.surface = Some(new);
                self.rewire_observers();
                Ok(())
            }
            (_, None) => {
                self.surface = None;
                self.rewire_observers();
                Ok(())
            }
        }
    }

    /// Attaches the process channel, or detaches it with `None`.
    ///
    /// Changing the channel may change this process's role, so the surface
    /// observers are detached and rewired for the new one.
    pub fn attach_channel(&mut self, channel: Option<Arc<dyn ProcessChannel>>) -> Result<()> {
        let unchanged = match (&self.channel, &channel) {
            (Some(current), Some(new)) => Arc::ptr_eq(current, new),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return Ok(());
        }

        if let Some(role) = self.wiring.take() {
            log::debug!("detached {role:?} observers for channel change");
        }
        self.channel = channel;
        self.rewire_observers();
        Ok(())
    }

    /// Recomputes which role the surface events are dispatched for.
    ///
    /// Events are only handled while both a surface and a channel are
    /// attached.
    pub fn rewire_observers(&mut self) {
        let role = match (&self.surface, &self.channel) {
            (Some(_), Some(channel)) => Some(Role::for_process(
                channel.local_process_id(),
                self.options.root_process_id,
            )),
            _ => None,
        };
        if role != self.wiring {
            log::debug!("observers rewired: {:?} -> {role:?}", self.wiring);
        }
        self.wiring = role;
    }

    /// Role the surface events are currently dispatched for.
    pub fn observed_role(&self) -> Option<Role> {
        self.wiring
    }

    /// Assigns each partitionable drawable this process's piece.
    pub fn initialize_local_piece_assignment(&mut self) -> Result<()> {
        let channel = self.require_channel()?;
        let surface = self.require_surface()?;
        let piece = channel.local_process_id();
        let number_of_pieces = channel.process_count();

        let mut guard = lock_surface(&surface)?;
        let mut assigned = 0;
        for viewport in guard.viewports_mut() {
            for drawable in &mut viewport.drawables {
                if let Some(partitionable) = drawable.as_partitionable() {
                    partitionable.set_piece(piece, number_of_pieces);
                    assigned += 1;
                }
            }
        }
        log::debug!("assigned piece {piece}/{number_of_pieces} to {assigned} drawables");
        Ok(())
    }

    /// Renders satellites offscreen, and the root too unless it writes
    /// images back for display.
    pub fn enable_offscreen_if_satellite(&mut self) -> Result<()> {
        let channel = self.require_channel()?;
        let surface = self.require_surface()?;
        let role = Role::for_process(channel.local_process_id(), self.options.root_process_id);
        let offscreen = role == Role::Satellite || !self.options.write_back_images;
        lock_surface(&surface)?.set_offscreen(offscreen);
        Ok(())
    }

    /// Runs the interactive loop on the root, then releases the satellites;
    /// on a satellite, services remote methods until released.
    pub fn start_interactive(&mut self) -> Result<()> {
        let channel = self.require_channel()?;
        match Role::for_process(channel.local_process_id(), self.options.root_process_id) {
            Role::Root => {
                let surface = self.require_surface()?;
                {
                    let mut guard = lock_surface(&surface)?;
                    guard.start_interactor(self);
                }
                self.stop_service_loop()
            }
            Role::Satellite => self.service_loop(),
        }
    }

    /// Blocks servicing render and bounds requests until the root sends a
    /// break. Satellite only.
    pub fn service_loop(&mut self) -> Result<()> {
        let channel = self.require_role("service_loop", Role::Satellite)?;
        log::debug!("process {} entering service loop", channel.local_process_id());
        channel.process_rmis(self)?;
        log::debug!("process {} left service loop", channel.local_process_id());
        Ok(())
    }

    /// Sends a break to every satellite. Root only.
    pub fn stop_service_loop(&mut self) -> Result<()> {
        let channel = self.require_role("stop_service_loop", Role::Root)?;
        for dest in channel.satellites_of(self.options.root_process_id) {
            channel.trigger_rmi(dest, MessageTag::Break, &[])?;
        }
        Ok(())
    }
}
