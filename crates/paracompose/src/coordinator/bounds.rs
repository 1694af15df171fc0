//! Bounds of the visible drawables across all processes.

use paracompose_core::records::{receive_record, send_record, BoundsInfo, ViewportId};
use paracompose_core::{Bounds, MessageTag, RenderSurface, Result, Role, Viewport};

use super::{lock_surface, RenderCoordinator};

/// Visible bounds of viewport `index`, falling back to the first viewport
/// for an unknown index.
fn local_visible_bounds(surface: &dyn RenderSurface, index: usize) -> Bounds {
    let viewports = surface.viewports();
    match viewports.get(index) {
        Some(viewport) => viewport.visible_bounds(),
        None => {
            log::warn!("no viewport {index}; using the first viewport instead");
            viewports.first().map_or(Bounds::EMPTY, Viewport::visible_bounds)
        }
    }
}

impl RenderCoordinator {
    /// Unions the visible drawable bounds of viewport `viewport_index` over
    /// every process. Root only.
    ///
    /// The result is [`Bounds::EMPTY`] if nothing is visible anywhere.
    pub fn compute_visible_prop_bounds(&mut self, viewport_index: usize) -> Result<Bounds> {
        let channel = self.require_role("compute_visible_prop_bounds", Role::Root)?;
        let surface = self.require_surface()?;
        let satellites = channel.satellites_of(self.options.root_process_id);

        let request = ViewportId {
            index: viewport_index as i32,
        };
        for &dest in &satellites {
            channel.trigger_rmi(dest, MessageTag::ComputeBoundsRmi, &[])?;
            send_record(&*channel, &request, dest, MessageTag::RenId)?;
        }

        let mut bounds = local_visible_bounds(&*lock_surface(&surface)?, viewport_index);
        for &source in &satellites {
            let reply: BoundsInfo = receive_record(&*channel, source, MessageTag::Bounds)?;
            let remote = Bounds::from(reply);
            if remote.is_valid() {
                bounds = bounds.union(&remote);
            }
        }
        log::debug!("visible bounds of viewport {viewport_index}: {bounds:?}");
        Ok(bounds)
    }

    /// Answers a bounds query from `source`.
    pub(crate) fn handle_compute_bounds_rmi(&mut self, source: usize) -> Result<()> {
        let channel = self.require_channel()?;
        let request: ViewportId = receive_record(&*channel, source, MessageTag::RenId)?;
        let index = usize::try_from(request.index).unwrap_or(usize::MAX);
        let bounds = match &self.surface {
            Some(surface) => local_visible_bounds(&*lock_surface(surface)?, index),
            None => {
                log::warn!("bounds requested without a surface");
                Bounds::EMPTY
            }
        };
        send_record(&*channel, &BoundsInfo::from(bounds), source, MessageTag::Bounds)?;
        Ok(())
    }
}
