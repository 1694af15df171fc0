//! The render coordinator.
//!
//! A [`RenderCoordinator`] sits between one [`RenderSurface`] and one
//! [`ProcessChannel`]. It observes the surface's render events and, depending
//! on this process's [`Role`], either drives the cycle (root) or follows it
//! (satellite).

mod bounds;
mod lifecycle;
mod root;
mod satellite;

use std::sync::{Arc, MutexGuard};
use std::time::Instant;

use glam::DVec4;
use paracompose_core::{
    CoordinatorOptions, FrameImages, ImageBuffer, ImageReadback, MessageTag, ParacomposeError,
    ProcessChannel, ReductionController, RenderEvent, RenderObserver, RenderProcessor,
    RenderSurface, Result, RmiHandler, Role, SharedSurface,
};

/// Notification fired around every synchronized cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleEvent {
    /// Scene state is about to be synchronized.
    Start,
    /// The final image has been written.
    End,
}

/// Callback registered with [`RenderCoordinator::add_cycle_listener`].
pub type CycleListener = Box<dyn FnMut(CycleEvent) + Send>;

/// Remote methods a satellite services.
const SERVICE_TAGS: [MessageTag; 2] = [MessageTag::RenderRmi, MessageTag::ComputeBoundsRmi];

/// Coordinates render cycles and images across processes.
pub struct RenderCoordinator {
    options: CoordinatorOptions,
    channel: Option<Arc<dyn ProcessChannel>>,
    surface: Option<SharedSurface>,
    /// Role the surface events are currently dispatched for.
    wiring: Option<Role>,
    is_locked: bool,
    controller: ReductionController,
    frame: FrameImages,
    saved_viewports: Vec<DVec4>,
    processor: Box<dyn RenderProcessor>,
    listeners: Vec<CycleListener>,
    cycle_start: Option<Instant>,
}

impl std::fmt::Debug for RenderCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCoordinator")
            .field("options", &self.options)
            .field("has_channel", &self.channel.is_some())
            .field("has_surface", &self.surface.is_some())
            .field("wiring", &self.wiring)
            .field("is_locked", &self.is_locked)
            .field("frame", &self.frame)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Default for RenderCoordinator {
    fn default() -> Self {
        Self {
            options: CoordinatorOptions::default(),
            channel: None,
            surface: None,
            wiring: None,
            is_locked: false,
            controller: ReductionController::new(),
            frame: FrameImages::new(),
            saved_viewports: Vec::new(),
            processor: Box::new(ImageReadback),
            listeners: Vec::new(),
            cycle_start: None,
        }
    }
}

impl RenderCoordinator {
    /// Creates a coordinator with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a coordinator from validated options.
    pub fn with_options(options: CoordinatorOptions) -> Result<Self> {
        options.validate()?;
        let mut coordinator = Self::new();
        coordinator.options = options;
        coordinator.clamp_reduction_factor();
        Ok(coordinator)
    }

    /// Current options.
    pub fn options(&self) -> &CoordinatorOptions {
        &self.options
    }

    // ========================================================================
    // Flags
    // ========================================================================

    /// Whether the protocol runs at all.
    pub fn parallel_rendering(&self) -> bool {
        self.options.parallel_rendering
    }

    /// Enables or disables the protocol.
    pub fn set_parallel_rendering(&mut self, enabled: bool) {
        self.options.parallel_rendering = enabled;
    }

    /// Whether images are gathered after each render.
    pub fn compositing(&self) -> bool {
        self.options.compositing
    }

    /// Enables or disables image gathering.
    pub fn set_compositing(&mut self, enabled: bool) {
        self.options.compositing = enabled;
    }

    /// Whether the final image is written back to the surface.
    pub fn write_back_images(&self) -> bool {
        self.options.write_back_images
    }

    /// Enables or disables write-back.
    pub fn set_write_back_images(&mut self, enabled: bool) {
        self.options.write_back_images = enabled;
    }

    /// Whether reduced images are magnified before write-back.
    pub fn magnify_images(&self) -> bool {
        self.options.magnify_images
    }

    /// Enables or disables magnification.
    pub fn set_magnify_images(&mut self, enabled: bool) {
        self.options.magnify_images = enabled;
    }

    /// Whether the root triggers a render on every satellite.
    pub fn render_event_propagation(&self) -> bool {
        self.options.render_event_propagation
    }

    /// Enables or disables render propagation.
    pub fn set_render_event_propagation(&mut self, enabled: bool) {
        self.options.render_event_propagation = enabled;
    }

    /// Whether the factor is derived from the desired update rate.
    pub fn auto_image_reduction_factor(&self) -> bool {
        self.options.auto_image_reduction_factor
    }

    /// Enables or disables automatic reduction.
    pub fn set_auto_image_reduction_factor(&mut self, enabled: bool) {
        self.options.auto_image_reduction_factor = enabled;
    }

    /// Current reduction factor.
    pub fn image_reduction_factor(&self) -> u32 {
        self.options.image_reduction_factor
    }

    /// Sets the reduction factor, clamped to `[1, max]`.
    pub fn set_image_reduction_factor(&mut self, factor: u32) {
        self.options.image_reduction_factor = factor;
        self.clamp_reduction_factor();
    }

    /// Upper bound for the reduction factor.
    pub fn max_image_reduction_factor(&self) -> u32 {
        self.options.max_image_reduction_factor
    }

    /// Sets the upper bound (at least 1) and re-clamps the current factor.
    pub fn set_max_image_reduction_factor(&mut self, factor: u32) {
        self.options.max_image_reduction_factor = factor.max(1);
        self.clamp_reduction_factor();
    }

    /// Id of the process that drives the protocol.
    pub fn root_process_id(&self) -> usize {
        self.options.root_process_id
    }

    /// Changes which process drives the protocol; observers are rewired.
    pub fn set_root_process_id(&mut self, id: usize) {
        if self.options.root_process_id == id {
            return;
        }
        self.options.root_process_id = id;
        self.rewire_observers();
    }

    fn clamp_reduction_factor(&mut self) {
        let max = self.options.max_image_reduction_factor.max(1);
        self.options.image_reduction_factor = self.options.image_reduction_factor.clamp(1, max);
    }

    // ========================================================================
    // Extension points
    // ========================================================================

    /// Replaces the hooks run before and after the surface draws.
    pub fn set_render_processor(&mut self, processor: Box<dyn RenderProcessor>) {
        self.processor = processor;
    }

    /// Registers a callback for cycle start and end notifications.
    pub fn add_cycle_listener(&mut self, listener: impl FnMut(CycleEvent) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, event: CycleEvent) {
        for listener in &mut self.listeners {
            listener(event);
        }
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Whether a cycle is in progress on this process.
    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    /// Full window size of the last cycle.
    pub fn full_image_size(&self) -> (u32, u32) {
        self.frame.full_size()
    }

    /// Reduced render size of the last cycle.
    pub fn reduced_image_size(&self) -> (u32, u32) {
        self.frame.reduced_size()
    }

    /// Duration of the last cycle, in seconds, including magnification.
    pub fn last_cycle_seconds(&self) -> f64 {
        self.frame.cycle_seconds()
    }

    /// Time spent reading and compositing pixels during the last cycle.
    pub fn last_compositing_seconds(&self) -> f64 {
        self.frame.compositing_seconds()
    }

    /// Smoothed per-pixel compositing cost used by auto reduction.
    pub fn average_time_per_pixel(&self) -> f64 {
        self.controller.average_time_per_pixel()
    }

    /// Viewport rectangles captured at the start of the last root cycle.
    pub fn saved_viewports(&self) -> &[DVec4] {
        &self.saved_viewports
    }

    /// Per-cycle image state.
    pub fn frame(&self) -> &FrameImages {
        &self.frame
    }

    /// Full-resolution image of the last cycle, as last computed.
    pub fn full_image(&self) -> &ImageBuffer {
        self.frame.full_image()
    }

    /// Reduced image of the last cycle.
    pub fn reduced_image(&self) -> &ImageBuffer {
        self.frame.reduced_image()
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Asks the attached surface to render one frame.
    ///
    /// Does nothing while a cycle is already in progress.
    pub fn render(&mut self) -> Result<()> {
        if self.is_locked {
            return Ok(());
        }
        let surface = self.require_surface()?;
        let mut guard = lock_surface(&surface)?;
        guard.render(self);
        Ok(())
    }

    /// Copies a rectangle of the full-resolution image, magnifying the
    /// reduced image first if needed.
    pub fn pixels(&mut self, x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Vec<u8>> {
        let surface = self.require_surface()?;
        let guard = lock_surface(&surface)?;
        self.frame.magnify_reduced_image(&*guard)?;
        self.frame.full_pixels(x1, y1, x2, y2)
    }

    /// Copies a rectangle of the reduced image, reading it first if needed.
    pub fn reduced_pixels(&mut self, x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Vec<u8>> {
        let surface = self.require_surface()?;
        let guard = lock_surface(&surface)?;
        self.frame.read_reduced_image(&*guard)?;
        self.frame.reduced_pixels(x1, y1, x2, y2)
    }

    fn require_surface(&self) -> Result<SharedSurface> {
        self.surface.clone().ok_or_else(|| {
            log::error!("no render surface attached");
            ParacomposeError::NoSurface
        })
    }

    fn require_channel(&self) -> Result<Arc<dyn ProcessChannel>> {
        self.channel.clone().ok_or_else(|| {
            log::error!("no process channel attached");
            ParacomposeError::NoChannel
        })
    }

    /// Role of this process on the attached channel.
    pub fn role(&self) -> Option<Role> {
        self.channel
            .as_ref()
            .map(|c| Role::for_process(c.local_process_id(), self.options.root_process_id))
    }

    fn require_role(
        &self,
        operation: &'static str,
        expected: Role,
    ) -> Result<Arc<dyn ProcessChannel>> {
        let channel = self.require_channel()?;
        let role = Role::for_process(channel.local_process_id(), self.options.root_process_id);
        if role != expected {
            log::error!("{operation} called on a {role:?} process");
            return Err(ParacomposeError::WrongRole { operation, role });
        }
        Ok(channel)
    }
}

fn lock_surface(surface: &SharedSurface) -> Result<MutexGuard<'_, dyn RenderSurface + 'static>> {
    surface.lock().map_err(|_| ParacomposeError::SurfacePoisoned)
}

impl RenderObserver for RenderCoordinator {
    fn on_render_event(&mut self, event: RenderEvent, surface: &mut dyn RenderSurface) {
        let Some(role) = self.wiring else {
            return;
        };
        let result = match (role, event) {
            (Role::Root, RenderEvent::Start) => self.begin_render_cycle(surface),
            (Role::Root, RenderEvent::End) => self.end_render_cycle(surface),
            (Role::Satellite, RenderEvent::Start) => self.satellite_begin_render(surface),
            (Role::Satellite, RenderEvent::End) => self.satellite_end_render(surface),
        };
        if let Err(e) = result {
            log::error!("{role:?} {event:?} handling failed: {e}");
        }
    }
}

impl RmiHandler for RenderCoordinator {
    fn registered_tags(&self) -> &[MessageTag] {
        &SERVICE_TAGS
    }

    fn handle_rmi(&mut self, tag: MessageTag, source: usize, _payload: &[u8]) {
        let result = match tag {
            MessageTag::RenderRmi => self.handle_render_rmi(),
            MessageTag::ComputeBoundsRmi => self.handle_compute_bounds_rmi(source),
            other => {
                log::warn!("no handler for {other:?}");
                Ok(())
            }
        };
        if let Err(e) = result {
            log::error!("{tag:?} from process {source} failed: {e}");
        }
    }
}

impl Drop for RenderCoordinator {
    fn drop(&mut self) {
        if let Some(role) = self.wiring.take() {
            log::debug!("detaching {role:?} observers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paracompose_core::{share_surface, Viewport};
    use paracompose_render::MemorySurface;
    use std::sync::Mutex;

    #[test]
    fn test_defaults() {
        let coordinator = RenderCoordinator::new();
        assert!(coordinator.parallel_rendering());
        assert!(coordinator.compositing());
        assert!(coordinator.write_back_images());
        assert!(coordinator.magnify_images());
        assert!(coordinator.render_event_propagation());
        assert!(!coordinator.auto_image_reduction_factor());
        assert_eq!(coordinator.image_reduction_factor(), 1);
        assert_eq!(coordinator.max_image_reduction_factor(), 16);
        assert_eq!(coordinator.root_process_id(), 0);
        assert_eq!(coordinator.role(), None);
        assert!(!coordinator.is_locked());
    }

    #[test]
    fn test_reduction_factor_clamped() {
        let mut coordinator = RenderCoordinator::new();
        coordinator.set_image_reduction_factor(0);
        assert_eq!(coordinator.image_reduction_factor(), 1);
        coordinator.set_image_reduction_factor(40);
        assert_eq!(coordinator.image_reduction_factor(), 16);

        coordinator.set_max_image_reduction_factor(4);
        assert_eq!(coordinator.image_reduction_factor(), 4);
        coordinator.set_max_image_reduction_factor(0);
        assert_eq!(coordinator.max_image_reduction_factor(), 1);
        assert_eq!(coordinator.image_reduction_factor(), 1);
    }

    #[test]
    fn test_with_options_validates() {
        let options = CoordinatorOptions::new().with_max_image_reduction_factor(0);
        assert!(matches!(
            RenderCoordinator::with_options(options),
            Err(ParacomposeError::InvalidOptions(_))
        ));

        let options = CoordinatorOptions::new()
            .with_image_reduction_factor(8)
            .with_max_image_reduction_factor(4);
        let coordinator = RenderCoordinator::with_options(options).unwrap();
        assert_eq!(coordinator.image_reduction_factor(), 4);
    }

    #[test]
    fn test_render_without_surface() {
        let mut coordinator = RenderCoordinator::new();
        assert!(matches!(coordinator.render(), Err(ParacomposeError::NoSurface)));
    }

    #[test]
    fn test_render_without_channel_is_local() {
        let surface = share_surface(MemorySurface::new(4, 4).with_viewport(Viewport::default()));
        let mut coordinator = RenderCoordinator::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        coordinator.add_cycle_listener(move |e| sink.lock().unwrap().push(e));

        coordinator.attach_surface(Some(surface)).unwrap();
        coordinator.render().unwrap();

        assert!(events.lock().unwrap().is_empty());
        assert!(!coordinator.is_locked());
    }

    #[test]
    fn test_rmi_tags() {
        let coordinator = RenderCoordinator::new();
        assert_eq!(
            coordinator.registered_tags(),
            &[MessageTag::RenderRmi, MessageTag::ComputeBoundsRmi]
        );
    }
}
