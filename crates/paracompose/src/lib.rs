//! paracompose: render synchronization and image compositing for a cluster
//! of cooperating render processes.
//!
//! One process, the **root**, owns the interactive window and drives every
//! render cycle. The other processes, the **satellites**, follow: before each
//! frame the root pushes window, camera, viewport and light state to them,
//! everyone renders, and afterwards a [`RenderProcessor`] gathers the image.
//! To keep compositing cheap at interactive rates the frame may be rendered
//! at a reduced resolution and magnified back for display.
//!
//! # Quick Start
//!
//! ```no_run
//! use paracompose::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let channels = LocalCluster::new().build(3);
//!     let mut handles = Vec::new();
//!     for channel in channels {
//!         handles.push(std::thread::spawn(move || -> Result<()> {
//!             let surface = share_surface(
//!                 MemorySurface::new(400, 300).with_viewport(Viewport::default()),
//!             );
//!             let mut coordinator = RenderCoordinator::new();
//!             coordinator.attach_surface(Some(surface))?;
//!             coordinator.attach_channel(Some(channel))?;
//!             coordinator.start_interactive()
//!         }));
//!     }
//!     for handle in handles {
//!         handle.join().expect("process thread panicked")?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Crates
//!
//! - `paracompose-core`: contracts, wire records, images, reduction control
//! - `paracompose-render`: [`MemorySurface`] and PNG export
//! - `paracompose-cluster`: [`LocalCluster`], an in-process channel

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
// Wire records carry sizes and counts as i32
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

mod coordinator;

pub use coordinator::{CycleEvent, CycleListener, RenderCoordinator};

// Re-export core types
pub use paracompose_core::{
    error::{ChannelError, ChannelResult, ParacomposeError, Result},
    options::CoordinatorOptions,
    records,
    share_surface, Bounds, CameraState, Drawable, FrameContext, FrameImages, ImageBuffer,
    ImageReadback, Light, LightKind, MessageTag, NoObserver, Partitionable, ProcessChannel,
    ReductionController, ReductionSample, RenderEvent, RenderObserver, RenderProcessor,
    RenderSurface, RmiHandler, Role, SharedSurface, Viewport, DVec2, DVec3, DVec4,
};

// Re-export render types
pub use paracompose_render::{
    color_to_rgb, encode_png, save_image, BoxActor, MemorySurface, ScreenshotError,
};

// Re-export cluster types
pub use paracompose_cluster::{ChannelStats, LocalChannel, LocalCluster};

/// Installs an `env_logger` logger configured from `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
