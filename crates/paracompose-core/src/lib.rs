//! Core abstractions for paracompose.
//!
//! This crate provides the contracts and data types the render coordinator
//! is built from:
//! - [`ProcessChannel`] for messages and remote method invocations between processes
//! - [`RenderSurface`] and the [`Viewport`] state synchronized each cycle
//! - [`ImageBuffer`] and the per-cycle [`FrameImages`]
//! - fixed-layout wire [`records`]
//! - the adaptive [`ReductionController`]
//! - the [`RenderProcessor`] extension point

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Options structs legitimately have many boolean flags
#![allow(clippy::struct_excessive_bools)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
// Pixel coordinates are u32, buffer offsets usize, wire fields i32
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::many_single_char_names)]

pub mod channel;
pub mod error;
pub mod frame;
pub mod image_buffer;
pub mod options;
pub mod processor;
pub mod records;
pub mod reduction;
pub mod surface;

pub use channel::{MessageTag, ProcessChannel, RmiHandler, Role};
pub use error::{ChannelError, ChannelResult, ParacomposeError, Result};
pub use frame::FrameImages;
pub use image_buffer::ImageBuffer;
pub use options::CoordinatorOptions;
pub use processor::{FrameContext, ImageReadback, RenderProcessor};
pub use reduction::{ReductionController, ReductionSample};
pub use surface::{
    share_surface, Bounds, CameraState, Drawable, Light, LightKind, NoObserver, Partitionable,
    RenderEvent, RenderObserver, RenderSurface, SharedSurface, Viewport,
};

// Re-export glam types for convenience
pub use glam::{DVec2, DVec3, DVec4};
