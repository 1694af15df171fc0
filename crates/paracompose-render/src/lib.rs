//! Software rendering pieces for paracompose.
//!
//! This crate provides:
//! - [`MemorySurface`], an in-memory [`RenderSurface`](paracompose_core::RenderSurface)
//!   with front and back buffers
//! - [`BoxActor`], a partitionable drawable
//! - PNG/JPEG export of composited frames

#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod actor;
pub mod memory_surface;
pub mod screenshot;

pub use actor::BoxActor;
pub use memory_surface::{color_to_rgb, MemorySurface};
pub use screenshot::{encode_png, save_image, ScreenshotError};
