//! Simple box-shaped drawable that supports data-parallel partitioning.

use glam::DVec3;
use paracompose_core::surface::{Bounds, Drawable, Partitionable};

/// An axis-aligned box.
///
/// When partitioned, the box is split into equal slabs along X and only the
/// assigned slab contributes to [`Drawable::bounds`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoxActor {
    extent: Bounds,
    visible: bool,
    piece: usize,
    number_of_pieces: usize,
}

impl BoxActor {
    /// Creates a visible, unpartitioned box.
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self {
            extent: Bounds::new(min, max),
            visible: true,
            piece: 0,
            number_of_pieces: 1,
        }
    }

    /// Sets whether the box counts toward visible bounds.
    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Shows or hides the box.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Assigned `(piece, number_of_pieces)`.
    pub fn piece(&self) -> (usize, usize) {
        (self.piece, self.number_of_pieces)
    }
}

impl Drawable for BoxActor {
    fn is_visible(&self) -> bool {
        self.visible
    }

    #[allow(clippy::cast_precision_loss)]
    fn bounds(&self) -> Option<Bounds> {
        if !self.extent.is_valid() {
            return None;
        }
        let pieces = self.number_of_pieces.max(1) as f64;
        let width = (self.extent.max.x - self.extent.min.x) / pieces;
        let x0 = self.extent.min.x + width * self.piece as f64;
        Some(Bounds::new(
            DVec3::new(x0, self.extent.min.y, self.extent.min.z),
            DVec3::new(x0 + width, self.extent.max.y, self.extent.max.z),
        ))
    }

    fn as_partitionable(&mut self) -> Option<&mut dyn Partitionable> {
        Some(self)
    }
}

impl Partitionable for BoxActor {
    fn set_piece(&mut self, piece: usize, number_of_pieces: usize) {
        self.piece = piece;
        self.number_of_pieces = number_of_pieces.max(1);
    }
}
