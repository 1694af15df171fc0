//! Configuration options for the render coordinator.

use serde::{Deserialize, Serialize};

use crate::error::{ParacomposeError, Result};

/// Coordinator configuration.
///
/// Every process of a cluster should be configured identically; the root
/// overrides the reduction factor and compositing flag on satellites each
/// cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorOptions {
    /// Process that drives the protocol.
    pub root_process_id: usize,

    /// Whether render cycles are synchronized across processes at all.
    pub parallel_rendering: bool,

    /// Whether images are combined after each cycle.
    pub compositing: bool,

    /// Whether the final image is written back to the surface.
    pub write_back_images: bool,

    /// Whether a reduced image is magnified back to full size for display.
    pub magnify_images: bool,

    /// Whether the root triggers a render on satellites every cycle.
    pub render_event_propagation: bool,

    /// Initial downsample factor.
    pub image_reduction_factor: u32,

    /// Upper bound for the reduction factor.
    pub max_image_reduction_factor: u32,

    /// Whether the reduction factor is tuned every cycle from timing feedback.
    pub auto_image_reduction_factor: bool,

    /// Size used when the surface reports a zero extent.
    pub default_window_size: [u32; 2],
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            root_process_id: 0,
            parallel_rendering: true,
            compositing: true,
            write_back_images: true,
            magnify_images: true,
            render_event_propagation: true,
            image_reduction_factor: 1,
            max_image_reduction_factor: 16,
            auto_image_reduction_factor: false,
            default_window_size: [300, 300],
        }
    }
}

impl CoordinatorOptions {
    /// Creates options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Serializes the options as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_image_reduction_factor == 0 {
            return Err(ParacomposeError::InvalidOptions(
                "max_image_reduction_factor must be at least 1".into(),
            ));
        }
        if self.default_window_size.contains(&0) {
            return Err(ParacomposeError::InvalidOptions(
                "default_window_size must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Sets the id of the process that drives the protocol.
    pub fn with_root_process_id(mut self, id: usize) -> Self {
        self.root_process_id = id;
        self
    }

    /// Enables or disables the whole protocol.
    pub fn with_parallel_rendering(mut self, enabled: bool) -> Self {
        self.parallel_rendering = enabled;
        self
    }

    /// Enables or disables image gathering after each render.
    pub fn with_compositing(mut self, enabled: bool) -> Self {
        self.compositing = enabled;
        self
    }

    /// Enables or disables writing the final image back to the surface.
    pub fn with_write_back_images(mut self, enabled: bool) -> Self {
        self.write_back_images = enabled;
        self
    }

    /// Enables or disables magnifying reduced images to full size.
    pub fn with_magnify_images(mut self, enabled: bool) -> Self {
        self.magnify_images = enabled;
        self
    }

    /// Enables or disables triggering satellite renders from the root.
    pub fn with_render_event_propagation(mut self, enabled: bool) -> Self {
        self.render_event_propagation = enabled;
        self
    }

    /// Sets the initial reduction factor.
    pub fn with_image_reduction_factor(mut self, factor: u32) -> Self {
        self.image_reduction_factor = factor;
        self
    }

    /// Sets the upper bound for the reduction factor.
    pub fn with_max_image_reduction_factor(mut self, factor: u32) -> Self {
        self.max_image_reduction_factor = factor;
        self
    }

    /// Enables or disables picking the factor from the update rate.
    pub fn with_auto_image_reduction_factor(mut self, enabled: bool) -> Self {
        self.auto_image_reduction_factor = enabled;
        self
    }

    /// Sets the size used when the surface reports zero extent.
    pub fn with_default_window_size(mut self, width: u32, height: u32) -> Self {
        self.default_window_size = [width, height];
        self
    }
}
