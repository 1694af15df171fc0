//! Adaptive image-reduction control loop.
//!
//! Once per cycle the controller turns the last cycle's timings into a new
//! reduction factor so that compositing fits in the time left by the
//! desired update rate. It keeps an exponentially smoothed time per pixel.

/// Timings and sizes observed during the previous cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReductionSample {
    /// Requested frames per second; `0.0` disables reduction.
    pub desired_update_rate: f64,
    /// Pixel count of the full-size image.
    pub full_pixel_count: u64,
    /// Factor used by the previous cycle.
    pub current_factor: u32,
    /// Upper bound for the new factor.
    pub max_factor: u32,
    /// Duration of the previous cycle, in seconds.
    pub cycle_seconds: f64,
    /// Time spent reading and compositing pixels, in seconds.
    pub compositing_seconds: f64,
}

/// Share of the cycle time always reserved for compositing.
const MIN_COMPOSITING_SHARE: f64 = 0.15;

/// Smoothed per-pixel cost estimator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReductionController {
    average_time_per_pixel: f64,
}

impl ReductionController {
    /// Creates a controller with no timing history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current smoothed seconds per pixel.
    pub fn average_time_per_pixel(&self) -> f64 {
        self.average_time_per_pixel
    }

    /// Computes the reduction factor for the next cycle.
    ///
    /// The result always lies in `1..=max(sample.max_factor, 1)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn factor_for_update_rate(&mut self, sample: &ReductionSample) -> u32 {
        let max_factor = sample.max_factor.max(1);
        if sample.desired_update_rate <= 0.0 {
            return 1;
        }

        let factor = u64::from(sample.current_factor.max(1));
        let reduced_pixels = sample.full_pixel_count / (factor * factor);
        if reduced_pixels == 0 {
            return 1;
        }

        let time_per_pixel = sample.compositing_seconds / reduced_pixels as f64;
        self.average_time_per_pixel = (3.0 * self.average_time_per_pixel + time_per_pixel) / 4.0;
        if self.average_time_per_pixel <= 0.0 || !self.average_time_per_pixel.is_finite() {
            self.average_time_per_pixel = 0.0;
            return 1;
        }

        let allotted = (1.0 / sample.desired_update_rate - sample.cycle_seconds)
            .max(MIN_COMPOSITING_SHARE * sample.cycle_seconds);
        let pixels_to_use = allotted / self.average_time_per_pixel;
        let full = sample.full_pixel_count as f64;

        let next = if pixels_to_use < 1.0 || full / pixels_to_use > f64::from(max_factor) {
            max_factor
        } else if pixels_to_use >= full {
            1
        } else {
            (full / pixels_to_use).floor() as u32
        };
        next.clamp(1, max_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(rate: f64, cycle: f64, compositing: f64) -> ReductionSample {
        ReductionSample {
            desired_update_rate: rate,
            full_pixel_count: 400 * 300,
            current_factor: 1,
            max_factor: 16,
            cycle_seconds: cycle,
            compositing_seconds: compositing,
        }
    }

    #[test]
    fn test_zero_rate_disables_reduction() {
        let mut controller = ReductionController::new();
        assert_eq!(controller.factor_for_update_rate(&sample(0.0, 1.0, 1.0)), 1);
    }

    #[test]
    fn test_first_cycle_without_pixels() {
        let mut controller = ReductionController::new();
        let mut s = sample(10.0, 1.0, 1.0);
        s.full_pixel_count = 0;
        assert_eq!(controller.factor_for_update_rate(&s), 1);
        assert_eq!(controller.average_time_per_pixel(), 0.0);
    }

    #[test]
    fn test_fast_compositing_keeps_full_resolution() {
        let mut controller = ReductionController::new();
        // 1 ns per pixel, plenty of budget.
        let s = sample(10.0, 0.01, 120_000.0 * 1e-9);
        for _ in 0..8 {
            assert_eq!(controller.factor_for_update_rate(&s), 1);
        }
    }

    #[test]
    fn test_slow_compositing_hits_max() {
        let mut controller = ReductionController::new();
        let s = sample(30.0, 0.5, 5.0);
        assert_eq!(controller.factor_for_update_rate(&s), 16);
    }

    #[test]
    fn test_intermediate_factor() {
        let mut controller = ReductionController::new();
        // Warm the average up to 1 µs per pixel.
        controller.average_time_per_pixel = 1e-6;
        // 0.12 s compositing over 120000 px = 1 µs/px.
        // Budget 0.1 - 0.052 = 0.048 s -> 48000 px -> ratio 2.5 -> factor 2.
        let s = sample(10.0, 0.052, 0.12);
        assert_eq!(controller.factor_for_update_rate(&s), 2);
    }

    #[test]
    fn test_budget_floor_reserves_share() {
        let mut controller = ReductionController::new();
        controller.average_time_per_pixel = 1e-6;
        // Cycle overran the budget; 15% of 0.32 s is still allotted.
        // 0.048 s / 1 µs = 48000 px -> factor 2.
        let s = sample(10.0, 0.32, 0.12);
        assert_eq!(controller.factor_for_update_rate(&s), 2);
    }

    proptest! {
        #[test]
        fn prop_factor_within_bounds(
            samples in proptest::collection::vec(
                (0.0f64..120.0, 0.0f64..2.0, 0.0f64..2.0),
                1..20,
            ),
            max_factor in 0u32..32,
            pixels in 0u64..4_000_000,
        ) {
            let mut controller = ReductionController::new();
            let mut factor = 1;
            for (rate, cycle, compositing) in samples {
                factor = controller.factor_for_update_rate(&ReductionSample {
                    desired_update_rate: rate,
                    full_pixel_count: pixels,
                    current_factor: factor,
                    max_factor,
                    cycle_seconds: cycle,
                    compositing_seconds: compositing,
                });
                prop_assert!(factor >= 1);
                prop_assert!(factor <= max_factor.max(1));
            }
        }
    }
}
