//! Glide polar interface
//!
//! The engine never owns a polar; callers pass one by reference per update
//! and the engine reads only the cruise performance it needs for time
//! estimates. The physical model lives with the caller.

/// Performance surface of the aircraft polar.
pub trait GlidePolar {
    /// MacCready setting in m/s.
    fn mc(&self) -> f64;

    /// Expected cross-country speed over ground in m/s for the current
    /// MacCready setting.
    fn best_speed(&self) -> f64;
}

/// Tuning applied to performance read from the polar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlideSettings {
    /// Achieved fraction of the clean-polar performance; 1.0 for a clean
    /// wing, lower for bugs or rain
    pub polar_degradation: f64,
}

impl Default for GlideSettings {
    fn default() -> Self {
        Self {
            polar_degradation: 1.0,
        }
    }
}

impl GlideSettings {
    /// Cross-country speed after degradation, m/s.
    pub fn degraded_speed(&self, polar: &dyn GlidePolar) -> f64 {
        polar.best_speed() * self.polar_degradation
    }
}
