//! Tunable hyperparameters of the training-step kernels and accelerator context.

use crate::error::KernelError;

/// Step-size adaptation constants for [`rprop_with`](crate::rprop_with).
///
/// # Defaults
///
/// - `eta_plus = 1.2`
/// - `eta_minus = 0.5`
/// - `step_min = 1e-6`
/// - `step_max = 50.0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RpropConfig {
    /// Growth factor applied when consecutive gradient signs agree (`> 1`).
    pub eta_plus: f32,
    /// Shrink factor applied when they disagree (in `(0, 1)`).
    pub eta_minus: f32,
    /// Lower bound on any step size.
    pub step_min: f32,
    /// Upper bound on any step size.
    pub step_max: f32,
}

impl Default for RpropConfig {
    fn default() -> Self {
        Self {
            eta_plus: 1.2,
            eta_minus: 0.5,
            step_min: 1e-6,
            step_max: 50.0,
        }
    }
}

impl RpropConfig {
    /// Sets the growth factor.
    #[must_use]
    pub const fn eta_plus(mut self, eta_plus: f32) -> Self {
        self.eta_plus = eta_plus;
        self
    }

    /// Sets the shrink factor.
    #[must_use]
    pub const fn eta_minus(mut self, eta_minus: f32) -> Self {
        self.eta_minus = eta_minus;
        self
    }

    /// Sets the step-size bounds.
    #[must_use]
    pub const fn step_bounds(mut self, step_min: f32, step_max: f32) -> Self {
        self.step_min = step_min;
        self.step_max = step_max;
        self
    }

    /// Checks that the constants describe a sane adaptation rule.
    ///
    /// # Errors
    ///
    /// [`KernelError::UnsupportedOperation`] if any constant is non-finite,
    /// `eta_plus <= 1`, `eta_minus` is outside `(0, 1)`, or the bounds are
    /// negative or inverted.
    pub fn validate(&self) -> Result<(), KernelError> {
        let all_finite = [self.eta_plus, self.eta_minus, self.step_min, self.step_max]
            .iter()
            .all(|v| v.is_finite());
        let reason = if !all_finite {
            "constants must be finite"
        } else if self.eta_plus <= 1.0 {
            "eta_plus must exceed 1"
        } else if self.eta_minus <= 0.0 || self.eta_minus >= 1.0 {
            "eta_minus must lie in (0, 1)"
        } else if self.step_min < 0.0 || self.step_min > self.step_max {
            "step bounds must satisfy 0 <= step_min <= step_max"
        } else {
            return Ok(());
        };
        Err(KernelError::unsupported("rprop", reason))
    }
}

/// How to pick the adapter for a [`GpuContext`](crate::ops::wgpu::GpuContext).
#[cfg(feature = "wgpu")]
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Prefer a low-power or high-performance adapter.
    pub power_preference: wgpu::PowerPreference,
    /// Only accept a software adapter.
    pub force_fallback_adapter: bool,
    /// Debug label of the device.
    pub label: Option<String>,
}
