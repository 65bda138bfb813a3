//! One-euro filter for a single scalar channel.
//!
//! Adaptive low-pass: the cutoff frequency rises with the estimated speed of
//! the signal, so slow movement is smoothed hard and fast movement lags less.
//!
//! α(te, fc) = r / (r + 1), r = 2π·fc·te
//! cutoff    = min_cutoff + beta·|dx̂|

use std::f64::consts::PI;

/// Filter parameters shared by every channel of a bank
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneEuroParams {
    /// Cutoff at zero speed
    pub min_cutoff: f64,
    /// Cutoff used for the derivative estimate
    pub d_cutoff: f64,
    /// Speed coefficient
    pub beta: f64,
}

impl Default for OneEuroParams {
    fn default() -> Self {
        Self {
            min_cutoff: 0.004,
            d_cutoff: 1.0,
            beta: 20.0,
        }
    }
}

/// Map the 0..=100 smoothing slider to beta in [100, 0.5]
///
/// Out-of-range values are clamped; non-finite values use the default slider
/// position.
pub fn smoothing_beta(strength: f64) -> f64 {
    let strength = if strength.is_finite() {
        strength.clamp(0.0, 100.0)
    } else {
        contracts::DEFAULT_SMOOTHING_STRENGTH
    };
    change_range(strength, 0.0, 100.0, 100.0, 0.5)
}

/// Linear remap of `value` from [from_min, from_max] to [to_min, to_max]
pub fn change_range(value: f64, from_min: f64, from_max: f64, to_min: f64, to_max: f64) -> f64 {
    (to_max - to_min) * (value - from_min) / (from_max - from_min) + to_min
}

/// Exponential smoothing factor for elapsed time `te` and cutoff `fc`
pub fn smoothing_factor(te: f64, cutoff: f64) -> f64 {
    let r = 2.0 * PI * cutoff * te;
    r / (r + 1.0)
}

fn exponential_smoothing(a: f64, x: f64, x_prev: f64) -> f64 {
    a * x + (1.0 - a) * x_prev
}

/// Per-channel state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OneEuroState {
    x_prev: f64,
    dx_prev: f64,
    t_prev: f64,
}

impl OneEuroState {
    /// Initialise from the first observation
    pub fn new(t: f64, x: f64) -> Self {
        Self {
            x_prev: x,
            dx_prev: 0.0,
            t_prev: t,
        }
    }

    /// Advance with observation `x` at time `t`
    ///
    /// Returns `None` and leaves the state untouched if the result would not
    /// be finite (e.g. zero elapsed time).
    pub fn step(&mut self, params: &OneEuroParams, t: f64, x: f64) -> Option<f64> {
        let te = t - self.t_prev;
        let a_d = smoothing_factor(te, params.d_cutoff);
        let dx = (x - self.x_prev) / te;
        let dx_hat = exponential_smoothing(a_d, dx, self.dx_prev);
        let cutoff = params.min_cutoff + params.beta * dx_hat.abs();
        let a = smoothing_factor(te, cutoff);
        let x_hat = exponential_smoothing(a, x, self.x_prev);

        if !x_hat.is_finite() || !dx_hat.is_finite() {
            return None;
        }
        self.x_prev = x_hat;
        self.dx_prev = dx_hat;
        self.t_prev = t;
        Some(x_hat)
    }

    pub fn value(&self) -> f64 {
        self.x_prev
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothing_beta_endpoints() {
        assert_eq!(smoothing_beta(0.0), 100.0);
        assert_eq!(smoothing_beta(100.0), 0.5);
        assert_eq!(smoothing_beta(-10.0), 100.0);
        assert_eq!(smoothing_beta(250.0), 0.5);
    }

    #[test]
    fn test_smoothing_beta_strictly_decreasing() {
        let mut prev = smoothing_beta(0.0);
        for step in 1..=1000 {
            let beta = smoothing_beta(step as f64 / 10.0);
            assert!(beta < prev, "not decreasing at {step}");
            prev = beta;
        }
    }

    #[test]
    fn test_smoothing_beta_default_slider() {
        assert!((smoothing_beta(60.0) - 40.3).abs() < 1e-9);
        assert_eq!(smoothing_beta(f64::NAN), smoothing_beta(60.0));
    }

    #[test]
    fn test_smoothing_factor_range() {
        assert_eq!(smoothing_factor(1.0, 0.0), 0.0);
        let a = smoothing_factor(1.0, 1.0);
        assert!(a > 0.0 && a < 1.0);
        assert!(smoothing_factor(1.0, 10.0) > a);
    }

    #[test]
    fn test_constant_signal_is_fixed_point() {
        let params = OneEuroParams::default();
        let mut state = OneEuroState::new(0.0, 3.0);
        for t in 1..20 {
            let out = state.step(&params, t as f64, 3.0).unwrap();
            assert!((out - 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_elapsed_time_is_rejected() {
        let params = OneEuroParams::default();
        let mut state = OneEuroState::new(5.0, 1.0);
        assert_eq!(state.step(&params, 5.0, 2.0), None);
        assert_eq!(state.value(), 1.0);
    }

    #[test]
    fn test_step_moves_toward_input() {
        let params = OneEuroParams::default();
        let mut state = OneEuroState::new(0.0, 0.0);
        let out = state.step(&params, 1.0, 1.0).unwrap();
        assert!(out > 0.0 && out <= 1.0);
    }
}
