//! Fault probability configuration

/// Global switch plus a multiplier applied to every site probability
#[derive(Debug, Clone, PartialEq)]
pub struct FaultConfig {
    pub enabled: bool,
    /// Multiplies the probability passed at each site (result clamped to 1.0)
    pub multiplier: f64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultConfig {
    /// Enabled, site probabilities used as given
    pub fn new() -> Self {
        FaultConfig {
            enabled: true,
            multiplier: 1.0,
        }
    }

    /// Everything off
    pub fn disabled() -> Self {
        FaultConfig {
            enabled: false,
            multiplier: 0.0,
        }
    }

    /// Aggressive rates for stress runs
    pub fn chaos() -> Self {
        FaultConfig {
            enabled: true,
            multiplier: 5.0,
        }
    }

    /// Probability a site actually fires with (0.0 when disabled)
    pub fn effective(&self, probability: f64) -> f64 {
        if !self.enabled {
            return 0.0;
        }
        (probability * self.multiplier).clamp(0.0, 1.0)
    }
}
