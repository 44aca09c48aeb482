//! Common types and traits for flexible assets.

use crate::sim::clock::TimePeriod;

/// Contextual information passed to devices when they are dispatched.
/// # Fields
/// * `period` - Operation period being dispatched
/// * `requested_mwh` - Optional external energy request (positive = charge / shift up)
pub struct DeviceContext {
    pub period: TimePeriod,
    pub requested_mwh: Option<f64>,
}

impl DeviceContext {
    /// Creates a new DeviceContext with no request.
    pub fn new(period: TimePeriod) -> Self {
        Self {
            period,
            requested_mwh: None,
        }
    }

    /// Creates a new DeviceContext with the given energy request.
    pub fn with_request(period: TimePeriod, requested_mwh: f64) -> Self {
        Self {
            period,
            requested_mwh: Some(requested_mwh),
        }
    }
}

/// Trait defining a flexible asset whose energy content is planned and dispatched.
///
/// # Energy Convention
/// - Positive values: energy drawn from the market (charging, load shifted up)
/// - Negative values: energy returned to the market (discharging, load shifted down)
pub trait Device {
    /// Applies the requested external energy for one period.
    ///
    /// # Arguments
    ///
    /// * `context` - Period and optional request; no request means idle
    ///
    /// # Returns
    ///
    /// Realised external energy in MWh after physical limits.
    fn dispatch(&mut self, context: &DeviceContext) -> f64;

    /// Current internal energy level used to check schedule applicability (MWh).
    fn energy_level_mwh(&self) -> f64;

    /// Returns a human-readable type name for the device.
    fn device_type(&self) -> &'static str;
}
