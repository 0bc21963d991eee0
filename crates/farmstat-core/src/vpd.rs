//! Vapor-pressure deficit via the Tetens approximation.
//!
//! Inputs are daily means, not individual readings. A NaN input yields a NaN
//! result; callers decide whether to keep such rows.

/// Saturation vapor pressure in kPa at `temp_c` °C.
pub fn saturation_vapor_pressure(temp_c: f64) -> f64 {
  0.6108 * ((17.27 * temp_c) / (temp_c + 237.3)).exp()
}

/// Vapor-pressure deficit in kPa for a mean temperature (°C) and mean
/// relative humidity (%).
pub fn vpd_kpa(temp_c: f64, rh_percent: f64) -> f64 {
  saturation_vapor_pressure(temp_c) * (1.0 - rh_percent / 100.0)
}
