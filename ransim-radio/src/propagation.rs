//! Path-loss models and power-unit conversions
//!
//! Implements the 3GPP urban-macro path-loss models from TR 38.901
//! section 7.4.1. Distances are in meters, frequencies in GHz, power in
//! dBm unless noted otherwise.

use ransim_common::error::{Error, Result};

/// Boltzmann constant (J/K), used for thermal-noise power.
pub const BOLTZMANN_CONSTANT: f64 = 1.38e-23;

/// Assumed UE antenna height for the NLOS model (m).
pub const UE_ANTENNA_HEIGHT_M: f64 = 1.5;

fn check_domain(distance_m: f64, frequency_ghz: f64) -> Result<()> {
    if distance_m <= 0.0 || frequency_ghz <= 0.0 {
        return Err(Error::InvalidArgument(format!(
            "distance and frequency must be positive (got {distance_m} m, {frequency_ghz} GHz)"
        )));
    }
    Ok(())
}

/// UMa line-of-sight path loss (dB), TR 38.901 Table 7.4.1-1.
pub fn path_loss_urban_macro_los(distance_m: f64, frequency_ghz: f64) -> Result<f64> {
    check_domain(distance_m, frequency_ghz)?;
    Ok(28.0 + 22.0 * distance_m.log10() + 20.0 * frequency_ghz.log10())
}

/// UMa non-line-of-sight path loss (dB), TR 38.901 Table 7.4.1-1.
///
/// The NLOS loss is lower-bounded by the LOS loss at the same distance.
pub fn path_loss_urban_macro_nlos(distance_m: f64, frequency_ghz: f64) -> Result<f64> {
    let pl_los = path_loss_urban_macro_los(distance_m, frequency_ghz)?;

    let nlos = 13.54 + 39.08 * distance_m.log10() + 20.0 * frequency_ghz.log10()
        - 0.6 * (UE_ANTENNA_HEIGHT_M - 1.5);

    Ok(pl_los.max(nlos))
}

/// Converts a power level from dBm to Watts.
pub fn dbm_to_watts(dbm: f64) -> f64 {
    10f64.powf((dbm - 30.0) / 10.0)
}

/// Converts a power level from Watts to dBm.
pub fn watts_to_dbm(watts: f64) -> f64 {
    10.0 * watts.log10() + 30.0
}
