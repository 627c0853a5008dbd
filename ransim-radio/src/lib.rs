//! Radio propagation and link-adaptation models
//!
//! Pure, stateless functions and lookup tables shared by UEs and cells:
//! path-loss models, dBm/Watt conversions, the SINR-to-CQI mapping, the CQI
//! and MCS link-adaptation tables, and the PRB throughput estimator.

pub mod link_adaptation;
pub mod propagation;

pub use link_adaptation::{
    cqi_entry, estimate_throughput, mcs_entry, mcs_table, sinr_to_cqi, CqiEntry, McsEntry,
    Modulation, MCS_TABLE_LEN,
};
pub use propagation::{
    dbm_to_watts, path_loss_urban_macro_los, path_loss_urban_macro_nlos, watts_to_dbm,
    BOLTZMANN_CONSTANT, UE_ANTENNA_HEIGHT_M,
};

/// Thermal noise power in Watts for a receiver of the given noise
/// temperature and bandwidth: `k * T * B`.
pub fn thermal_noise_watts(temperature_k: f64, bandwidth_hz: f64) -> f64 {
    BOLTZMANN_CONSTANT * temperature_k * bandwidth_hz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thermal_noise() {
        // 290 K over 20 MHz: kTB = 1.38e-23 * 290 * 20e6
        let noise = thermal_noise_watts(290.0, 20e6);
        assert!((noise - 8.004e-14).abs() < 1e-17);
    }
}
