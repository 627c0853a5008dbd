//! Configuration loading and validation
//!
//! Wraps the `SimulationConfig` from `ransim-common` with file loading and
//! validation specific to the engine.

use std::path::Path;

use thiserror::Error;

use ransim_common::config::SimulationConfig;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Configuration validation error
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ConfigValidationError),
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigValidationError {
    #[error("no base stations configured")]
    NoBaseStations,

    #[error("duplicate base station id: {0}")]
    DuplicateBsId(String),

    #[error("base station {0} has no cells")]
    NoCells(String),

    #[error("duplicate cell id: {0}")]
    DuplicateCellId(String),

    #[error("cell {0}: {1}")]
    InvalidCell(String, String),

    #[error("base station {0}: {1}")]
    InvalidMeasEvent(String, String),

    #[error("UE population: {0}")]
    InvalidUePopulation(String),

    #[error("no network slices configured")]
    NoSlices,

    #[error("time: {0}")]
    InvalidTime(String),

    #[error("coverage: {0}")]
    InvalidCoverage(String),
}

/// Loads a simulation configuration from a YAML file and validates it.
pub fn load_simulation_config(path: impl AsRef<Path>) -> Result<SimulationConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: SimulationConfig = serde_yaml::from_str(&contents)?;
    validate_simulation_config(&config)?;
    Ok(config)
}

/// Validates a simulation configuration.
pub fn validate_simulation_config(config: &SimulationConfig) -> Result<(), ConfigValidationError> {
    if config.base_stations.is_empty() {
        return Err(ConfigValidationError::NoBaseStations);
    }
    if config.slices.is_empty() {
        return Err(ConfigValidationError::NoSlices);
    }

    let mut bs_ids = std::collections::BTreeSet::new();
    let mut cell_ids = std::collections::BTreeSet::new();
    for bs in &config.base_stations {
        if !bs_ids.insert(bs.bs_id.clone()) {
            return Err(ConfigValidationError::DuplicateBsId(bs.bs_id.clone()));
        }
        if bs.cells.is_empty() {
            return Err(ConfigValidationError::NoCells(bs.bs_id.clone()));
        }
        for cell in &bs.cells {
            if !cell_ids.insert(cell.cell_id.clone()) {
                return Err(ConfigValidationError::DuplicateCellId(cell.cell_id.clone()));
            }
            if cell.carrier_frequency_mhz <= 0.0 {
                return Err(ConfigValidationError::InvalidCell(
                    cell.cell_id.clone(),
                    "carrier frequency must be positive".to_string(),
                ));
            }
            if cell.bandwidth_hz <= 0.0 {
                return Err(ConfigValidationError::InvalidCell(
                    cell.cell_id.clone(),
                    "bandwidth must be positive".to_string(),
                ));
            }
            if cell.max_prb == 0 || cell.max_dl_prb == 0 {
                return Err(ConfigValidationError::InvalidCell(
                    cell.cell_id.clone(),
                    "PRB budget must be positive".to_string(),
                ));
            }
            if cell.max_dl_prb + cell.max_ul_prb > cell.max_prb {
                return Err(ConfigValidationError::InvalidCell(
                    cell.cell_id.clone(),
                    "downlink plus uplink PRBs exceed the cell total".to_string(),
                ));
            }
        }
        for event in &bs.rrc_measurement_events {
            if event.time_to_trigger_ticks == 0 {
                return Err(ConfigValidationError::InvalidMeasEvent(
                    bs.bs_id.clone(),
                    format!("event {}: time-to-trigger must be at least one tick", event.event_id),
                ));
            }
        }
    }

    let ue = &config.ue;
    if ue.max_count == 0 {
        return Err(ConfigValidationError::InvalidUePopulation(
            "max_count must be positive".to_string(),
        ));
    }
    if ue.spawn_rate_min > ue.spawn_rate_max {
        return Err(ConfigValidationError::InvalidUePopulation(
            "spawn_rate_min exceeds spawn_rate_max".to_string(),
        ));
    }
    if ue.speed_min < 0.0 || ue.speed_min > ue.speed_max {
        return Err(ConfigValidationError::InvalidUePopulation(
            "speed range is invalid".to_string(),
        ));
    }
    if ue.temperature_k <= 0.0 {
        return Err(ConfigValidationError::InvalidUePopulation(
            "temperature must be positive".to_string(),
        ));
    }
    if ue.serving_cell_history_len == 0 {
        return Err(ConfigValidationError::InvalidUePopulation(
            "serving_cell_history_len must be positive".to_string(),
        ));
    }

    if config.time.tick_duration_s <= 0.0 {
        return Err(ConfigValidationError::InvalidTime(
            "tick duration must be positive".to_string(),
        ));
    }

    let coverage = &config.coverage;
    if coverage.width_m <= 2.0 * coverage.boundary_buffer_m
        || coverage.height_m <= 2.0 * coverage.boundary_buffer_m
    {
        return Err(ConfigValidationError::InvalidCoverage(
            "coverage area is smaller than twice the boundary buffer".to_string(),
        ));
    }

    Ok(())
}
