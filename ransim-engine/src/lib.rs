//! Simulation engine for the ransim RAN simulator
//!
//! The engine owns every network entity (core network, base stations with
//! their cells, UEs, the RIC) and drives the per-tick pipeline:
//! spawn new UEs, step UEs (movement, measurement, event reporting), step
//! base stations (scheduling, event dispatch, handover), step the RIC.
//!
//! The tick body is single-threaded and runs to completion; external
//! consumers read state through snapshots or the engine's accessors
//! between ticks, and external mutation (runtime UE admission/removal)
//! goes through engine methods called between ticks.

pub mod config_loader;
pub mod engine;
pub mod snapshot;

pub use config_loader::{
    load_simulation_config, validate_simulation_config, ConfigError, ConfigValidationError,
};
pub use engine::SimulationEngine;
pub use snapshot::SimulationSnapshot;
