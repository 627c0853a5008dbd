//! Common types and utilities for ransim
//!
//! This crate provides shared types, configuration structures, and utilities
//! used across all ransim crates.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use clock::{SimulationClock, SimulationTimeConfig};
pub use config::{
    BaseStationConfig, CellConfig, CoverageConfig, RicConfig, RrcEventId, RrcMeasEventConfig,
    SimulationConfig, UePopulationConfig,
};
pub use error::Error;
pub use logging::{init_logging, init_logging_with_filter, LogLevel};
pub use types::{BsId, CellId, Imsi, Position, QosProfile, SliceType};
