//! Network elements of the ransim RAN simulator
//!
//! This crate implements the radio access network entities and their
//! per-tick behavior:
//!
//! - [`ue::Ue`] — mobility, downlink signal monitoring, SINR/CQI
//!   calculation, RRC measurement-event monitoring, registration and
//!   handover participation
//! - [`cell::Cell`] — per-tick radio resource scheduling (MCS selection,
//!   QoS-aware proportional-fair PRB allocation, throughput estimation)
//! - [`base_station::BaseStation`] — UE registry, RRC measurement-event
//!   queue and handler dispatch, handover orchestration
//! - [`core_network::CoreNetwork`] — slice and QoS profile assignment
//!
//! Entities never hold references to each other; they are linked by string
//! identities resolved through the static [`topology::CellDirectory`], and
//! cross-entity effects are returned as values and applied by the
//! simulation engine in a fixed per-tick order.

pub mod base_station;
pub mod cell;
pub mod core_network;
pub mod events;
pub mod topology;
pub mod ue;

pub use base_station::{execute_handover, BaseStation, RegistrationData, RegistryEntry};
pub use cell::{Cell, PrbAllocation};
pub use core_network::CoreNetwork;
pub use events::{
    monitor_from_config, ControlAction, EventA3Monitor, EventA3Report, HandoverAction,
    RrcMeasEventHandler, RrcMeasEventReport, RrcMeasEventMonitor, RrcMeasurementEvent,
};
pub use topology::{CellDirectory, CellInfo};
pub use ue::{Ue, UeRadioConfig, UeStepOutcome};
