//! Static cell topology
//!
//! Cells are owned by their base stations, but UEs, xApps, and the
//! handover path all need to resolve a cell identity into its static radio
//! parameters and owning station. The [`CellDirectory`] provides that
//! lookup without reference cycles: entities hold [`CellId`] strings and
//! resolve them here.

use std::collections::BTreeMap;

use serde::Serialize;

use ransim_common::config::CellConfig;
use ransim_common::types::{BsId, CellId, Position};

/// Static radio parameters of one cell, plus its owning base station.
///
/// Everything here is fixed at network setup; per-tick cell state lives in
/// [`crate::cell::Cell`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellInfo {
    pub cell_id: CellId,
    pub bs_id: BsId,
    /// Cell position (the owning base station's position)
    pub position: Position,
    pub frequency_band: String,
    pub carrier_frequency_mhz: f64,
    pub bandwidth_hz: f64,
    pub max_prb: u32,
    pub max_dl_prb: u32,
    pub max_ul_prb: u32,
    pub cell_radius_m: f64,
    pub transmit_power_dbm: f64,
    pub cell_individual_offset_db: f64,
    pub frequency_priority: u8,
    pub qrx_level_min_dbm: f64,
}

impl CellInfo {
    /// Builds the static info for a cell owned by the station at
    /// `bs_position`.
    pub fn from_config(bs_id: &str, bs_position: Position, config: &CellConfig) -> Self {
        Self {
            cell_id: config.cell_id.clone(),
            bs_id: bs_id.to_string(),
            position: bs_position,
            frequency_band: config.frequency_band.clone(),
            carrier_frequency_mhz: config.carrier_frequency_mhz,
            bandwidth_hz: config.bandwidth_hz,
            max_prb: config.max_prb,
            max_dl_prb: config.max_dl_prb,
            max_ul_prb: config.max_ul_prb,
            cell_radius_m: config.cell_radius_m,
            transmit_power_dbm: config.transmit_power_dbm,
            cell_individual_offset_db: config.cell_individual_offset_db,
            frequency_priority: config.frequency_priority,
            qrx_level_min_dbm: config.qrx_level_min_dbm,
        }
    }

    pub fn carrier_frequency_ghz(&self) -> f64 {
        self.carrier_frequency_mhz / 1000.0
    }
}

/// Lookup table from cell identity to static cell parameters, covering
/// every cell in the simulated network.
#[derive(Debug, Clone, Default)]
pub struct CellDirectory {
    cells: BTreeMap<CellId, CellInfo>,
}

impl CellDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a cell. Cell identities are globally unique.
    pub fn insert(&mut self, info: CellInfo) {
        assert!(
            !self.cells.contains_key(&info.cell_id),
            "cell {} already exists in the directory",
            info.cell_id
        );
        self.cells.insert(info.cell_id.clone(), info);
    }

    pub fn get(&self, cell_id: &str) -> Option<&CellInfo> {
        self.cells.get(cell_id)
    }

    pub fn contains(&self, cell_id: &str) -> bool {
        self.cells.contains_key(cell_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CellInfo> {
        self.cells.values()
    }

    pub fn cell_ids(&self) -> impl Iterator<Item = &CellId> {
        self.cells.keys()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
