//! Configuration structures for the simulated network
//!
//! The `Default` implementations reproduce the reference deployment: a
//! 4x3 grid of base stations, each carrying a low-band (n1), mid-band (n78)
//! and mmWave (n258) cell, with an A3 measurement event configured on every
//! station.

use serde::{Deserialize, Serialize};

use crate::clock::SimulationTimeConfig;
use crate::types::{BsId, CellId, QosProfile, SliceType};

/// RRC measurement event identifiers (3GPP TS 38.331 section 5.5.4).
///
/// Only A3 ("neighbour becomes offset better than serving") is implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RrcEventId {
    A3,
}

impl std::fmt::Display for RrcEventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RrcEventId::A3 => write!(f, "A3"),
        }
    }
}

/// Configuration of one RRC measurement event monitored by registered UEs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrcMeasEventConfig {
    /// Event to monitor
    pub event_id: RrcEventId,
    /// Offset the neighbour must exceed the serving cell by (dB)
    pub power_threshold_db: f64,
    /// Number of consecutive ticks the condition must hold before the event
    /// fires. Time-to-trigger is normally expressed in milliseconds; the
    /// simulation counts ticks instead.
    pub time_to_trigger_ticks: u32,
}

impl Default for RrcMeasEventConfig {
    fn default() -> Self {
        Self {
            event_id: RrcEventId::A3,
            power_threshold_db: 3.0,
            time_to_trigger_ticks: 3,
        }
    }
}

/// Static radio parameters of a single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellConfig {
    pub cell_id: CellId,
    /// NR operating band, e.g. "n78"
    pub frequency_band: String,
    pub carrier_frequency_mhz: f64,
    pub bandwidth_hz: f64,
    /// Total physical resource blocks
    pub max_prb: u32,
    /// PRBs reserved for downlink scheduling
    pub max_dl_prb: u32,
    /// PRBs reserved for uplink scheduling
    pub max_ul_prb: u32,
    /// Nominal coverage radius (m), used for display only
    pub cell_radius_m: f64,
    pub transmit_power_dbm: f64,
    /// Cell individual offset applied when ranking this cell (dB)
    pub cell_individual_offset_db: f64,
    /// Higher values are preferred during cell selection
    pub frequency_priority: u8,
    /// Minimum receive level for the cell to be considered (dBm)
    pub qrx_level_min_dbm: f64,
}

/// Configuration of a base station and the cells it owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseStationConfig {
    pub bs_id: BsId,
    pub position_x: f64,
    pub position_y: f64,
    pub cells: Vec<CellConfig>,
    /// Measurement events every UE registered here is told to monitor
    pub rrc_measurement_events: Vec<RrcMeasEventConfig>,
}

/// Bounds of the coverage area UEs operate within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageConfig {
    pub width_m: f64,
    pub height_m: f64,
    /// UEs spawn and move at least this far from the area edge
    pub boundary_buffer_m: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            width_m: 1000.0,
            height_m: 800.0,
            boundary_buffer_m: 10.0,
        }
    }
}

/// UE population and radio parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UePopulationConfig {
    /// Global cap on concurrently simulated UEs
    pub max_count: u32,
    /// Minimum UEs spawned per tick
    pub spawn_rate_min: u32,
    /// Maximum UEs spawned per tick
    pub spawn_rate_max: u32,
    /// Ticks until a UE deregisters itself
    pub default_connection_time_ticks: u32,
    /// Minimum UE speed (m per tick)
    pub speed_min: f64,
    /// Maximum UE speed (m per tick)
    pub speed_max: f64,
    /// SSB detection threshold (dBm); weaker cells are invisible
    pub ssb_detection_threshold_dbm: f64,
    /// UE uplink transmit power (dBm)
    pub transmit_power_dbm: f64,
    /// UE receiver noise temperature (K)
    pub temperature_k: f64,
    /// Bounded length of the serving-cell history kept per UE
    pub serving_cell_history_len: usize,
}

impl Default for UePopulationConfig {
    fn default() -> Self {
        Self {
            max_count: 100,
            spawn_rate_min: 1,
            spawn_rate_max: 5,
            default_connection_time_ticks: 20,
            speed_min: 10.0,
            speed_max: 20.0,
            ssb_detection_threshold_dbm: -110.0,
            transmit_power_dbm: 23.0,
            temperature_k: 290.0,
            serving_cell_history_len: 10,
        }
    }
}

/// Near-RT RIC configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RicConfig {
    /// xApps to load, by registry name. A station accepts exactly one
    /// handler per event type, so xApps competing for the same event must
    /// not be enabled together.
    pub xapps: Vec<String>,
}

impl Default for RicConfig {
    fn default() -> Self {
        Self {
            xapps: vec!["a3-handover-freq-priority".to_string()],
        }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub time: SimulationTimeConfig,
    pub coverage: CoverageConfig,
    pub ue: UePopulationConfig,
    /// Canonical slice table: slice type -> QoS profile
    pub slices: std::collections::BTreeMap<SliceType, QosProfile>,
    pub base_stations: Vec<BaseStationConfig>,
    pub ric: RicConfig,
    /// RNG seed for reproducible runs; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time: SimulationTimeConfig::default(),
            coverage: CoverageConfig::default(),
            ue: UePopulationConfig::default(),
            slices: default_slice_table(),
            base_stations: default_base_station_grid(),
            ric: RicConfig::default(),
            seed: None,
        }
    }
}

/// The canonical slice/QoS table.
pub fn default_slice_table() -> std::collections::BTreeMap<SliceType, QosProfile> {
    let mut slices = std::collections::BTreeMap::new();
    slices.insert(
        SliceType::Embb,
        QosProfile {
            five_qi: 9,
            gbr_dl_bps: 100e6,
            gbr_ul_bps: 50e6,
            latency_dl_ms: 10.0,
            latency_ul_ms: 10.0,
        },
    );
    slices.insert(
        SliceType::Urllc,
        QosProfile {
            five_qi: 1,
            gbr_dl_bps: 10e6,
            gbr_ul_bps: 5e6,
            latency_dl_ms: 0.5,
            latency_ul_ms: 0.5,
        },
    );
    slices.insert(
        SliceType::Mmtc,
        QosProfile {
            five_qi: 5,
            gbr_dl_bps: 1e6,
            gbr_ul_bps: 0.5e6,
            latency_dl_ms: 25.0,
            latency_ul_ms: 25.0,
        },
    );
    slices
}

/// The three default cells carried by every base station.
pub fn default_cells(bs_id: &str) -> Vec<CellConfig> {
    vec![
        CellConfig {
            cell_id: format!("{bs_id}_cell_low_freq"),
            frequency_band: "n1".to_string(),
            carrier_frequency_mhz: 2100.0,
            bandwidth_hz: 20e6,
            max_prb: 106,
            max_dl_prb: 53,
            max_ul_prb: 53,
            cell_radius_m: 300.0,
            transmit_power_dbm: 40.0,
            cell_individual_offset_db: 0.0,
            frequency_priority: 3,
            qrx_level_min_dbm: -100.0,
        },
        CellConfig {
            cell_id: format!("{bs_id}_cell_mid_freq"),
            frequency_band: "n78".to_string(),
            carrier_frequency_mhz: 3500.0,
            bandwidth_hz: 100e6,
            max_prb: 273,
            max_dl_prb: 136,
            max_ul_prb: 137,
            cell_radius_m: 150.0,
            transmit_power_dbm: 40.0,
            cell_individual_offset_db: 5.0,
            frequency_priority: 5,
            qrx_level_min_dbm: -100.0,
        },
        CellConfig {
            cell_id: format!("{bs_id}_cell_high_freq"),
            frequency_band: "n258".to_string(),
            carrier_frequency_mhz: 26000.0,
            bandwidth_hz: 400e6,
            max_prb: 264,
            max_dl_prb: 132,
            max_ul_prb: 132,
            cell_radius_m: 50.0,
            // reached through beamforming gain on mmWave
            transmit_power_dbm: 40.0,
            cell_individual_offset_db: 10.0,
            frequency_priority: 7,
            qrx_level_min_dbm: -100.0,
        },
    ]
}

/// The default 4x3 grid of base stations.
pub fn default_base_station_grid() -> Vec<BaseStationConfig> {
    let mut stations = Vec::new();
    for (row, y) in [(1, 200.0), (2, 400.0), (3, 600.0)] {
        for (col, x) in [(1, 200.0), (2, 400.0), (3, 600.0), (4, 800.0)] {
            let bs_id = format!("bs_{row}{col}");
            stations.push(BaseStationConfig {
                cells: default_cells(&bs_id),
                rrc_measurement_events: vec![RrcMeasEventConfig::default()],
                bs_id,
                position_x: x,
                position_y: y,
            });
        }
    }
    stations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_grid_shape() {
        let stations = default_base_station_grid();
        assert_eq!(stations.len(), 12);
        assert_eq!(stations[0].bs_id, "bs_11");
        assert_eq!(stations[11].bs_id, "bs_34");
        for bs in &stations {
            assert_eq!(bs.cells.len(), 3);
            assert_eq!(bs.rrc_measurement_events.len(), 1);
        }
    }

    #[test]
    fn test_default_cell_ids_unique() {
        let stations = default_base_station_grid();
        let mut seen = std::collections::BTreeSet::new();
        for bs in &stations {
            for cell in &bs.cells {
                assert!(seen.insert(cell.cell_id.clone()), "duplicate {}", cell.cell_id);
            }
        }
        assert_eq!(seen.len(), 36);
    }

    #[test]
    fn test_default_slice_table() {
        let slices = default_slice_table();
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[&SliceType::Embb].five_qi, 9);
        assert_eq!(slices[&SliceType::Urllc].gbr_dl_bps, 10e6);
        assert_eq!(slices[&SliceType::Mmtc].latency_dl_ms, 25.0);
    }

    #[test]
    fn test_config_yaml_round_trip() {
        let config = SimulationConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: SimulationConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let parsed: SimulationConfig = serde_yaml::from_str("seed: 42\n").unwrap();
        assert_eq!(parsed.seed, Some(42));
        assert_eq!(parsed.base_stations.len(), 12);
        assert_eq!(parsed.ue.max_count, 100);
    }
}
