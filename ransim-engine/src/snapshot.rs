//! Whole-simulation snapshots
//!
//! The only externally visible "format" of the simulator: a JSON-friendly
//! view of every entity, assembled per tick for the knowledge/query layer
//! and any display frontend. No cross-version compatibility guarantees
//! beyond the field names.

use serde::Serialize;

use ransim_ran::base_station::BaseStationSnapshot;
use ransim_ran::cell::CellSnapshot;
use ransim_ran::ue::UeSnapshot;

/// Point-in-time view of the whole simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationSnapshot {
    /// The tick this snapshot was taken at
    pub time_step: u64,
    pub base_stations: Vec<BaseStationSnapshot>,
    pub cells: Vec<CellSnapshot>,
    pub ues: Vec<UeSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use ransim_common::config::SimulationConfig;

    use crate::engine::SimulationEngine;

    #[test]
    fn test_snapshot_serializes_to_json() {
        let mut config = SimulationConfig::default();
        config.seed = Some(1);
        config.base_stations.truncate(1);
        let mut engine = SimulationEngine::new(config).unwrap();
        engine.network_setup().unwrap();
        engine.step(1.0);

        let snapshot = engine.snapshot();
        let json = serde_json::to_value(&snapshot).unwrap();

        assert!(json["base_stations"].is_array());
        assert!(json["cells"].is_array());
        assert!(json["ues"].is_array());
        assert_eq!(json["cells"].as_array().unwrap().len(), 3);

        // the fields the knowledge layer reads are present per UE
        if let Some(ue) = json["ues"].as_array().unwrap().first() {
            assert!(ue.get("ue_imsi").is_some());
            assert!(ue.get("connected").is_some());
            assert!(ue.get("downlink_sinr_db").is_some());
            assert!(ue.get("downlink_cqi").is_some());
            assert!(ue.get("qos_profile").is_some());
        }
    }
}
