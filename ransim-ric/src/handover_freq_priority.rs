//! Frequency-priority A3 handover xApp
//!
//! Hands over on an A3 event only when the target cell has an equal or
//! higher frequency priority than the source cell, or when the serving
//! signal sits at the cell's minimum receive level (which indicates the UE
//! has effectively left the source cell's coverage). This avoids
//! ping-ponging UEs down the frequency-priority ladder on offset artifacts.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use ransim_common::config::RrcEventId;
use ransim_common::types::BsId;
use ransim_ran::base_station::BaseStation;
use ransim_ran::events::{ControlAction, HandoverAction, RrcMeasEventHandler, RrcMeasurementEvent};
use ransim_ran::topology::CellDirectory;

use crate::xapp::XApp;

/// xApp that gates A3 handovers on frequency priority.
pub struct A3HandoverFreqPriorityXApp {
    enabled: bool,
}

impl A3HandoverFreqPriorityXApp {
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Default for A3HandoverFreqPriorityXApp {
    fn default() -> Self {
        Self::new()
    }
}

impl XApp for A3HandoverFreqPriorityXApp {
    fn id(&self) -> &'static str {
        "A3HandoverWithFreqPriority"
    }

    fn start(&mut self, base_stations: &mut BTreeMap<BsId, BaseStation>) {
        if !self.enabled {
            info!("{}: xApp is not enabled", self.id());
            return;
        }
        for bs in base_stations.values_mut() {
            bs.init_rrc_measurement_event_handler(
                RrcEventId::A3,
                Box::new(FreqPriorityHandoverPolicy),
            );
        }
    }
}

/// The per-station handler carrying the frequency-priority decision.
struct FreqPriorityHandoverPolicy;

impl RrcMeasEventHandler for FreqPriorityHandoverPolicy {
    fn handle(
        &mut self,
        event: &RrcMeasurementEvent,
        cells: &CellDirectory,
    ) -> Option<ControlAction> {
        let report = event.a3_report();

        let Some(source) = cells.get(&event.serving_cell_id) else {
            warn!(
                "A3HandoverWithFreqPriority: serving cell {} not in directory",
                event.serving_cell_id
            );
            return None;
        };
        let Some(target) = cells.get(&report.best_neighbour_cell_id) else {
            warn!(
                "A3HandoverWithFreqPriority: target cell {} not in directory",
                report.best_neighbour_cell_id
            );
            return None;
        };
        assert_ne!(
            source.cell_id, target.cell_id,
            "A3 report names the serving cell as its own best neighbour"
        );

        let action = ControlAction::Handover(HandoverAction {
            ue_imsi: event.ue_imsi.clone(),
            source_cell_id: event.serving_cell_id.clone(),
            target_cell_id: report.best_neighbour_cell_id.clone(),
        });

        if report.serving_cell_power_dbm <= source.qrx_level_min_dbm {
            debug!(
                "A3HandoverWithFreqPriority: UE {} serving signal at its floor, handing over",
                event.ue_imsi
            );
            return Some(action);
        }
        if target.frequency_priority >= source.frequency_priority {
            debug!(
                "A3HandoverWithFreqPriority: UE {} target priority {} >= source priority {}",
                event.ue_imsi, target.frequency_priority, source.frequency_priority
            );
            return Some(action);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ransim_common::config::CellConfig;
    use ransim_common::types::Position;
    use ransim_ran::events::{EventA3Report, RrcMeasEventReport};
    use ransim_ran::topology::CellInfo;

    fn cell_config(cell_id: &str, priority: u8) -> CellConfig {
        CellConfig {
            cell_id: cell_id.to_string(),
            frequency_band: "n78".to_string(),
            carrier_frequency_mhz: 3500.0,
            bandwidth_hz: 100e6,
            max_prb: 273,
            max_dl_prb: 136,
            max_ul_prb: 137,
            cell_radius_m: 150.0,
            transmit_power_dbm: 40.0,
            cell_individual_offset_db: 0.0,
            frequency_priority: priority,
            qrx_level_min_dbm: -100.0,
        }
    }

    fn directory(cells: &[(&str, u8)]) -> CellDirectory {
        let mut directory = CellDirectory::new();
        for (cell_id, priority) in cells {
            directory.insert(CellInfo::from_config(
                "bs_test",
                Position::new(0.0, 0.0),
                &cell_config(cell_id, *priority),
            ));
        }
        directory
    }

    fn a3_event(serving: &str, best: &str, serving_power_dbm: f64) -> RrcMeasurementEvent {
        RrcMeasurementEvent {
            event_id: RrcEventId::A3,
            ue_imsi: "IMSI_0".to_string(),
            serving_cell_id: serving.to_string(),
            report: RrcMeasEventReport::A3(EventA3Report {
                serving_cell_power_dbm: serving_power_dbm,
                best_neighbour_cell_id: best.to_string(),
                best_neighbour_power_dbm: serving_power_dbm + 10.0,
                neighbour_measurements: [(best.to_string(), serving_power_dbm + 10.0)]
                    .into_iter()
                    .collect(),
            }),
        }
    }

    #[test]
    fn test_hands_over_to_equal_or_higher_priority() {
        let directory = directory(&[("cell_low", 3), ("cell_high", 5)]);
        let mut policy = FreqPriorityHandoverPolicy;

        let action = policy.handle(&a3_event("cell_low", "cell_high", -80.0), &directory);
        assert!(matches!(action, Some(ControlAction::Handover(_))));
    }

    #[test]
    fn test_refuses_lower_priority_target_with_good_signal() {
        let directory = directory(&[("cell_low", 3), ("cell_high", 5)]);
        let mut policy = FreqPriorityHandoverPolicy;

        // serving signal well above the floor: keep the UE on the
        // higher-priority cell
        let action = policy.handle(&a3_event("cell_high", "cell_low", -80.0), &directory);
        assert!(action.is_none());
    }

    #[test]
    fn test_hands_over_when_serving_signal_at_floor() {
        let directory = directory(&[("cell_low", 3), ("cell_high", 5)]);
        let mut policy = FreqPriorityHandoverPolicy;

        // serving at the minimum receive level: hand over even to a
        // lower-priority target
        let action = policy.handle(&a3_event("cell_high", "cell_low", -100.0), &directory);
        let Some(ControlAction::Handover(handover)) = action else {
            panic!("expected a handover action");
        };
        assert_eq!(handover.target_cell_id, "cell_low");
    }

    #[test]
    fn test_unknown_cells_yield_no_action() {
        let directory = directory(&[("cell_low", 3)]);
        let mut policy = FreqPriorityHandoverPolicy;

        let action = policy.handle(&a3_event("cell_low", "cell_missing", -80.0), &directory);
        assert!(action.is_none());
    }
}
