//! Blind A3 handover xApp
//!
//! Hands the UE over to the best neighbour on every A3 event, with no
//! further checks. Useful as a baseline policy and in tests; the
//! frequency-priority variant is the default.

use std::collections::BTreeMap;

use tracing::{debug, info};

use ransim_common::config::RrcEventId;
use ransim_common::types::BsId;
use ransim_ran::base_station::BaseStation;
use ransim_ran::events::{ControlAction, HandoverAction, RrcMeasEventHandler, RrcMeasurementEvent};
use ransim_ran::topology::CellDirectory;

use crate::xapp::XApp;

/// xApp that blindly requests a handover on every A3 measurement event.
pub struct A3HandoverBlindXApp {
    enabled: bool,
}

impl A3HandoverBlindXApp {
    pub fn new() -> Self {
        Self { enabled: true }
    }
}

impl Default for A3HandoverBlindXApp {
    fn default() -> Self {
        Self::new()
    }
}

impl XApp for A3HandoverBlindXApp {
    fn id(&self) -> &'static str {
        "A3HandoverBlind"
    }

    fn start(&mut self, base_stations: &mut BTreeMap<BsId, BaseStation>) {
        if !self.enabled {
            info!("{}: xApp is not enabled", self.id());
            return;
        }
        for bs in base_stations.values_mut() {
            bs.init_rrc_measurement_event_handler(RrcEventId::A3, Box::new(BlindHandoverPolicy));
        }
    }
}

/// The per-station handler: always hand over to the best neighbour.
struct BlindHandoverPolicy;

impl RrcMeasEventHandler for BlindHandoverPolicy {
    fn handle(
        &mut self,
        event: &RrcMeasurementEvent,
        _cells: &CellDirectory,
    ) -> Option<ControlAction> {
        let report = event.a3_report();
        debug!(
            "A3HandoverBlind: handover UE {} from {} to {}",
            event.ue_imsi, event.serving_cell_id, report.best_neighbour_cell_id
        );
        Some(ControlAction::Handover(HandoverAction {
            ue_imsi: event.ue_imsi.clone(),
            source_cell_id: event.serving_cell_id.clone(),
            target_cell_id: report.best_neighbour_cell_id.clone(),
        }))
    }
}
