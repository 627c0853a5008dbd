//! Base station: registration, event dispatch, handover orchestration
//!
//! A base station owns its cells, keeps the authoritative registry of the
//! UEs it serves, queues the RRC measurement events those UEs report, and
//! drains the queue each tick through the handlers xApps registered at RIC
//! load time. Control actions collected from the handlers are arbitrated:
//! executing a handover changes load and SINR for both cells involved,
//! invalidating the assumptions behind every other pending action, so at
//! most one handover is executed per station per tick.
//!
//! Invariant: a UE appears in at most one station's registry at a time, and
//! its serving cell belongs to that station. Violations are orchestration
//! bugs and fail loudly.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use tracing::{debug, info, warn};

use ransim_common::config::{BaseStationConfig, RrcEventId, RrcMeasEventConfig};
use ransim_common::error::Result;
use ransim_common::types::{BsId, CellId, Imsi, Position, QosProfile, SliceType};

use crate::cell::{Cell, CellSnapshot};
use crate::core_network::CoreNetwork;
use crate::events::{ControlAction, HandoverAction, RrcMeasEventHandler, RrcMeasurementEvent};
use crate::topology::{CellDirectory, CellInfo};
use crate::ue::Ue;

/// Registration response returned to the UE so it can install its RRC
/// measurement-event monitors.
#[derive(Debug, Clone)]
pub struct RegistrationData {
    pub slice_type: SliceType,
    pub qos_profile: QosProfile,
    pub rrc_meas_events: Vec<RrcMeasEventConfig>,
}

/// Authoritative record of one served UE.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    pub slice_type: SliceType,
    pub qos_profile: QosProfile,
    /// The cell currently serving the UE; always one of this station's
    pub cell_id: CellId,
    /// The event types this UE was told to monitor
    pub rrc_meas_events: Vec<RrcMeasEventConfig>,
}

pub struct BaseStation {
    bs_id: BsId,
    position: Position,
    cells: BTreeMap<CellId, Cell>,
    rrc_measurement_events: Vec<RrcMeasEventConfig>,
    ue_registry: BTreeMap<Imsi, RegistryEntry>,
    ue_rrc_meas_events: VecDeque<RrcMeasurementEvent>,
    event_handlers: BTreeMap<RrcEventId, Box<dyn RrcMeasEventHandler>>,
    ric_control_actions: Vec<ControlAction>,
}

impl std::fmt::Debug for BaseStation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseStation")
            .field("bs_id", &self.bs_id)
            .field("position", &self.position)
            .field("cells", &self.cells.keys().collect::<Vec<_>>())
            .field("ue_registry", &self.ue_registry.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl BaseStation {
    pub fn from_config(config: &BaseStationConfig) -> Self {
        let position = Position::new(config.position_x, config.position_y);
        let cells = config
            .cells
            .iter()
            .map(|cell_config| {
                let info = CellInfo::from_config(&config.bs_id, position, cell_config);
                (cell_config.cell_id.clone(), Cell::new(info))
            })
            .collect();

        Self {
            bs_id: config.bs_id.clone(),
            position,
            cells,
            rrc_measurement_events: config.rrc_measurement_events.clone(),
            ue_registry: BTreeMap::new(),
            ue_rrc_meas_events: VecDeque::new(),
            event_handlers: BTreeMap::new(),
            ric_control_actions: Vec::new(),
        }
    }

    pub fn bs_id(&self) -> &str {
        &self.bs_id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn cells(&self) -> &BTreeMap<CellId, Cell> {
        &self.cells
    }

    pub fn cell(&self, cell_id: &str) -> Option<&Cell> {
        self.cells.get(cell_id)
    }

    pub fn cell_mut(&mut self, cell_id: &str) -> Option<&mut Cell> {
        self.cells.get_mut(cell_id)
    }

    pub fn rrc_measurement_events(&self) -> &[RrcMeasEventConfig] {
        &self.rrc_measurement_events
    }

    pub fn ue_registry(&self) -> &BTreeMap<Imsi, RegistryEntry> {
        &self.ue_registry
    }

    pub fn registry_entry(&self, imsi: &str) -> Option<&RegistryEntry> {
        self.ue_registry.get(imsi)
    }

    pub fn queued_event_count(&self) -> usize {
        self.ue_rrc_meas_events.len()
    }

    pub fn has_event_handler(&self, event_id: RrcEventId) -> bool {
        self.event_handlers.contains_key(&event_id)
    }

    pub fn ric_control_actions(&self) -> &[ControlAction] {
        &self.ric_control_actions
    }

    /// Registers a UE: the core network picks slice and QoS, the registry
    /// records the UE, and the serving cell admits it. Returns the
    /// registration data the UE needs to set up its monitors.
    ///
    /// Panics if `serving_cell_id` does not belong to this station.
    pub fn handle_ue_authentication_and_registration(
        &mut self,
        imsi: &str,
        serving_cell_id: &str,
        requested_slice: Option<SliceType>,
        core: &mut CoreNetwork,
    ) -> Result<RegistrationData> {
        let Some(cell) = self.cells.get_mut(serving_cell_id) else {
            panic!("BS {}: cell {serving_cell_id} does not belong to this station", self.bs_id);
        };

        let (slice_type, qos_profile) =
            core.handle_ue_authentication_and_registration(imsi, requested_slice)?;

        self.ue_registry.insert(
            imsi.to_string(),
            RegistryEntry {
                slice_type,
                qos_profile,
                cell_id: serving_cell_id.to_string(),
                rrc_meas_events: self.rrc_measurement_events.clone(),
            },
        );
        cell.register_ue(imsi);

        info!(
            "BS {}: registered UE {imsi} on cell {serving_cell_id} (slice {slice_type})",
            self.bs_id
        );

        Ok(RegistrationData {
            slice_type,
            qos_profile,
            rrc_meas_events: self.rrc_measurement_events.clone(),
        })
    }

    /// Releases a UE: notifies the core network, deregisters the UE from
    /// its serving cell, removes the registry entry, and purges any of its
    /// still-queued events. A no-op (with a log) for unknown UEs.
    pub fn handle_deregistration_request(&mut self, imsi: &str, core: &mut CoreNetwork) {
        core.handle_deregistration_request(imsi);

        match self.ue_registry.remove(imsi) {
            Some(entry) => {
                if let Some(cell) = self.cells.get_mut(&entry.cell_id) {
                    cell.deregister_ue(imsi);
                }
                self.ue_rrc_meas_events.retain(|event| event.ue_imsi != imsi);
                info!("BS {}: UE {imsi} deregistered and resources released", self.bs_id);
            }
            None => {
                warn!("BS {}: UE {imsi} not in registry, nothing to deregister", self.bs_id);
            }
        }
    }

    /// Accepts an event report from a served UE and queues it for this
    /// tick's processing.
    ///
    /// Panics when the event is inconsistent with this station's live state
    /// (unknown cell, unregistered UE, serving-cell mismatch); such an
    /// event indicates a bug in the orchestration, e.g. a race between
    /// handover execution and event generation.
    pub fn receive_ue_rrc_meas_events(&mut self, event: RrcMeasurementEvent) {
        assert!(
            self.cells.contains_key(&event.serving_cell_id),
            "BS {}: event for UE {} names cell {} which is not ours",
            self.bs_id,
            event.ue_imsi,
            event.serving_cell_id
        );
        let entry = self.ue_registry.get(&event.ue_imsi).unwrap_or_else(|| {
            panic!("BS {}: event from unregistered UE {}", self.bs_id, event.ue_imsi)
        });
        assert_eq!(
            entry.cell_id, event.serving_cell_id,
            "BS {}: UE {} reported from cell {} but is registered on cell {}",
            self.bs_id, event.ue_imsi, event.serving_cell_id, entry.cell_id
        );

        debug!(
            "BS {}: received RRC measurement event {} from UE {}",
            self.bs_id, event.event_id, event.ue_imsi
        );
        self.ue_rrc_meas_events.push_back(event);
    }

    /// Registers the handler for one event type. Called once per event type
    /// by an xApp at RIC load time; duplicate registration is a bug.
    pub fn init_rrc_measurement_event_handler(
        &mut self,
        event_id: RrcEventId,
        handler: Box<dyn RrcMeasEventHandler>,
    ) {
        assert!(
            !self.event_handlers.contains_key(&event_id),
            "BS {}: handler for event {event_id} already registered",
            self.bs_id
        );
        self.event_handlers.insert(event_id, handler);
    }

    /// One station tick: step every cell's scheduler, then drain the event
    /// queue through the registered handlers and arbitrate the collected
    /// control actions. Returns the single handover to execute, if any.
    pub fn step(
        &mut self,
        delta_time: f64,
        ues: &mut BTreeMap<Imsi, Ue>,
        directory: &CellDirectory,
    ) -> Option<HandoverAction> {
        for cell in self.cells.values_mut() {
            cell.step(delta_time, ues);
        }

        self.ric_control_actions.clear();

        while let Some(event) = self.ue_rrc_meas_events.pop_front() {
            let Some(handler) = self.event_handlers.get_mut(&event.event_id) else {
                debug!(
                    "BS {}: no handler for event {}, skipping",
                    self.bs_id, event.event_id
                );
                continue;
            };

            if let Some(action) = handler.handle(&event, directory) {
                self.ric_control_actions.push(action);
            }
            debug!(
                "BS {}: processed RRC measurement event {} for UE {}",
                self.bs_id, event.event_id, event.ue_imsi
            );
        }

        self.process_ric_control_actions()
    }

    /// Arbitrates this tick's control actions: the first handover action in
    /// arrival order wins; every other pending handover is dropped for this
    /// tick (it re-triggers next tick if its conditions persist).
    fn process_ric_control_actions(&mut self) -> Option<HandoverAction> {
        let mut selected: Option<HandoverAction> = None;
        for action in &self.ric_control_actions {
            match action {
                ControlAction::Handover(handover) => {
                    if selected.is_none() {
                        selected = Some(handover.clone());
                    } else {
                        debug!(
                            "BS {}: dropping additional handover action for UE {} this tick",
                            self.bs_id, handover.ue_imsi
                        );
                    }
                }
            }
        }
        selected
    }

    fn take_registry_entry(&mut self, imsi: &str) -> RegistryEntry {
        self.ue_registry.remove(imsi).unwrap_or_else(|| {
            panic!("BS {}: UE {imsi} is not in the registry", self.bs_id)
        })
    }

    fn insert_registry_entry(&mut self, imsi: &str, entry: RegistryEntry) {
        self.ue_registry.insert(imsi.to_string(), entry);
    }

    fn set_registry_cell(&mut self, imsi: &str, cell_id: &str) {
        let entry = self.ue_registry.get_mut(imsi).unwrap_or_else(|| {
            panic!("BS {}: UE {imsi} is not in the registry", self.bs_id)
        });
        entry.cell_id = cell_id.to_string();
    }

    /// Serializable snapshot for the knowledge/query layer.
    pub fn snapshot(&self) -> BaseStationSnapshot {
        BaseStationSnapshot {
            bs_id: self.bs_id.clone(),
            position_x: self.position.x,
            position_y: self.position.y,
            ue_registry: self.ue_registry.keys().cloned().collect(),
            cells: self.cells.values().map(Cell::snapshot).collect(),
        }
    }
}

/// Point-in-time view of a base station, serialized for external consumers.
#[derive(Debug, Clone, Serialize)]
pub struct BaseStationSnapshot {
    pub bs_id: BsId,
    pub position_x: f64,
    pub position_y: f64,
    pub ue_registry: Vec<Imsi>,
    pub cells: Vec<CellSnapshot>,
}

/// Executes a handover, moving `action.ue_imsi` from the source cell to
/// the target cell.
///
/// Intra-station handovers update the station's registry in place;
/// inter-station handovers move the registry entry to the target station
/// (which substitutes its own measurement-event list). Every precondition
/// is asserted before the first mutation, so a failed check leaves no
/// partial state behind.
pub fn execute_handover(
    stations: &mut BTreeMap<BsId, BaseStation>,
    ues: &mut BTreeMap<Imsi, Ue>,
    directory: &CellDirectory,
    action: &HandoverAction,
) {
    let HandoverAction { ue_imsi, source_cell_id, target_cell_id } = action;

    assert_ne!(source_cell_id, target_cell_id, "source and target cell must differ");
    let source_info = directory
        .get(source_cell_id)
        .unwrap_or_else(|| panic!("unknown source cell {source_cell_id}"));
    let target_info = directory
        .get(target_cell_id)
        .unwrap_or_else(|| panic!("unknown target cell {target_cell_id}"));
    let ue = ues
        .get_mut(ue_imsi)
        .unwrap_or_else(|| panic!("unknown UE {ue_imsi}"));
    assert_eq!(
        ue.current_cell(),
        Some(source_cell_id.as_str()),
        "UE {ue_imsi} is not served by source cell {source_cell_id}"
    );

    // validate station-side state up front; nothing is mutated on failure
    {
        let source_bs = stations
            .get(&source_info.bs_id)
            .unwrap_or_else(|| panic!("unknown base station {}", source_info.bs_id));
        let source_cell = source_bs
            .cell(source_cell_id)
            .unwrap_or_else(|| panic!("cell {source_cell_id} not on BS {}", source_info.bs_id));
        assert!(
            source_cell.is_ue_connected(ue_imsi),
            "UE {ue_imsi} is not connected to source cell {source_cell_id}"
        );
        assert!(
            source_bs.ue_registry.contains_key(ue_imsi),
            "UE {ue_imsi} is not registered at BS {}",
            source_info.bs_id
        );

        let target_bs = stations
            .get(&target_info.bs_id)
            .unwrap_or_else(|| panic!("unknown base station {}", target_info.bs_id));
        let target_cell = target_bs
            .cell(target_cell_id)
            .unwrap_or_else(|| panic!("cell {target_cell_id} not on BS {}", target_info.bs_id));
        assert!(
            !target_cell.is_ue_connected(ue_imsi),
            "UE {ue_imsi} is already connected to target cell {target_cell_id}"
        );
    }

    if source_info.bs_id == target_info.bs_id {
        let bs = stations
            .get_mut(&source_info.bs_id)
            .expect("validated above");

        bs.cells.get_mut(target_cell_id).expect("validated above").register_ue(ue_imsi);
        ue.execute_handover(target_cell_id);
        bs.set_registry_cell(ue_imsi, target_cell_id);
        bs.cells.get_mut(source_cell_id).expect("validated above").deregister_ue(ue_imsi);

        info!(
            "BS {}: handover UE {ue_imsi} from cell {source_cell_id} to cell {target_cell_id}",
            source_info.bs_id
        );
    } else {
        let mut entry = stations
            .get_mut(&source_info.bs_id)
            .expect("validated above")
            .take_registry_entry(ue_imsi);

        {
            let target_bs = stations
                .get_mut(&target_info.bs_id)
                .expect("validated above");
            entry.cell_id = target_cell_id.clone();
            entry.rrc_meas_events = target_bs.rrc_measurement_events.clone();
            target_bs.insert_registry_entry(ue_imsi, entry);
            target_bs
                .cells
                .get_mut(target_cell_id)
                .expect("validated above")
                .register_ue(ue_imsi);
        }

        ue.execute_handover(target_cell_id);

        stations
            .get_mut(&source_info.bs_id)
            .expect("validated above")
            .cells
            .get_mut(source_cell_id)
            .expect("validated above")
            .deregister_ue(ue_imsi);

        info!(
            "BS {}: handover UE {ue_imsi} from cell {source_cell_id} to BS {} cell {target_cell_id}",
            source_info.bs_id, target_info.bs_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ransim_common::config::{default_cells, default_slice_table, BaseStationConfig};
    use ransim_common::config::RrcEventId;
    use ransim_common::types::Position;

    use crate::events::{EventA3Report, RrcMeasEventReport};
    use crate::ue::{OperationRegion, UeRadioConfig};

    fn bs_config(bs_id: &str, x: f64, y: f64) -> BaseStationConfig {
        BaseStationConfig {
            bs_id: bs_id.to_string(),
            position_x: x,
            position_y: y,
            cells: default_cells(bs_id),
            rrc_measurement_events: vec![RrcMeasEventConfig::default()],
        }
    }

    fn build_network(bs_ids: &[(&str, f64, f64)]) -> (BTreeMap<BsId, BaseStation>, CellDirectory) {
        let mut stations = BTreeMap::new();
        let mut directory = CellDirectory::new();
        for (bs_id, x, y) in bs_ids {
            let config = bs_config(bs_id, *x, *y);
            let bs = BaseStation::from_config(&config);
            for cell in bs.cells().values() {
                directory.insert(cell.info().clone());
            }
            stations.insert(bs_id.to_string(), bs);
        }
        (stations, directory)
    }

    fn test_core() -> CoreNetwork {
        let mut core = CoreNetwork::new(default_slice_table(), Some(7));
        core.seed_subscriptions(10);
        core
    }

    fn powered_ue(
        imsi: &str,
        position: Position,
        stations: &mut BTreeMap<BsId, BaseStation>,
        directory: &CellDirectory,
        core: &mut CoreNetwork,
    ) -> Ue {
        let region = OperationRegion { min_x: 0.0, max_x: 1000.0, min_y: 0.0, max_y: 800.0 };
        let mut ue = Ue::new(imsi, position, position, 0.0, region, 20.0, UeRadioConfig::default());
        assert!(ue.power_up(directory, stations, core, None));
        ue
    }

    fn a3_event(imsi: &str, serving: &str, target: &str) -> RrcMeasurementEvent {
        RrcMeasurementEvent {
            event_id: RrcEventId::A3,
            ue_imsi: imsi.to_string(),
            serving_cell_id: serving.to_string(),
            report: RrcMeasEventReport::A3(EventA3Report {
                serving_cell_power_dbm: -90.0,
                best_neighbour_cell_id: target.to_string(),
                best_neighbour_power_dbm: -80.0,
                neighbour_measurements: [(target.to_string(), -80.0)].into_iter().collect(),
            }),
        }
    }

    struct AlwaysHandover;
    impl RrcMeasEventHandler for AlwaysHandover {
        fn handle(
            &mut self,
            event: &RrcMeasurementEvent,
            _cells: &CellDirectory,
        ) -> Option<ControlAction> {
            let report = event.a3_report();
            Some(ControlAction::Handover(HandoverAction {
                ue_imsi: event.ue_imsi.clone(),
                source_cell_id: event.serving_cell_id.clone(),
                target_cell_id: report.best_neighbour_cell_id.clone(),
            }))
        }
    }

    #[test]
    fn test_registration_records_ue_in_registry_and_cell() {
        let (mut stations, directory) = build_network(&[("bs_11", 200.0, 200.0)]);
        let mut core = test_core();

        let ue = powered_ue("IMSI_0", Position::new(210.0, 200.0), &mut stations, &directory, &mut core);

        let bs = &stations["bs_11"];
        let entry = bs.registry_entry("IMSI_0").expect("registry entry");
        assert_eq!(entry.cell_id, ue.current_cell().unwrap());
        assert!(bs.cell(&entry.cell_id).unwrap().is_ue_connected("IMSI_0"));
        assert_eq!(core.active_ue_count(), 1);
        assert_eq!(ue.slice_type(), Some(entry.slice_type));
    }

    #[test]
    fn test_deregistration_round_trip_restores_state() {
        let (mut stations, directory) = build_network(&[("bs_11", 200.0, 200.0)]);
        let mut core = test_core();

        let ue = powered_ue("IMSI_0", Position::new(210.0, 200.0), &mut stations, &directory, &mut core);
        let serving = ue.current_cell().unwrap().to_string();

        let bs = stations.get_mut("bs_11").unwrap();
        bs.handle_deregistration_request("IMSI_0", &mut core);

        assert!(bs.registry_entry("IMSI_0").is_none());
        assert!(!bs.cell(&serving).unwrap().is_ue_connected("IMSI_0"));
        assert!(bs.cell(&serving).unwrap().prb_allocation().is_empty());
        assert_eq!(core.active_ue_count(), 0);
    }

    #[test]
    fn test_deregistration_unknown_ue_is_noop() {
        let (mut stations, _directory) = build_network(&[("bs_11", 200.0, 200.0)]);
        let mut core = test_core();

        let bs = stations.get_mut("bs_11").unwrap();
        bs.handle_deregistration_request("IMSI_99", &mut core);
        assert!(bs.ue_registry().is_empty());
    }

    #[test]
    fn test_deregistration_purges_queued_events() {
        let (mut stations, directory) = build_network(&[("bs_11", 200.0, 200.0)]);
        let mut core = test_core();
        let ue = powered_ue("IMSI_0", Position::new(210.0, 200.0), &mut stations, &directory, &mut core);
        let serving = ue.current_cell().unwrap().to_string();

        let bs = stations.get_mut("bs_11").unwrap();
        bs.receive_ue_rrc_meas_events(a3_event("IMSI_0", &serving, "bs_11_cell_low_freq"));
        assert_eq!(bs.queued_event_count(), 1);

        bs.handle_deregistration_request("IMSI_0", &mut core);
        assert_eq!(bs.queued_event_count(), 0);
    }

    #[test]
    #[should_panic(expected = "unregistered UE")]
    fn test_event_from_unregistered_ue_panics() {
        let (mut stations, _directory) = build_network(&[("bs_11", 200.0, 200.0)]);
        let bs = stations.get_mut("bs_11").unwrap();
        bs.receive_ue_rrc_meas_events(a3_event("IMSI_9", "bs_11_cell_mid_freq", "bs_11_cell_low_freq"));
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_handler_registration_panics() {
        let (mut stations, _directory) = build_network(&[("bs_11", 200.0, 200.0)]);
        let bs = stations.get_mut("bs_11").unwrap();
        bs.init_rrc_measurement_event_handler(RrcEventId::A3, Box::new(AlwaysHandover));
        bs.init_rrc_measurement_event_handler(RrcEventId::A3, Box::new(AlwaysHandover));
    }

    #[test]
    fn test_intra_station_handover_moves_ue_between_cells() {
        let (mut stations, directory) = build_network(&[("bs_11", 200.0, 200.0)]);
        let mut core = test_core();
        let ue = powered_ue("IMSI_0", Position::new(210.0, 200.0), &mut stations, &directory, &mut core);
        let source = ue.current_cell().unwrap().to_string();
        let target = "bs_11_cell_low_freq".to_string();
        assert_ne!(source, target);

        let mut ues: BTreeMap<Imsi, Ue> = BTreeMap::new();
        ues.insert("IMSI_0".to_string(), ue);

        let action = HandoverAction {
            ue_imsi: "IMSI_0".to_string(),
            source_cell_id: source.clone(),
            target_cell_id: target.clone(),
        };
        execute_handover(&mut stations, &mut ues, &directory, &action);

        let bs = &stations["bs_11"];
        assert_eq!(bs.registry_entry("IMSI_0").unwrap().cell_id, target);
        assert!(!bs.cell(&source).unwrap().is_ue_connected("IMSI_0"));
        assert!(bs.cell(&target).unwrap().is_ue_connected("IMSI_0"));
        assert_eq!(ues["IMSI_0"].current_cell(), Some(target.as_str()));
    }

    #[test]
    fn test_inter_station_handover_moves_registry_entry() {
        let (mut stations, directory) =
            build_network(&[("bs_11", 200.0, 200.0), ("bs_12", 400.0, 200.0)]);
        let mut core = test_core();
        let ue = powered_ue("IMSI_0", Position::new(210.0, 200.0), &mut stations, &directory, &mut core);
        let source = ue.current_cell().unwrap().to_string();
        assert!(source.starts_with("bs_11"));
        let target = "bs_12_cell_mid_freq".to_string();

        let mut ues: BTreeMap<Imsi, Ue> = BTreeMap::new();
        ues.insert("IMSI_0".to_string(), ue);

        let action = HandoverAction {
            ue_imsi: "IMSI_0".to_string(),
            source_cell_id: source.clone(),
            target_cell_id: target.clone(),
        };
        execute_handover(&mut stations, &mut ues, &directory, &action);

        // registry entry moved: present at exactly one station
        assert!(stations["bs_11"].registry_entry("IMSI_0").is_none());
        let entry = stations["bs_12"].registry_entry("IMSI_0").expect("moved entry");
        assert_eq!(entry.cell_id, target);
        assert!(!stations["bs_11"].cell(&source).unwrap().is_ue_connected("IMSI_0"));
        assert!(stations["bs_12"].cell(&target).unwrap().is_ue_connected("IMSI_0"));
        assert_eq!(ues["IMSI_0"].current_cell(), Some(target.as_str()));
    }

    #[test]
    #[should_panic(expected = "source and target cell must differ")]
    fn test_handover_to_same_cell_panics() {
        let (mut stations, directory) = build_network(&[("bs_11", 200.0, 200.0)]);
        let mut core = test_core();
        let ue = powered_ue("IMSI_0", Position::new(210.0, 200.0), &mut stations, &directory, &mut core);
        let serving = ue.current_cell().unwrap().to_string();

        let mut ues: BTreeMap<Imsi, Ue> = BTreeMap::new();
        ues.insert("IMSI_0".to_string(), ue);

        let action = HandoverAction {
            ue_imsi: "IMSI_0".to_string(),
            source_cell_id: serving.clone(),
            target_cell_id: serving,
        };
        execute_handover(&mut stations, &mut ues, &directory, &action);
    }

    #[test]
    #[should_panic(expected = "already connected to target cell")]
    fn test_handover_to_already_connected_cell_panics() {
        let (mut stations, directory) = build_network(&[("bs_11", 200.0, 200.0)]);
        let mut core = test_core();
        let ue = powered_ue("IMSI_0", Position::new(210.0, 200.0), &mut stations, &directory, &mut core);
        let serving = ue.current_cell().unwrap().to_string();
        let target = "bs_11_cell_low_freq".to_string();

        let mut ues: BTreeMap<Imsi, Ue> = BTreeMap::new();
        ues.insert("IMSI_0".to_string(), ue);

        // corrupt the state: the target cell already carries the UE
        stations
            .get_mut("bs_11")
            .unwrap()
            .cell_mut(&target)
            .unwrap()
            .register_ue("IMSI_0");

        let action = HandoverAction {
            ue_imsi: "IMSI_0".to_string(),
            source_cell_id: serving,
            target_cell_id: target,
        };
        execute_handover(&mut stations, &mut ues, &directory, &action);
    }

    #[test]
    fn test_step_executes_at_most_one_handover() {
        let (mut stations, directory) = build_network(&[("bs_11", 200.0, 200.0)]);
        let mut core = test_core();
        let ue_a = powered_ue("IMSI_0", Position::new(210.0, 200.0), &mut stations, &directory, &mut core);
        let ue_b = powered_ue("IMSI_1", Position::new(190.0, 200.0), &mut stations, &directory, &mut core);
        let serving_a = ue_a.current_cell().unwrap().to_string();
        let serving_b = ue_b.current_cell().unwrap().to_string();

        let mut ues: BTreeMap<Imsi, Ue> = BTreeMap::new();
        ues.insert("IMSI_0".to_string(), ue_a);
        ues.insert("IMSI_1".to_string(), ue_b);

        let bs = stations.get_mut("bs_11").unwrap();
        bs.init_rrc_measurement_event_handler(RrcEventId::A3, Box::new(AlwaysHandover));

        // two conflicting events for two UEs in the same tick
        bs.receive_ue_rrc_meas_events(a3_event("IMSI_0", &serving_a, "bs_11_cell_low_freq"));
        bs.receive_ue_rrc_meas_events(a3_event("IMSI_1", &serving_b, "bs_11_cell_low_freq"));

        let selected = bs.step(1.0, &mut ues, &directory);
        let action = selected.expect("one handover selected");
        assert_eq!(action.ue_imsi, "IMSI_0");
        assert_eq!(bs.queued_event_count(), 0);

        execute_handover(&mut stations, &mut ues, &directory, &action);

        // exactly one UE moved; the other still camps on its original cell
        assert_eq!(ues["IMSI_0"].current_cell(), Some("bs_11_cell_low_freq"));
        assert_eq!(ues["IMSI_1"].current_cell(), Some(serving_b.as_str()));
    }

    #[test]
    fn test_step_without_handler_drops_events() {
        let (mut stations, directory) = build_network(&[("bs_11", 200.0, 200.0)]);
        let mut core = test_core();
        let ue = powered_ue("IMSI_0", Position::new(210.0, 200.0), &mut stations, &directory, &mut core);
        let serving = ue.current_cell().unwrap().to_string();

        let mut ues: BTreeMap<Imsi, Ue> = BTreeMap::new();
        ues.insert("IMSI_0".to_string(), ue);

        let bs = stations.get_mut("bs_11").unwrap();
        bs.receive_ue_rrc_meas_events(a3_event("IMSI_0", &serving, "bs_11_cell_low_freq"));

        let selected = bs.step(1.0, &mut ues, &directory);
        assert!(selected.is_none());
        assert_eq!(bs.queued_event_count(), 0);
    }
}
