//! User equipment: mobility and radio state machine
//!
//! A UE moves linearly towards a target, re-measures the downlink signal of
//! every cell each tick, evaluates its RRC measurement-event monitors, and
//! participates in registration and handover.
//!
//! Lifecycle: `power_up` (signal detect -> cell selection -> registration)
//! -> connected -> zero or more handovers -> deregistration when
//! `time_remaining` runs out. A UE that fails any power-up stage is never
//! admitted to the simulation.
//!
//! The UE holds no references to cells or stations; it stores the serving
//! [`CellId`] and resolves it through the [`CellDirectory`]. Effects that
//! would mutate other entities (event reports, deregistration) are returned
//! from [`Ue::step`] and applied by the engine.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use tracing::{debug, info, warn};

use ransim_common::config::{RrcMeasEventConfig, UePopulationConfig};
use ransim_common::types::{BsId, CellId, Imsi, Position, QosProfile, SliceType};
use ransim_radio::link_adaptation::McsEntry;
use ransim_radio::propagation::{dbm_to_watts, path_loss_urban_macro_nlos};
use ransim_radio::{sinr_to_cqi, thermal_noise_watts};

use crate::base_station::BaseStation;
use crate::core_network::CoreNetwork;
use crate::events::{monitor_from_config, RrcMeasEventMonitor, RrcMeasurementEvent};
use crate::topology::CellDirectory;

/// UE radio parameters shared by the whole population.
#[derive(Debug, Clone, Copy)]
pub struct UeRadioConfig {
    /// SSB detection threshold (dBm)
    pub ssb_detection_threshold_dbm: f64,
    /// Uplink transmit power (dBm)
    pub transmit_power_dbm: f64,
    /// Receiver noise temperature (K)
    pub temperature_k: f64,
    /// Bounded length of the serving-cell history
    pub serving_cell_history_len: usize,
}

impl From<&UePopulationConfig> for UeRadioConfig {
    fn from(config: &UePopulationConfig) -> Self {
        Self {
            ssb_detection_threshold_dbm: config.ssb_detection_threshold_dbm,
            transmit_power_dbm: config.transmit_power_dbm,
            temperature_k: config.temperature_k,
            serving_cell_history_len: config.serving_cell_history_len,
        }
    }
}

impl Default for UeRadioConfig {
    fn default() -> Self {
        Self::from(&UePopulationConfig::default())
    }
}

/// Rectangle the UE spawns and picks movement targets in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OperationRegion {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// One detected cell in the UE's downlink measurement map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectedCell {
    pub received_power_dbm: f64,
    /// Received power plus the cell individual offset, used for ranking
    pub received_power_with_offset_dbm: f64,
    pub frequency_priority: u8,
    pub carrier_frequency_mhz: f64,
}

/// Effects of one UE tick, applied by the engine.
#[derive(Debug, Default)]
pub struct UeStepOutcome {
    /// Measurement events to deliver to the serving base station
    pub events: Vec<RrcMeasurementEvent>,
    /// The UE's connection time ran out; deregister and remove it
    pub deregister_requested: bool,
    /// The UE arrived at its movement target
    pub target_reached: bool,
}

pub struct Ue {
    ue_imsi: Imsi,
    position: Position,
    target: Position,
    /// Movement speed (m per simulated second)
    speed: f64,
    operation_region: OperationRegion,
    /// Simulated seconds until forced deregistration
    time_remaining: f64,
    radio: UeRadioConfig,

    slice_type: Option<SliceType>,
    qos_profile: Option<QosProfile>,
    connected: bool,

    downlink_received_power: BTreeMap<CellId, DetectedCell>,
    downlink_sinr_db: f64,
    downlink_cqi: u8,
    downlink_mcs: Option<(u8, McsEntry)>,
    downlink_bitrate_bps: f64,
    downlink_latency_ms: f64,
    uplink_bitrate_bps: f64,
    uplink_latency_ms: f64,

    current_cell: Option<CellId>,
    serving_cell_history: VecDeque<Option<CellId>>,
    rrc_measurement_event_monitors: Vec<Box<dyn RrcMeasEventMonitor>>,
}

impl std::fmt::Debug for Ue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ue")
            .field("ue_imsi", &self.ue_imsi)
            .field("position", &self.position)
            .field("target", &self.target)
            .field("speed", &self.speed)
            .field("connected", &self.connected)
            .field("current_cell", &self.current_cell)
            .finish_non_exhaustive()
    }
}

impl Ue {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ue_imsi: impl Into<Imsi>,
        position: Position,
        target: Position,
        speed: f64,
        operation_region: OperationRegion,
        connection_time_s: f64,
        radio: UeRadioConfig,
    ) -> Self {
        Self {
            ue_imsi: ue_imsi.into(),
            position,
            target,
            speed,
            operation_region,
            time_remaining: connection_time_s,
            radio,
            slice_type: None,
            qos_profile: None,
            connected: false,
            downlink_received_power: BTreeMap::new(),
            downlink_sinr_db: 0.0,
            downlink_cqi: 0,
            downlink_mcs: None,
            downlink_bitrate_bps: 0.0,
            downlink_latency_ms: 0.0,
            uplink_bitrate_bps: 0.0,
            uplink_latency_ms: 0.0,
            current_cell: None,
            serving_cell_history: VecDeque::new(),
            rrc_measurement_event_monitors: Vec::new(),
        }
    }

    pub fn imsi(&self) -> &str {
        &self.ue_imsi
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn target(&self) -> Position {
        self.target
    }

    pub fn set_target(&mut self, x: f64, y: f64) {
        self.target = Position::new(x, y);
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn operation_region(&self) -> OperationRegion {
        self.operation_region
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    pub fn time_remaining(&self) -> f64 {
        self.time_remaining
    }

    pub fn slice_type(&self) -> Option<SliceType> {
        self.slice_type
    }

    pub fn qos_profile(&self) -> Option<QosProfile> {
        self.qos_profile
    }

    pub fn current_cell(&self) -> Option<&str> {
        self.current_cell.as_deref()
    }

    pub fn serving_cell_history(&self) -> impl Iterator<Item = Option<&str>> {
        self.serving_cell_history.iter().map(|c| c.as_deref())
    }

    pub fn detected_cells(&self) -> &BTreeMap<CellId, DetectedCell> {
        &self.downlink_received_power
    }

    pub fn downlink_sinr_db(&self) -> f64 {
        self.downlink_sinr_db
    }

    pub fn downlink_cqi(&self) -> u8 {
        self.downlink_cqi
    }

    pub fn downlink_mcs(&self) -> Option<(u8, McsEntry)> {
        self.downlink_mcs
    }

    pub fn set_downlink_mcs(&mut self, mcs: Option<(u8, McsEntry)>) {
        self.downlink_mcs = mcs;
    }

    pub fn downlink_bitrate_bps(&self) -> f64 {
        self.downlink_bitrate_bps
    }

    pub fn set_downlink_bitrate(&mut self, bitrate_bps: f64) {
        self.downlink_bitrate_bps = bitrate_bps;
    }

    pub fn uplink_transmit_power_dbm(&self) -> f64 {
        self.radio.transmit_power_dbm
    }

    pub fn dist_to_target(&self) -> f64 {
        self.position.distance_to(self.target)
    }

    pub fn target_reached(&self) -> bool {
        self.dist_to_target() == 0.0
    }

    /// Runs the power-up sequence: signal detection, cell selection and
    /// camping, authentication and registration. Returns false if any stage
    /// fails; a failed UE is not admitted to the simulation.
    pub fn power_up(
        &mut self,
        cells: &CellDirectory,
        stations: &mut BTreeMap<BsId, BaseStation>,
        core: &mut CoreNetwork,
        requested_slice: Option<SliceType>,
    ) -> bool {
        info!("UE {}: powering up", self.ue_imsi);
        self.monitor_signal_strength(cells);

        if self.downlink_received_power.is_empty() {
            info!("UE {}: no cells detected, powering down", self.ue_imsi);
            return false;
        }

        if !self.cell_selection_and_camping() {
            warn!("UE {}: cell selection and camping failed", self.ue_imsi);
            return false;
        }

        if !self.authenticate_and_register(cells, stations, core, requested_slice) {
            warn!("UE {}: authentication and registration failed", self.ue_imsi);
            return false;
        }

        self.connected = true;
        true
    }

    /// Measures the downlink received power of every cell in the network.
    ///
    /// A cell is kept when its received power exceeds the SSB detection
    /// threshold and the cell's minimum receive level. The serving cell is
    /// always kept (clamped at the detection floor) so it is never lost
    /// mid-tick. Finishes by recomputing SINR and CQI.
    pub fn monitor_signal_strength(&mut self, cells: &CellDirectory) {
        self.downlink_received_power.clear();
        self.downlink_sinr_db = 0.0;
        self.downlink_cqi = 0;

        for info in cells.iter() {
            // clamp close-in distances to keep the model in its valid domain
            let distance = self.position.distance_to(info.position).max(1.0);
            let path_loss = match path_loss_urban_macro_nlos(distance, info.carrier_frequency_ghz())
            {
                Ok(loss) => loss,
                Err(err) => {
                    warn!("UE {}: path loss for cell {} failed: {err}", self.ue_imsi, info.cell_id);
                    continue;
                }
            };

            let received_power_dbm = info.transmit_power_dbm - path_loss;
            if received_power_dbm > self.radio.ssb_detection_threshold_dbm
                && received_power_dbm >= info.qrx_level_min_dbm
            {
                self.downlink_received_power.insert(
                    info.cell_id.clone(),
                    DetectedCell {
                        received_power_dbm,
                        received_power_with_offset_dbm: received_power_dbm
                            + info.cell_individual_offset_db,
                        frequency_priority: info.frequency_priority,
                        carrier_frequency_mhz: info.carrier_frequency_mhz,
                    },
                );
            } else if self.current_cell.as_deref() == Some(info.cell_id.as_str()) {
                let floor = self.radio.ssb_detection_threshold_dbm;
                self.downlink_received_power.insert(
                    info.cell_id.clone(),
                    DetectedCell {
                        received_power_dbm: floor,
                        received_power_with_offset_dbm: floor + info.cell_individual_offset_db,
                        frequency_priority: info.frequency_priority,
                        carrier_frequency_mhz: info.carrier_frequency_mhz,
                    },
                );
            }
        }

        self.calculate_sinr_and_cqi(cells);
    }

    /// Computes downlink SINR and the CQI it maps to. A no-op without a
    /// serving cell.
    ///
    /// Interference is the sum of received powers on the serving carrier
    /// frequency, serving cell excluded; noise is thermal (`k * T * B`).
    pub fn calculate_sinr_and_cqi(&mut self, cells: &CellDirectory) {
        let Some(serving_id) = self.current_cell.clone() else {
            return;
        };
        let Some(serving_info) = cells.get(&serving_id) else {
            warn!("UE {}: serving cell {serving_id} not in directory", self.ue_imsi);
            return;
        };

        let serving_power_dbm = self
            .downlink_received_power
            .get(&serving_id)
            .map(|c| c.received_power_dbm)
            .unwrap_or(serving_info.qrx_level_min_dbm);
        let serving_power_w = dbm_to_watts(serving_power_dbm);

        let interference_w: f64 = self
            .downlink_received_power
            .iter()
            .filter(|(cell_id, detected)| {
                cell_id.as_str() != serving_id
                    && detected.carrier_frequency_mhz == serving_info.carrier_frequency_mhz
            })
            .map(|(_, detected)| dbm_to_watts(detected.received_power_dbm))
            .sum();

        let noise_w = thermal_noise_watts(self.radio.temperature_k, serving_info.bandwidth_hz);

        self.downlink_sinr_db = 10.0 * (serving_power_w / (interference_w + noise_w)).log10();
        self.downlink_cqi = sinr_to_cqi(self.downlink_sinr_db);
    }

    /// Ranks detected cells by frequency priority, then offset-adjusted
    /// power, and camps on the best one. Fails only when nothing was
    /// detected.
    pub fn cell_selection_and_camping(&mut self) -> bool {
        if self.downlink_received_power.is_empty() {
            return false;
        }

        let mut candidates: Vec<(&CellId, &DetectedCell)> =
            self.downlink_received_power.iter().collect();
        candidates.sort_by(|a, b| {
            b.1.frequency_priority.cmp(&a.1.frequency_priority).then_with(|| {
                b.1.received_power_with_offset_dbm
                    .total_cmp(&a.1.received_power_with_offset_dbm)
            })
        });

        for (cell_id, detected) in &candidates {
            debug!(
                "UE {}: detected SSB {} at {:.1} dBm (priority {})",
                self.ue_imsi,
                cell_id,
                detected.received_power_with_offset_dbm,
                detected.frequency_priority
            );
        }

        let best = candidates[0].0.clone();
        self.set_current_cell(Some(best));
        true
    }

    fn authenticate_and_register(
        &mut self,
        cells: &CellDirectory,
        stations: &mut BTreeMap<BsId, BaseStation>,
        core: &mut CoreNetwork,
        requested_slice: Option<SliceType>,
    ) -> bool {
        let Some(serving_id) = self.current_cell.clone() else {
            return false;
        };
        let Some(serving_info) = cells.get(&serving_id) else {
            return false;
        };
        let Some(station) = stations.get_mut(&serving_info.bs_id) else {
            return false;
        };

        match station.handle_ue_authentication_and_registration(
            &self.ue_imsi,
            &serving_id,
            requested_slice,
            core,
        ) {
            Ok(registration) => {
                self.slice_type = Some(registration.slice_type);
                self.qos_profile = Some(registration.qos_profile);
                self.setup_rrc_measurement_event_monitors(&registration.rrc_meas_events);
                true
            }
            Err(err) => {
                warn!("UE {}: registration rejected: {err}", self.ue_imsi);
                false
            }
        }
    }

    fn setup_rrc_measurement_event_monitors(&mut self, events: &[RrcMeasEventConfig]) {
        self.rrc_measurement_event_monitors =
            events.iter().map(monitor_from_config).collect();
    }

    /// Feeds this tick's measurements to every monitor and collects reports
    /// from the ones that triggered.
    pub fn check_rrc_meas_events_to_monitor(&mut self) -> Vec<RrcMeasurementEvent> {
        let signal_map: BTreeMap<CellId, f64> = self
            .downlink_received_power
            .iter()
            .map(|(cell_id, detected)| (cell_id.clone(), detected.received_power_with_offset_dbm))
            .collect();

        let serving = self.current_cell.clone();
        let mut reports = Vec::new();
        for monitor in &mut self.rrc_measurement_event_monitors {
            monitor.check(serving.as_deref(), &signal_map);
            if monitor.is_triggered() {
                if let Some(event) = monitor.event_report(&self.ue_imsi) {
                    info!(
                        "UE {}: RRC measurement event {} triggered",
                        self.ue_imsi,
                        monitor.event_id()
                    );
                    reports.push(event);
                }
            }
        }
        reports
    }

    /// Switches the UE onto `target_cell_id` after the network side of the
    /// handover completed.
    ///
    /// All live radio state is cleared to force re-measurement in the new
    /// cell context, and every monitor's trigger history restarts. Panics
    /// if the UE is already served by the target cell; the handover path
    /// must never produce a no-op handover.
    pub fn execute_handover(&mut self, target_cell_id: &str) {
        self.downlink_received_power.clear();
        self.downlink_sinr_db = 0.0;
        self.downlink_cqi = 0;
        self.downlink_mcs = None;
        self.downlink_bitrate_bps = 0.0;
        self.downlink_latency_ms = 0.0;
        self.uplink_bitrate_bps = 0.0;
        self.uplink_latency_ms = 0.0;

        self.set_current_cell(Some(target_cell_id.to_string()));

        for monitor in &mut self.rrc_measurement_event_monitors {
            monitor.reset_trigger_history();
        }
    }

    fn set_current_cell(&mut self, cell: Option<CellId>) {
        match &cell {
            Some(cell_id) => {
                if let Some(Some(last)) = self.serving_cell_history.back() {
                    assert_ne!(
                        last, cell_id,
                        "UE {}: already served by cell {cell_id}",
                        self.ue_imsi
                    );
                }
                self.serving_cell_history.push_back(Some(cell_id.clone()));
            }
            None => {
                if let Some(last) = self.serving_cell_history.back() {
                    assert!(
                        last.is_some(),
                        "UE {}: not served by any cell",
                        self.ue_imsi
                    );
                }
                self.serving_cell_history.push_back(None);
            }
        }
        self.current_cell = cell;

        while self.serving_cell_history.len() > self.radio.serving_cell_history_len {
            self.serving_cell_history.pop_front();
        }
    }

    /// Finishes a deregistration after the serving station and core network
    /// released the UE.
    pub fn complete_deregistration(&mut self) {
        info!("UE {}: deregistered", self.ue_imsi);
        self.set_current_cell(None);
        self.connected = false;
    }

    fn move_towards_target(&mut self, delta_time: f64) {
        let dist_to_target = self.dist_to_target();
        let max_move_dist = self.speed * delta_time;
        if dist_to_target <= max_move_dist {
            self.position = self.target;
        } else {
            let ratio = max_move_dist / dist_to_target;
            let x = self.position.x + (self.target.x - self.position.x) * ratio;
            let y = self.position.y + (self.target.y - self.position.y) * ratio;
            // the coverage grid is integer-valued
            self.position = Position::new(x.round(), y.round());
        }
    }

    /// One simulation tick: move, re-measure, evaluate monitors, and burn
    /// connection time. The returned outcome carries the effects the engine
    /// must apply (event delivery, deregistration).
    pub fn step(&mut self, delta_time: f64, cells: &CellDirectory) -> UeStepOutcome {
        self.move_towards_target(delta_time);
        self.monitor_signal_strength(cells);
        let events = self.check_rrc_meas_events_to_monitor();

        self.time_remaining -= delta_time;
        let deregister_requested = self.time_remaining <= 0.0;
        if deregister_requested {
            info!("UE {}: connection time expired, requesting deregistration", self.ue_imsi);
        }

        UeStepOutcome {
            events,
            deregister_requested,
            target_reached: self.target_reached(),
        }
    }

    /// Serializable snapshot for the knowledge/query layer.
    pub fn snapshot(&self, cells: &CellDirectory) -> UeSnapshot {
        let current_bs = self
            .current_cell
            .as_deref()
            .and_then(|cell_id| cells.get(cell_id))
            .map(|info| info.bs_id.clone());

        UeSnapshot {
            ue_imsi: self.ue_imsi.clone(),
            position_x: self.position.x,
            position_y: self.position.y,
            target_x: self.target.x,
            target_y: self.target.y,
            speed: self.speed,
            slice_type: self.slice_type,
            qos_profile: self.qos_profile,
            current_cell: self.current_cell.clone(),
            current_bs,
            connected: self.connected,
            time_remaining: self.time_remaining,
            serving_cell_history: self.serving_cell_history.iter().cloned().collect(),
            downlink_bitrate_bps: self.downlink_bitrate_bps,
            downlink_latency_ms: self.downlink_latency_ms,
            uplink_bitrate_bps: self.uplink_bitrate_bps,
            uplink_latency_ms: self.uplink_latency_ms,
            downlink_received_power: self.downlink_received_power.clone(),
            downlink_sinr_db: self.downlink_sinr_db,
            downlink_cqi: self.downlink_cqi,
            downlink_mcs_index: self.downlink_mcs.map(|(index, _)| index),
            downlink_mcs: self.downlink_mcs.map(|(_, entry)| entry),
        }
    }
}

#[cfg(test)]
impl Ue {
    /// Installs registration state directly, bypassing the network side.
    pub(crate) fn apply_registration_for_test(&mut self, slice: SliceType, qos: QosProfile) {
        self.slice_type = Some(slice);
        self.qos_profile = Some(qos);
        self.connected = true;
    }

    pub(crate) fn set_downlink_cqi_for_test(&mut self, cqi: u8) {
        self.downlink_cqi = cqi;
    }

    pub(crate) fn set_current_cell_for_test(&mut self, cell_id: &str) {
        self.set_current_cell(Some(cell_id.to_string()));
    }
}

/// Point-in-time view of a UE, serialized for external consumers.
#[derive(Debug, Clone, Serialize)]
pub struct UeSnapshot {
    pub ue_imsi: Imsi,
    pub position_x: f64,
    pub position_y: f64,
    pub target_x: f64,
    pub target_y: f64,
    pub speed: f64,
    pub slice_type: Option<SliceType>,
    pub qos_profile: Option<QosProfile>,
    pub current_cell: Option<CellId>,
    pub current_bs: Option<BsId>,
    pub connected: bool,
    pub time_remaining: f64,
    pub serving_cell_history: Vec<Option<CellId>>,
    pub downlink_bitrate_bps: f64,
    pub downlink_latency_ms: f64,
    pub uplink_bitrate_bps: f64,
    pub uplink_latency_ms: f64,
    pub downlink_received_power: BTreeMap<CellId, DetectedCell>,
    pub downlink_sinr_db: f64,
    pub downlink_cqi: u8,
    pub downlink_mcs_index: Option<u8>,
    pub downlink_mcs: Option<McsEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ransim_common::config::CellConfig;
    use ransim_common::types::Position;
    use ransim_radio::propagation::path_loss_urban_macro_nlos;

    use crate::topology::{CellDirectory, CellInfo};

    fn test_region() -> OperationRegion {
        OperationRegion { min_x: 0.0, max_x: 1000.0, min_y: 0.0, max_y: 800.0 }
    }

    fn test_cell_config(cell_id: &str, carrier_mhz: f64, priority: u8, offset_db: f64) -> CellConfig {
        CellConfig {
            cell_id: cell_id.to_string(),
            frequency_band: "n78".to_string(),
            carrier_frequency_mhz: carrier_mhz,
            bandwidth_hz: 20e6,
            max_prb: 100,
            max_dl_prb: 100,
            max_ul_prb: 100,
            cell_radius_m: 300.0,
            transmit_power_dbm: 40.0,
            cell_individual_offset_db: offset_db,
            frequency_priority: priority,
            qrx_level_min_dbm: -100.0,
        }
    }

    fn directory_with(cells: &[(&str, Position, f64, u8, f64)]) -> CellDirectory {
        let mut directory = CellDirectory::new();
        for (cell_id, position, carrier, priority, offset) in cells {
            let config = test_cell_config(cell_id, *carrier, *priority, *offset);
            directory.insert(CellInfo::from_config("bs_test", *position, &config));
        }
        directory
    }

    fn test_ue(position: Position) -> Ue {
        Ue::new(
            "IMSI_0",
            position,
            position,
            0.0,
            test_region(),
            20.0,
            UeRadioConfig::default(),
        )
    }

    #[test]
    fn test_move_towards_target_snaps_and_rounds() {
        let mut ue = Ue::new(
            "IMSI_0",
            Position::new(0.0, 0.0),
            Position::new(10.0, 0.0),
            3.0,
            test_region(),
            20.0,
            UeRadioConfig::default(),
        );

        ue.move_towards_target(1.0);
        assert_eq!(ue.position(), Position::new(3.0, 0.0));

        ue.move_towards_target(1.0);
        ue.move_towards_target(1.0);
        assert_eq!(ue.position(), Position::new(9.0, 0.0));

        // within one step of the target: snap to it
        ue.move_towards_target(1.0);
        assert_eq!(ue.position(), Position::new(10.0, 0.0));
        assert!(ue.target_reached());
    }

    #[test]
    fn test_move_rounds_to_integer_grid() {
        let mut ue = Ue::new(
            "IMSI_0",
            Position::new(0.0, 0.0),
            Position::new(10.0, 10.0),
            2.0,
            test_region(),
            20.0,
            UeRadioConfig::default(),
        );
        ue.move_towards_target(1.0);
        // 2 / sqrt(200) of the diagonal is ~1.414 in each axis, rounded to 1
        assert_eq!(ue.position(), Position::new(1.0, 1.0));
    }

    #[test]
    fn test_monitor_signal_strength_detects_cells_in_range() {
        let directory = directory_with(&[
            ("cell_near", Position::new(100.0, 0.0), 3500.0, 5, 0.0),
            ("cell_far", Position::new(10_000.0, 0.0), 3500.0, 5, 0.0),
        ]);
        let mut ue = test_ue(Position::new(0.0, 0.0));

        ue.monitor_signal_strength(&directory);

        // near cell: 40 dBm - ~102.6 dB path loss at 100 m well above -100 dBm
        assert!(ue.detected_cells().contains_key("cell_near"));
        // far cell is below the minimum receive level
        assert!(!ue.detected_cells().contains_key("cell_far"));
    }

    #[test]
    fn test_serving_cell_kept_at_detection_floor() {
        let directory = directory_with(&[
            ("cell_a", Position::new(100.0, 0.0), 3500.0, 5, 2.0),
            ("cell_b", Position::new(10_000.0, 0.0), 3500.0, 5, 2.0),
        ]);
        let mut ue = test_ue(Position::new(0.0, 0.0));
        ue.set_current_cell(Some("cell_b".to_string()));

        ue.monitor_signal_strength(&directory);

        // out of range, but serving: clamped at the detection threshold
        let serving = &ue.detected_cells()["cell_b"];
        assert_eq!(serving.received_power_dbm, -110.0);
        assert_eq!(serving.received_power_with_offset_dbm, -108.0);
    }

    #[test]
    fn test_sinr_and_cqi_deterministic() {
        // two same-carrier cells at fixed distances; no randomness anywhere
        let directory = directory_with(&[
            ("cell_a", Position::new(100.0, 0.0), 3500.0, 5, 0.0),
            ("cell_b", Position::new(400.0, 0.0), 3500.0, 5, 0.0),
        ]);
        let mut ue = test_ue(Position::new(0.0, 0.0));
        ue.set_current_cell(Some("cell_a".to_string()));

        ue.monitor_signal_strength(&directory);
        let first_sinr = ue.downlink_sinr_db();
        let first_cqi = ue.downlink_cqi();

        ue.monitor_signal_strength(&directory);
        assert_eq!(ue.downlink_sinr_db(), first_sinr);
        assert_eq!(ue.downlink_cqi(), first_cqi);

        // independently derived expectation
        let serving_dbm = 40.0 - path_loss_urban_macro_nlos(100.0, 3.5).unwrap();
        let interferer_dbm = 40.0 - path_loss_urban_macro_nlos(400.0, 3.5).unwrap();
        let noise_w = thermal_noise_watts(290.0, 20e6);
        let expected_sinr = 10.0
            * (dbm_to_watts(serving_dbm) / (dbm_to_watts(interferer_dbm) + noise_w)).log10();
        assert!((first_sinr - expected_sinr).abs() < 1e-9);
        assert_eq!(first_cqi, sinr_to_cqi(expected_sinr));
    }

    #[test]
    fn test_cell_selection_prefers_priority_then_power() {
        let directory = directory_with(&[
            // strongest signal but lowest priority
            ("cell_low", Position::new(50.0, 0.0), 2100.0, 3, 0.0),
            // weaker signal, higher priority: must win
            ("cell_high", Position::new(200.0, 0.0), 3500.0, 5, 0.0),
            ("cell_high_weak", Position::new(300.0, 0.0), 3500.0, 5, 0.0),
        ]);
        let mut ue = test_ue(Position::new(0.0, 0.0));

        ue.monitor_signal_strength(&directory);
        assert!(ue.cell_selection_and_camping());
        assert_eq!(ue.current_cell(), Some("cell_high"));
    }

    #[test]
    fn test_handover_resets_radio_state_and_monitors() {
        let directory = directory_with(&[
            ("cell_a", Position::new(100.0, 0.0), 3500.0, 5, 0.0),
            ("cell_b", Position::new(150.0, 0.0), 3500.0, 5, 0.0),
        ]);
        let mut ue = test_ue(Position::new(0.0, 0.0));
        ue.set_current_cell(Some("cell_a".to_string()));
        ue.setup_rrc_measurement_event_monitors(&[RrcMeasEventConfig {
            power_threshold_db: -100.0, // always satisfied
            ..Default::default()
        }]);

        ue.monitor_signal_strength(&directory);
        ue.set_downlink_bitrate(5e6);

        // push the monitor towards triggering
        let _ = ue.check_rrc_meas_events_to_monitor();
        let _ = ue.check_rrc_meas_events_to_monitor();

        ue.execute_handover("cell_b");
        assert_eq!(ue.current_cell(), Some("cell_b"));
        assert!(ue.detected_cells().is_empty());
        assert_eq!(ue.downlink_bitrate_bps(), 0.0);
        assert_eq!(ue.downlink_cqi(), 0);

        // monitor history restarted: needs the full time-to-trigger again
        ue.monitor_signal_strength(&directory);
        let events = ue.check_rrc_meas_events_to_monitor();
        assert!(events.is_empty());
    }

    #[test]
    #[should_panic(expected = "already served")]
    fn test_handover_to_serving_cell_panics() {
        let mut ue = test_ue(Position::new(0.0, 0.0));
        ue.set_current_cell(Some("cell_a".to_string()));
        ue.execute_handover("cell_a");
    }

    #[test]
    fn test_serving_cell_history_bounded() {
        let mut ue = test_ue(Position::new(0.0, 0.0));
        ue.set_current_cell(Some("cell_0".to_string()));
        for i in 1..25 {
            ue.execute_handover(&format!("cell_{i}"));
        }
        let history: Vec<_> = ue.serving_cell_history().collect();
        assert_eq!(history.len(), 10);
        assert_eq!(history.last().copied().flatten(), Some("cell_24"));
    }

    #[test]
    fn test_step_requests_deregistration_when_time_expires() {
        let directory = directory_with(&[("cell_a", Position::new(100.0, 0.0), 3500.0, 5, 0.0)]);
        let mut ue = Ue::new(
            "IMSI_0",
            Position::new(0.0, 0.0),
            Position::new(0.0, 0.0),
            0.0,
            test_region(),
            1.0,
            UeRadioConfig::default(),
        );
        ue.set_current_cell(Some("cell_a".to_string()));

        let outcome = ue.step(1.0, &directory);
        assert!(outcome.deregister_requested);

        ue.complete_deregistration();
        assert!(!ue.connected());
        assert_eq!(ue.current_cell(), None);
    }
}
