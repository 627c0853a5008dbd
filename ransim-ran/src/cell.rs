//! Cell: per-tick radio resource scheduling
//!
//! Each tick a cell runs, in order: uplink signal monitoring, MCS selection
//! from each UE's reported CQI, QoS-aware proportional-fair PRB allocation
//! against the guaranteed bit rates, and downlink throughput estimation.
//!
//! Invariant: every UE in `connected_ues` has exactly one entry in
//! `prb_allocation`, and the converse.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use ransim_common::types::{CellId, Imsi};
use ransim_radio::link_adaptation::{cqi_entry, estimate_throughput, mcs_table};
use ransim_radio::propagation::path_loss_urban_macro_nlos;

use crate::topology::CellInfo;
use crate::ue::Ue;

/// PRBs granted to one UE this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrbAllocation {
    pub downlink: u32,
    pub uplink: u32,
}

pub struct Cell {
    info: CellInfo,
    connected_ues: BTreeSet<Imsi>,
    prb_allocation: BTreeMap<Imsi, PrbAllocation>,
    ue_uplink_signal_dbm: BTreeMap<Imsi, f64>,
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("cell_id", &self.info.cell_id)
            .field("bs_id", &self.info.bs_id)
            .field("connected_ues", &self.connected_ues)
            .finish_non_exhaustive()
    }
}

impl Cell {
    pub fn new(info: CellInfo) -> Self {
        Self {
            info,
            connected_ues: BTreeSet::new(),
            prb_allocation: BTreeMap::new(),
            ue_uplink_signal_dbm: BTreeMap::new(),
        }
    }

    pub fn cell_id(&self) -> &str {
        &self.info.cell_id
    }

    pub fn info(&self) -> &CellInfo {
        &self.info
    }

    pub fn connected_ues(&self) -> &BTreeSet<Imsi> {
        &self.connected_ues
    }

    pub fn is_ue_connected(&self, imsi: &str) -> bool {
        self.connected_ues.contains(imsi)
    }

    pub fn prb_allocation(&self) -> &BTreeMap<Imsi, PrbAllocation> {
        &self.prb_allocation
    }

    pub fn ue_uplink_signal_dbm(&self) -> &BTreeMap<Imsi, f64> {
        &self.ue_uplink_signal_dbm
    }

    pub fn allocated_dl_prb(&self) -> u32 {
        self.prb_allocation.values().map(|a| a.downlink).sum()
    }

    pub fn allocated_ul_prb(&self) -> u32 {
        self.prb_allocation.values().map(|a| a.uplink).sum()
    }

    pub fn allocated_prb(&self) -> u32 {
        self.allocated_dl_prb() + self.allocated_ul_prb()
    }

    pub fn current_load(&self) -> f64 {
        self.allocated_prb() as f64 / self.info.max_prb as f64
    }

    pub fn current_dl_load(&self) -> f64 {
        self.allocated_dl_prb() as f64 / self.info.max_dl_prb as f64
    }

    pub fn current_ul_load(&self) -> f64 {
        self.allocated_ul_prb() as f64 / self.info.max_ul_prb as f64
    }

    /// Adds a UE to this cell's scheduling scope with an empty allocation.
    pub fn register_ue(&mut self, imsi: &str) {
        self.connected_ues.insert(imsi.to_string());
        self.prb_allocation.insert(imsi.to_string(), PrbAllocation::default());
    }

    /// Removes a UE and releases its resources. Safe to call for a UE that
    /// was never registered here.
    pub fn deregister_ue(&mut self, imsi: &str) {
        if self.prb_allocation.remove(imsi).is_some() {
            info!("Cell {}: released resources for UE {imsi}", self.info.cell_id);
        } else {
            warn!("Cell {}: no resources to release for UE {imsi}", self.info.cell_id);
        }

        if self.connected_ues.remove(imsi) {
            info!("Cell {}: deregistered UE {imsi}", self.info.cell_id);
        } else {
            warn!("Cell {}: no UE {imsi} to deregister", self.info.cell_id);
        }
    }

    /// One scheduling round over the connected UEs.
    pub fn step(&mut self, _delta_time: f64, ues: &mut BTreeMap<Imsi, Ue>) {
        self.monitor_ue_signal_strength(ues);
        self.select_ue_mcs(ues);
        self.allocate_prb(ues);
        self.estimate_ue_bitrate_and_latency(ues);
    }

    fn connected_ue<'a>(&self, ues: &'a BTreeMap<Imsi, Ue>, imsi: &str) -> &'a Ue {
        ues.get(imsi).unwrap_or_else(|| {
            panic!(
                "Cell {}: UE {imsi} is connected but missing from the UE table",
                self.info.cell_id
            )
        })
    }

    /// Measures each connected UE's uplink received power at the cell,
    /// reusing the downlink path-loss model symmetrically.
    fn monitor_ue_signal_strength(&mut self, ues: &BTreeMap<Imsi, Ue>) {
        self.ue_uplink_signal_dbm.clear();
        let frequency_ghz = self.info.carrier_frequency_ghz();
        for imsi in &self.connected_ues {
            let ue = self.connected_ue(ues, imsi);
            let distance = self.info.position.distance_to(ue.position()).max(1.0);
            match path_loss_urban_macro_nlos(distance, frequency_ghz) {
                Ok(path_loss) => {
                    self.ue_uplink_signal_dbm
                        .insert(imsi.clone(), ue.uplink_transmit_power_dbm() - path_loss);
                }
                Err(err) => {
                    warn!("Cell {}: uplink path loss for UE {imsi} failed: {err}", self.info.cell_id);
                }
            }
        }
    }

    /// Picks each UE's MCS: the highest index whose spectral efficiency does
    /// not exceed the efficiency implied by the UE's CQI. A UE with CQI 0
    /// keeps no MCS and gets no allocation downstream.
    fn select_ue_mcs(&mut self, ues: &mut BTreeMap<Imsi, Ue>) {
        for imsi in &self.connected_ues {
            let ue = ues.get_mut(imsi).unwrap_or_else(|| {
                panic!(
                    "Cell {}: UE {imsi} is connected but missing from the UE table",
                    self.info.cell_id
                )
            });
            ue.set_downlink_mcs(None);

            let cqi = ue.downlink_cqi();
            let Some(cqi_data) = cqi_entry(cqi) else {
                continue;
            };
            if cqi == 0 {
                continue;
            }

            let cqi_efficiency = cqi_data.spectral_efficiency;
            let mut selected_index = 0u8;
            for (index, entry) in mcs_table().iter().enumerate() {
                if entry.spectral_efficiency <= cqi_efficiency {
                    selected_index = index as u8;
                } else {
                    break;
                }
            }
            ue.set_downlink_mcs(Some((selected_index, mcs_table()[selected_index as usize])));
        }
    }

    /// QoS-aware proportional-fair PRB allocation, downlink only.
    ///
    /// Every UE's GBR-derived PRB demand is granted in full when the cell
    /// has enough downlink PRBs. Under contention every connected UE gets a
    /// one-PRB service floor (while the budget lasts) and the remainder is
    /// split proportionally to demand, truncated to whole PRBs; truncation
    /// remainders are deliberately not redistributed.
    fn allocate_prb(&mut self, ues: &BTreeMap<Imsi, Ue>) {
        for allocation in self.prb_allocation.values_mut() {
            *allocation = PrbAllocation::default();
        }

        struct PrbRequirement {
            required_dl_prb: u32,
        }

        let mut requirements: BTreeMap<Imsi, PrbRequirement> = BTreeMap::new();
        for imsi in &self.connected_ues {
            let ue = self.connected_ue(ues, imsi);
            let Some((_, mcs)) = ue.downlink_mcs() else {
                debug!(
                    "Cell {}: UE {imsi} has no downlink MCS data, skipping",
                    self.info.cell_id
                );
                continue;
            };
            let Some(qos) = ue.qos_profile() else {
                debug!("Cell {}: UE {imsi} has no QoS profile, skipping", self.info.cell_id);
                continue;
            };

            let throughput_per_prb =
                estimate_throughput(mcs.modulation_order(), mcs.target_code_rate, 1);
            let required_dl_prb = (qos.gbr_dl_bps / throughput_per_prb).ceil() as u32;
            requirements.insert(imsi.clone(), PrbRequirement { required_dl_prb });
        }

        let total_demand: u64 = requirements.values().map(|r| r.required_dl_prb as u64).sum();

        if total_demand <= self.info.max_dl_prb as u64 {
            for (imsi, requirement) in &requirements {
                if let Some(allocation) = self.prb_allocation.get_mut(imsi) {
                    allocation.downlink = requirement.required_dl_prb;
                }
            }
        } else {
            // one-PRB service floor for every connected UE, budget permitting
            let mut remaining = self.info.max_dl_prb;
            for imsi in &self.connected_ues {
                let floor = remaining.min(1);
                if let Some(allocation) = self.prb_allocation.get_mut(imsi) {
                    allocation.downlink = floor;
                }
                remaining -= floor;
            }

            if remaining > 0 {
                for (imsi, requirement) in &requirements {
                    let share = requirement.required_dl_prb as f64 / total_demand as f64;
                    let additional = (share * remaining as f64) as u32;
                    if let Some(allocation) = self.prb_allocation.get_mut(imsi) {
                        allocation.downlink += additional;
                    }
                }
            }
        }
    }

    /// Sets each UE's downlink bitrate from its MCS and PRB grant. Latency
    /// estimation is not modeled; the latency fields stay at zero.
    fn estimate_ue_bitrate_and_latency(&mut self, ues: &mut BTreeMap<Imsi, Ue>) {
        for imsi in &self.connected_ues {
            let ue = ues.get_mut(imsi).unwrap_or_else(|| {
                panic!(
                    "Cell {}: UE {imsi} is connected but missing from the UE table",
                    self.info.cell_id
                )
            });
            let Some((_, mcs)) = ue.downlink_mcs() else {
                debug!(
                    "Cell {}: UE {imsi} has no downlink MCS data, skipping",
                    self.info.cell_id
                );
                continue;
            };
            let dl_prb = self
                .prb_allocation
                .get(imsi)
                .map(|a| a.downlink)
                .unwrap_or_else(|| {
                    panic!("Cell {}: UE {imsi} has no PRB allocation entry", self.info.cell_id)
                });
            let bitrate =
                estimate_throughput(mcs.modulation_order(), mcs.target_code_rate, dl_prb);
            ue.set_downlink_bitrate(bitrate);
        }
    }

    /// Serializable snapshot for the knowledge/query layer.
    pub fn snapshot(&self) -> CellSnapshot {
        CellSnapshot {
            cell_id: self.info.cell_id.clone(),
            bs_id: self.info.bs_id.clone(),
            frequency_band: self.info.frequency_band.clone(),
            carrier_frequency_mhz: self.info.carrier_frequency_mhz,
            bandwidth_hz: self.info.bandwidth_hz,
            max_prb: self.info.max_prb,
            max_dl_prb: self.info.max_dl_prb,
            max_ul_prb: self.info.max_ul_prb,
            cell_radius_m: self.info.cell_radius_m,
            position_x: self.info.position.x,
            position_y: self.info.position.y,
            prb_allocation: self.prb_allocation.clone(),
            allocated_dl_prb: self.allocated_dl_prb(),
            allocated_ul_prb: self.allocated_ul_prb(),
            current_load: self.current_load(),
            current_dl_load: self.current_dl_load(),
            current_ul_load: self.current_ul_load(),
            connected_ues: self.connected_ues.iter().cloned().collect(),
            ue_uplink_signal_dbm: self.ue_uplink_signal_dbm.clone(),
        }
    }
}

/// Point-in-time view of a cell, serialized for external consumers.
#[derive(Debug, Clone, Serialize)]
pub struct CellSnapshot {
    pub cell_id: CellId,
    pub bs_id: String,
    pub frequency_band: String,
    pub carrier_frequency_mhz: f64,
    pub bandwidth_hz: f64,
    pub max_prb: u32,
    pub max_dl_prb: u32,
    pub max_ul_prb: u32,
    pub cell_radius_m: f64,
    pub position_x: f64,
    pub position_y: f64,
    pub prb_allocation: BTreeMap<Imsi, PrbAllocation>,
    pub allocated_dl_prb: u32,
    pub allocated_ul_prb: u32,
    pub current_load: f64,
    pub current_dl_load: f64,
    pub current_ul_load: f64,
    pub connected_ues: Vec<Imsi>,
    pub ue_uplink_signal_dbm: BTreeMap<Imsi, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ransim_common::config::CellConfig;
    use ransim_common::types::{Position, QosProfile, SliceType};

    use crate::topology::CellDirectory;
    use crate::ue::{OperationRegion, UeRadioConfig};

    fn test_cell(max_dl_prb: u32) -> Cell {
        let config = CellConfig {
            cell_id: "cell_test".to_string(),
            frequency_band: "n78".to_string(),
            carrier_frequency_mhz: 3500.0,
            bandwidth_hz: 100e6,
            max_prb: max_dl_prb * 2,
            max_dl_prb,
            max_ul_prb: max_dl_prb,
            cell_radius_m: 150.0,
            transmit_power_dbm: 40.0,
            cell_individual_offset_db: 0.0,
            frequency_priority: 5,
            qrx_level_min_dbm: -100.0,
        };
        Cell::new(CellInfo::from_config("bs_test", Position::new(0.0, 0.0), &config))
    }

    /// A registered UE parked near the cell with a synthetic QoS profile
    /// whose GBR demands exactly `required_prb` PRBs at top MCS.
    fn ue_requiring_prbs(imsi: &str, required_prb: u32) -> Ue {
        let region = OperationRegion { min_x: 0.0, max_x: 1000.0, min_y: 0.0, max_y: 800.0 };
        let mut ue = Ue::new(
            imsi,
            Position::new(10.0, 0.0),
            Position::new(10.0, 0.0),
            0.0,
            region,
            20.0,
            UeRadioConfig::default(),
        );
        // top MCS carries 1_244_250 bit/s per PRB
        let per_prb = estimate_throughput(8, 948.0, 1);
        ue.apply_registration_for_test(
            SliceType::Embb,
            QosProfile {
                five_qi: 9,
                gbr_dl_bps: per_prb * required_prb as f64,
                gbr_ul_bps: 0.0,
                latency_dl_ms: 10.0,
                latency_ul_ms: 10.0,
            },
        );
        ue.set_downlink_mcs(Some((27, *mcs_table().last().unwrap())));
        ue
    }

    fn ue_table(ues: Vec<Ue>) -> BTreeMap<Imsi, Ue> {
        ues.into_iter().map(|ue| (ue.imsi().to_string(), ue)).collect()
    }

    #[test]
    fn test_register_keeps_allocation_invariant() {
        let mut cell = test_cell(100);
        cell.register_ue("IMSI_0");
        cell.register_ue("IMSI_1");

        assert_eq!(cell.connected_ues().len(), cell.prb_allocation().len());
        for imsi in cell.connected_ues() {
            assert!(cell.prb_allocation().contains_key(imsi));
        }

        cell.deregister_ue("IMSI_0");
        assert_eq!(cell.connected_ues().len(), 1);
        assert_eq!(cell.prb_allocation().len(), 1);
        assert!(!cell.prb_allocation().contains_key("IMSI_0"));
    }

    #[test]
    fn test_deregister_unknown_ue_is_noop() {
        let mut cell = test_cell(100);
        cell.register_ue("IMSI_0");
        let before_ues = cell.connected_ues().clone();
        let before_alloc = cell.prb_allocation().clone();

        cell.deregister_ue("IMSI_42");

        assert_eq!(cell.connected_ues(), &before_ues);
        assert_eq!(cell.prb_allocation(), &before_alloc);
    }

    #[test]
    fn test_allocation_under_surplus_grants_demand() {
        // two UEs, 30 PRBs each, against a 100 PRB budget
        let mut cell = test_cell(100);
        cell.register_ue("IMSI_0");
        cell.register_ue("IMSI_1");
        let ues = ue_table(vec![ue_requiring_prbs("IMSI_0", 30), ue_requiring_prbs("IMSI_1", 30)]);

        cell.allocate_prb(&ues);

        assert_eq!(cell.prb_allocation()["IMSI_0"].downlink, 30);
        assert_eq!(cell.prb_allocation()["IMSI_1"].downlink, 30);
        assert_eq!(cell.allocated_dl_prb(), 60);
    }

    #[test]
    fn test_allocation_under_contention_floors_then_splits() {
        // two UEs demanding 30 PRBs each against a 10 PRB budget:
        // floor 1+1, remaining 8 split 4/4 by equal demand shares
        let mut cell = test_cell(10);
        cell.register_ue("IMSI_0");
        cell.register_ue("IMSI_1");
        let ues = ue_table(vec![ue_requiring_prbs("IMSI_0", 30), ue_requiring_prbs("IMSI_1", 30)]);

        cell.allocate_prb(&ues);

        assert_eq!(cell.prb_allocation()["IMSI_0"].downlink, 5);
        assert_eq!(cell.prb_allocation()["IMSI_1"].downlink, 5);
        assert!(cell.allocated_dl_prb() <= 10);
    }

    #[test]
    fn test_allocation_truncation_leaves_remainder_unallocated() {
        // three UEs, uneven demand, 10 PRB budget: floors take 3, the
        // remaining 7 split by demand share with truncation
        let mut cell = test_cell(10);
        for imsi in ["IMSI_0", "IMSI_1", "IMSI_2"] {
            cell.register_ue(imsi);
        }
        let ues = ue_table(vec![
            ue_requiring_prbs("IMSI_0", 20),
            ue_requiring_prbs("IMSI_1", 20),
            ue_requiring_prbs("IMSI_2", 20),
        ]);

        cell.allocate_prb(&ues);

        // share = 1/3 each: floor(7/3) = 2 extra on top of the 1 floor
        for imsi in ["IMSI_0", "IMSI_1", "IMSI_2"] {
            assert_eq!(cell.prb_allocation()[imsi].downlink, 3);
        }
        // one PRB stays unallocated by the truncation rule
        assert_eq!(cell.allocated_dl_prb(), 9);
    }

    #[test]
    fn test_ue_without_mcs_gets_floor_only_under_contention() {
        let mut cell = test_cell(10);
        cell.register_ue("IMSI_0");
        cell.register_ue("IMSI_1");
        let mut ues = ue_table(vec![ue_requiring_prbs("IMSI_0", 30), ue_requiring_prbs("IMSI_1", 30)]);
        ues.get_mut("IMSI_1").unwrap().set_downlink_mcs(None);

        cell.allocate_prb(&ues);

        // IMSI_1 contributes no demand but still receives the service floor
        assert_eq!(cell.prb_allocation()["IMSI_1"].downlink, 1);
        // IMSI_0 takes the floor plus the whole proportional remainder
        assert_eq!(cell.prb_allocation()["IMSI_0"].downlink, 9);
    }

    #[test]
    fn test_select_ue_mcs_respects_cqi_efficiency() {
        let mut cell = test_cell(100);
        cell.register_ue("IMSI_0");
        let mut ues = ue_table(vec![ue_requiring_prbs("IMSI_0", 10)]);

        // CQI 7 implies 2.7305 bit/s/Hz; MCS 11 matches it exactly
        ues.get_mut("IMSI_0").unwrap().set_downlink_cqi_for_test(7);
        cell.select_ue_mcs(&mut ues);
        let (index, entry) = ues["IMSI_0"].downlink_mcs().unwrap();
        assert_eq!(index, 11);
        assert_eq!(entry.spectral_efficiency, 2.7305);

        // CQI 0: no MCS at all
        ues.get_mut("IMSI_0").unwrap().set_downlink_cqi_for_test(0);
        cell.select_ue_mcs(&mut ues);
        assert!(ues["IMSI_0"].downlink_mcs().is_none());

        // CQI 1 (0.1523) sits below even MCS 0 (0.2344); the scan still
        // assigns MCS 0
        ues.get_mut("IMSI_0").unwrap().set_downlink_cqi_for_test(1);
        cell.select_ue_mcs(&mut ues);
        let (index, _) = ues["IMSI_0"].downlink_mcs().unwrap();
        assert_eq!(index, 0);

        // CQI 15: top of the MCS table
        ues.get_mut("IMSI_0").unwrap().set_downlink_cqi_for_test(15);
        cell.select_ue_mcs(&mut ues);
        let (index, _) = ues["IMSI_0"].downlink_mcs().unwrap();
        assert_eq!(index, 27);
    }

    #[test]
    fn test_bitrate_follows_allocation() {
        let mut cell = test_cell(100);
        cell.register_ue("IMSI_0");
        let mut ues = ue_table(vec![ue_requiring_prbs("IMSI_0", 30)]);

        cell.allocate_prb(&ues);
        cell.estimate_ue_bitrate_and_latency(&mut ues);

        let expected = estimate_throughput(8, 948.0, 30);
        assert_eq!(ues["IMSI_0"].downlink_bitrate_bps(), expected);
    }

    #[test]
    fn test_full_step_schedules_connected_ues() {
        let mut directory = CellDirectory::new();
        let mut cell = test_cell(100);
        directory.insert(cell.info().clone());

        cell.register_ue("IMSI_0");
        let mut ues = ue_table(vec![ue_requiring_prbs("IMSI_0", 5)]);
        // give the UE a serving cell and fresh measurements so CQI is real
        let ue = ues.get_mut("IMSI_0").unwrap();
        ue.set_current_cell_for_test("cell_test");
        ue.monitor_signal_strength(&directory);

        cell.step(1.0, &mut ues);

        let ue = &ues["IMSI_0"];
        assert!(ue.downlink_cqi() > 0);
        assert!(ue.downlink_mcs().is_some());
        assert!(cell.prb_allocation()["IMSI_0"].downlink > 0);
        assert!(ue.downlink_bitrate_bps() > 0.0);
        assert!(cell.ue_uplink_signal_dbm().contains_key("IMSI_0"));
    }
}
