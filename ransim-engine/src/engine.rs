//! The simulation engine
//!
//! Owns every network entity and drives the per-tick pipeline in a fixed
//! order: spawn UEs, step UEs, step base stations, step the RIC. The order
//! is load-bearing: UEs must move and re-measure before stations schedule
//! resources and process events, so scheduling reflects current positions,
//! and the RIC steps after handovers are resolved.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use ransim_common::clock::SimulationClock;
use ransim_common::config::SimulationConfig;
use ransim_common::error::{Error, Result};
use ransim_common::types::{BsId, Imsi, Position, SliceType};
use ransim_ran::base_station::{execute_handover, BaseStation};
use ransim_ran::core_network::CoreNetwork;
use ransim_ran::topology::{CellDirectory, CellInfo};
use ransim_ran::ue::{OperationRegion, Ue, UeRadioConfig};
use ransim_ric::NearRtRic;

use crate::config_loader::{validate_simulation_config, ConfigError};
use crate::snapshot::SimulationSnapshot;

pub struct SimulationEngine {
    config: SimulationConfig,
    core_network: Option<CoreNetwork>,
    ric: Option<NearRtRic>,
    base_stations: BTreeMap<BsId, BaseStation>,
    cell_directory: CellDirectory,
    ues: BTreeMap<Imsi, Ue>,
    clock: SimulationClock,
    sim_started: bool,
    rng: StdRng,
}

impl std::fmt::Debug for SimulationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationEngine")
            .field("tick", &self.clock.current_tick())
            .field("base_stations", &self.base_stations.len())
            .field("ues", &self.ues.len())
            .field("sim_started", &self.sim_started)
            .finish_non_exhaustive()
    }
}

fn engine_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

impl SimulationEngine {
    /// Creates an engine from a validated configuration.
    pub fn new(config: SimulationConfig) -> std::result::Result<Self, ConfigError> {
        validate_simulation_config(&config)?;
        let clock = SimulationClock::new(config.time);
        let rng = engine_rng(config.seed);
        Ok(Self {
            config,
            core_network: None,
            ric: None,
            base_stations: BTreeMap::new(),
            cell_directory: CellDirectory::new(),
            ues: BTreeMap::new(),
            clock,
            sim_started: false,
            rng,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn current_tick(&self) -> u64 {
        self.clock.current_tick()
    }

    pub fn sim_started(&self) -> bool {
        self.sim_started
    }

    pub fn cell_directory(&self) -> &CellDirectory {
        &self.cell_directory
    }

    pub fn base_stations(&self) -> &BTreeMap<BsId, BaseStation> {
        &self.base_stations
    }

    pub fn base_station(&self, bs_id: &str) -> Option<&BaseStation> {
        self.base_stations.get(bs_id)
    }

    pub fn ues(&self) -> &BTreeMap<Imsi, Ue> {
        &self.ues
    }

    pub fn ue(&self, imsi: &str) -> Option<&Ue> {
        self.ues.get(imsi)
    }

    pub fn ue_count(&self) -> usize {
        self.ues.len()
    }

    pub fn core_network(&self) -> Option<&CoreNetwork> {
        self.core_network.as_ref()
    }

    pub fn ric(&self) -> Option<&NearRtRic> {
        self.ric.as_ref()
    }

    /// Builds the network: core network, base stations (with their cells),
    /// then the RIC, whose xApps subscribe to the stations. Order matters:
    /// the stations must exist before the RIC loads.
    pub fn network_setup(&mut self) -> Result<()> {
        if self.core_network.is_some() {
            return Err(Error::Config(
                "network already set up; call reset() first".to_string(),
            ));
        }

        let mut core = CoreNetwork::new(
            self.config.slices.clone(),
            self.config.seed.map(|seed| seed.wrapping_add(1)),
        );
        core.seed_subscriptions(self.config.ue.max_count);
        self.core_network = Some(core);

        for bs_config in &self.config.base_stations {
            assert!(
                !self.base_stations.contains_key(&bs_config.bs_id),
                "base station {} already exists",
                bs_config.bs_id
            );
            let station = BaseStation::from_config(bs_config);
            for cell in station.cells().values() {
                self.cell_directory.insert(cell.info().clone());
            }
            self.base_stations.insert(bs_config.bs_id.clone(), station);
        }

        let mut ric = NearRtRic::new();
        ric.load_xapps(&self.config.ric.xapps, &mut self.base_stations)?;
        self.ric = Some(ric);

        info!(
            "network setup complete: {} base stations, {} cells",
            self.base_stations.len(),
            self.cell_directory.len()
        );
        Ok(())
    }

    /// Clears all network state back to the pre-setup state.
    pub fn reset(&mut self) {
        info!("resetting network");
        self.base_stations.clear();
        self.cell_directory = CellDirectory::new();
        self.ues.clear();
        self.core_network = None;
        self.ric = None;
        self.clock.reset();
        self.sim_started = false;
        self.rng = engine_rng(self.config.seed);
        info!("network reset complete");
    }

    fn operation_region(&self) -> OperationRegion {
        let coverage = self.config.coverage;
        OperationRegion {
            min_x: coverage.boundary_buffer_m,
            max_x: coverage.width_m - coverage.boundary_buffer_m,
            min_y: coverage.boundary_buffer_m,
            max_y: coverage.height_m - coverage.boundary_buffer_m,
        }
    }

    fn random_point_in(&mut self, region: OperationRegion) -> Position {
        // the coverage grid is integer-valued
        let x = self.rng.gen_range(region.min_x as i64..=region.max_x as i64);
        let y = self.rng.gen_range(region.min_y as i64..=region.max_y as i64);
        Position::new(x as f64, y as f64)
    }

    fn next_free_imsi(&self) -> Option<Imsi> {
        for i in 0..self.config.ue.max_count {
            let imsi = format!("IMSI_{i}");
            if !self.ues.contains_key(&imsi) {
                return Some(imsi);
            }
        }
        None
    }

    /// Spawns a UE at a random position with a random target and speed and
    /// attempts its power-up sequence. A UE that fails power-up is
    /// discarded, not retried.
    pub fn spawn_random_ue(&mut self) -> Option<Imsi> {
        let Some(imsi) = self.next_free_imsi() else {
            warn!("no free IMSI slot, cannot spawn UE");
            return None;
        };

        let region = self.operation_region();
        let position = self.random_point_in(region);
        let target = self.random_point_in(region);
        let speed = self
            .rng
            .gen_range(self.config.ue.speed_min..=self.config.ue.speed_max);

        let mut ue = Ue::new(
            imsi.clone(),
            position,
            target,
            speed,
            region,
            self.config.ue.default_connection_time_ticks as f64 * self.config.time.tick_duration_s,
            UeRadioConfig::from(&self.config.ue),
        );

        let Some(core) = self.core_network.as_mut() else {
            warn!("core network not initialized, cannot spawn UE");
            return None;
        };
        if !ue.power_up(&self.cell_directory, &mut self.base_stations, core, None) {
            debug!("UE {imsi}: power-up failed, discarding");
            return None;
        }

        info!("UE {imsi} registered to the network at {}", ue.position());
        self.ues.insert(imsi.clone(), ue);
        Some(imsi)
    }

    /// Spawns a random number of UEs, bounded by the configured spawn rate
    /// and the global UE cap.
    pub fn spawn_ues(&mut self) {
        let current = self.ues.len() as u32;
        if current >= self.config.ue.max_count {
            debug!("UE count reached the maximum limit, no more UEs will be spawned");
            return;
        }

        let requested = self
            .rng
            .gen_range(self.config.ue.spawn_rate_min..=self.config.ue.spawn_rate_max);
        let to_spawn = requested.min(self.config.ue.max_count - current);
        debug!("spawning {to_spawn} UEs");

        let mut spawned = 0;
        let mut attempts = 0;
        // failed power-ups are discarded; bound the retries so a coverage
        // hole cannot stall the tick
        while spawned < to_spawn && attempts < to_spawn * 10 {
            attempts += 1;
            if self.spawn_random_ue().is_some() {
                spawned += 1;
            }
        }
    }

    fn deregister_connected_ue(&mut self, imsi: &str) {
        let serving_bs = self
            .ues
            .get(imsi)
            .and_then(|ue| ue.current_cell())
            .and_then(|cell_id| self.cell_directory.get(cell_id))
            .map(|info| info.bs_id.clone());

        let Some(bs_id) = serving_bs else {
            warn!("UE {imsi} has no serving cell, cannot deregister through a station");
            return;
        };
        let Some(core) = self.core_network.as_mut() else {
            warn!("core network not initialized");
            return;
        };
        if let Some(station) = self.base_stations.get_mut(&bs_id) {
            station.handle_deregistration_request(imsi, core);
        }
        if let Some(ue) = self.ues.get_mut(imsi) {
            ue.complete_deregistration();
        }
    }

    /// Steps every UE: movement, measurement, event evaluation. Event
    /// reports route to the serving station's queue; UEs whose connection
    /// time expired deregister and leave the simulation within the same
    /// tick; UEs that reached their target get a fresh random one.
    pub fn step_ues(&mut self, delta_time: f64) {
        let imsis: Vec<Imsi> = self.ues.keys().cloned().collect();
        let mut to_remove: Vec<Imsi> = Vec::new();

        for imsi in imsis {
            let outcome = {
                let Some(ue) = self.ues.get_mut(&imsi) else {
                    continue;
                };
                ue.step(delta_time, &self.cell_directory)
            };

            for event in outcome.events {
                let Some(info) = self.cell_directory.get(&event.serving_cell_id) else {
                    warn!("event for unknown cell {}", event.serving_cell_id);
                    continue;
                };
                let Some(station) = self.base_stations.get_mut(&info.bs_id) else {
                    warn!("event for unknown base station {}", info.bs_id);
                    continue;
                };
                station.receive_ue_rrc_meas_events(event);
            }

            if outcome.deregister_requested {
                self.deregister_connected_ue(&imsi);
                to_remove.push(imsi);
                continue;
            }

            if outcome.target_reached {
                if let Some(region) = self.ues.get(&imsi).map(|ue| ue.operation_region()) {
                    let target = self.random_point_in(region);
                    if let Some(ue) = self.ues.get_mut(&imsi) {
                        debug!("UE {imsi} reached its target, new target {target}");
                        ue.set_target(target.x, target.y);
                    }
                }
            }
        }

        for imsi in to_remove {
            self.remove_ue(&imsi);
        }
    }

    fn remove_ue(&mut self, imsi: &str) {
        assert!(self.ues.remove(imsi).is_some(), "UE {imsi} is not in the simulation");
        info!("UE {imsi} removed from the simulation");
    }

    /// Steps every base station: cell scheduling, event dispatch through
    /// xApp handlers, and execution of the station's selected handover.
    pub fn step_base_stations(&mut self, delta_time: f64) {
        let bs_ids: Vec<BsId> = self.base_stations.keys().cloned().collect();
        for bs_id in bs_ids {
            let action = {
                let Some(station) = self.base_stations.get_mut(&bs_id) else {
                    continue;
                };
                station.step(delta_time, &mut self.ues, &self.cell_directory)
            };

            if let Some(action) = action {
                execute_handover(
                    &mut self.base_stations,
                    &mut self.ues,
                    &self.cell_directory,
                    &action,
                );
            }
        }
    }

    /// Steps the RIC: loaded xApps, then the AI-service subscriptions.
    pub fn step_ric(&mut self, delta_time: f64) {
        match self.ric.as_mut() {
            Some(ric) => ric.step(delta_time),
            None => warn!("RIC is not initialized, skipping RIC step"),
        }
    }

    /// One full simulation tick.
    pub fn step(&mut self, delta_time: f64) {
        debug!(
            "simulation tick {} with delta_time {delta_time}s",
            self.clock.current_tick()
        );
        self.spawn_ues();
        self.step_ues(delta_time);
        self.step_base_stations(delta_time);
        self.step_ric(delta_time);
    }

    /// Drives `step` until the configured tick budget runs out or `stop`
    /// clears the run flag. The flag is only checked at tick boundaries.
    pub fn start_simulation(&mut self) {
        assert!(!self.sim_started, "simulation already running");
        self.sim_started = true;

        while self.sim_started && !self.clock.is_complete() {
            info!("======== tick {} ========", self.clock.current_tick());
            self.step(self.clock.config().tick_duration_s);
            self.clock.tick();
            self.clock.wait_for_next_tick();
        }

        self.sim_started = false;
        info!("simulation ended after {} ticks", self.clock.current_tick());
    }

    /// Clears the run flag; `start_simulation` returns at the next tick
    /// boundary.
    pub fn stop(&mut self) {
        self.sim_started = false;
        info!("simulation stopped");
    }

    /// Admits a named UE at runtime with an explicit slice subscription
    /// list and an optional slice to attach on. Must be called between
    /// ticks.
    pub fn register_ue(
        &mut self,
        imsi: &str,
        subscribed_slices: Vec<SliceType>,
        register_slice: Option<SliceType>,
    ) -> Result<()> {
        if self.core_network.is_none() {
            return Err(Error::Config("core network not initialized".to_string()));
        }
        if self.ues.contains_key(imsi) {
            return Err(Error::RegistrationRejected(format!(
                "UE {imsi} already present in the simulation"
            )));
        }
        if subscribed_slices.is_empty() {
            return Err(Error::RegistrationRejected(format!(
                "UE {imsi}: subscription list must not be empty"
            )));
        }
        let attach_slice = register_slice.unwrap_or(subscribed_slices[0]);
        if !subscribed_slices.contains(&attach_slice) {
            return Err(Error::RegistrationRejected(format!(
                "requested slice {attach_slice} is not in the subscription list of UE {imsi}"
            )));
        }

        let region = self.operation_region();
        let position = self.random_point_in(region);
        let target = self.random_point_in(region);
        let speed = self
            .rng
            .gen_range(self.config.ue.speed_min..=self.config.ue.speed_max);

        let core = self.core_network.as_mut().expect("checked above");
        core.provision_subscription(imsi, subscribed_slices)?;

        let mut ue = Ue::new(
            imsi.to_string(),
            position,
            target,
            speed,
            region,
            self.config.ue.default_connection_time_ticks as f64 * self.config.time.tick_duration_s,
            UeRadioConfig::from(&self.config.ue),
        );
        if !ue.power_up(
            &self.cell_directory,
            &mut self.base_stations,
            core,
            Some(attach_slice),
        ) {
            return Err(Error::RegistrationRejected(format!(
                "UE {imsi}: power-up failed"
            )));
        }

        info!("UE {imsi} registered at runtime on slice {attach_slice}");
        self.ues.insert(imsi.to_string(), ue);
        Ok(())
    }

    /// Removes a UE on request, releasing every registry it touched. Must
    /// be called between ticks.
    pub fn deregister_ue(&mut self, imsi: &str) -> Result<()> {
        if !self.ues.contains_key(imsi) {
            return Err(Error::NotFound(format!("UE {imsi} not found in the simulation")));
        }
        self.deregister_connected_ue(imsi);
        self.remove_ue(imsi);
        Ok(())
    }

    /// Resolves a cell id to its static parameters.
    pub fn cell_info(&self, cell_id: &str) -> Option<&CellInfo> {
        self.cell_directory.get(cell_id)
    }

    /// Point-in-time view of the whole simulation for external consumers.
    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            time_step: self.clock.current_tick(),
            base_stations: self
                .base_stations
                .values()
                .map(BaseStation::snapshot)
                .collect(),
            cells: self
                .base_stations
                .values()
                .flat_map(|bs| bs.cells().values().map(|cell| cell.snapshot()))
                .collect(),
            ues: self
                .ues
                .values()
                .map(|ue| ue.snapshot(&self.cell_directory))
                .collect(),
        }
    }
}
