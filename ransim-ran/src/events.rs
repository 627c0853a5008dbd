//! RRC measurement events, monitors, and RIC control actions
//!
//! UEs own a list of stateful event monitors installed at registration.
//! Each tick the UE feeds its offset-adjusted cell measurements to every
//! monitor; a monitor keeps a trigger-history ring buffer of length equal
//! to its configured time-to-trigger and reports the event once the buffer
//! is full with the condition met on every entry (3GPP TS 38.331 section
//! 5.5.4, expressed in simulation ticks).
//!
//! Event reports travel to the serving base station, which dispatches them
//! to the handler an xApp registered for that event type. A handler may
//! answer with a [`ControlAction`].

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use ransim_common::config::{RrcEventId, RrcMeasEventConfig};
use ransim_common::types::{CellId, Imsi};

use crate::topology::CellDirectory;

/// An event report sent by a UE to its serving base station.
#[derive(Debug, Clone, Serialize)]
pub struct RrcMeasurementEvent {
    pub event_id: RrcEventId,
    /// The UE that triggered the event
    pub ue_imsi: Imsi,
    /// The UE's serving cell when the event fired
    pub serving_cell_id: CellId,
    pub report: RrcMeasEventReport,
}

/// Per-event-type report payload.
#[derive(Debug, Clone, Serialize)]
pub enum RrcMeasEventReport {
    A3(EventA3Report),
}

/// A3 payload: neighbour became offset better than serving.
///
/// All powers are the offset-adjusted values the monitor evaluated
/// (received power plus the cell individual offset).
#[derive(Debug, Clone, Serialize)]
pub struct EventA3Report {
    pub serving_cell_power_dbm: f64,
    pub best_neighbour_cell_id: CellId,
    pub best_neighbour_power_dbm: f64,
    /// Powers of every other detected cell, serving cell excluded
    pub neighbour_measurements: BTreeMap<CellId, f64>,
}

impl RrcMeasurementEvent {
    pub fn a3_report(&self) -> &EventA3Report {
        let RrcMeasEventReport::A3(report) = &self.report;
        report
    }
}

/// A control action produced by an xApp event handler.
///
/// Only handover actions exist today; the variant set may grow.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub enum ControlAction {
    Handover(HandoverAction),
}

/// Request to move a UE from its serving cell to a target cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandoverAction {
    pub ue_imsi: Imsi,
    pub source_cell_id: CellId,
    pub target_cell_id: CellId,
}

/// Handler an xApp registers with a base station for one event type.
pub trait RrcMeasEventHandler {
    /// Decides whether the event warrants a control action.
    fn handle(&mut self, event: &RrcMeasurementEvent, cells: &CellDirectory)
        -> Option<ControlAction>;
}

/// A stateful trigger evaluator owned by a UE.
pub trait RrcMeasEventMonitor {
    fn event_id(&self) -> RrcEventId;

    /// Evaluates this tick's measurements. `signal_map` holds the
    /// offset-adjusted received power of every detected cell.
    fn check(&mut self, serving_cell_id: Option<&str>, signal_map: &BTreeMap<CellId, f64>);

    /// True once the condition held for `time_to_trigger` consecutive ticks.
    fn is_triggered(&self) -> bool;

    /// Builds the event report from the latest evaluation, if any.
    fn event_report(&self, ue_imsi: &str) -> Option<RrcMeasurementEvent>;

    /// Clears the trigger history, e.g. after a handover.
    fn reset_trigger_history(&mut self);
}

/// Builds the monitor for a configured measurement event.
pub fn monitor_from_config(config: &RrcMeasEventConfig) -> Box<dyn RrcMeasEventMonitor> {
    match config.event_id {
        RrcEventId::A3 => Box::new(EventA3Monitor::new(
            config.power_threshold_db,
            config.time_to_trigger_ticks as usize,
        )),
    }
}

#[derive(Debug, Clone)]
struct A3Evaluation {
    serving_cell_id: CellId,
    serving_cell_power_dbm: f64,
    best_neighbour_cell_id: CellId,
    best_neighbour_power_dbm: f64,
    neighbour_measurements: BTreeMap<CellId, f64>,
}

/// Monitor for event A3: best neighbour exceeds serving by more than the
/// configured offset.
#[derive(Debug)]
pub struct EventA3Monitor {
    power_threshold_db: f64,
    time_to_trigger_ticks: usize,
    trigger_history: VecDeque<bool>,
    last_evaluation: Option<A3Evaluation>,
}

impl EventA3Monitor {
    pub fn new(power_threshold_db: f64, time_to_trigger_ticks: usize) -> Self {
        assert!(
            time_to_trigger_ticks > 0,
            "time-to-trigger must be at least one tick"
        );
        Self {
            power_threshold_db,
            time_to_trigger_ticks,
            trigger_history: VecDeque::with_capacity(time_to_trigger_ticks),
            last_evaluation: None,
        }
    }

    fn update_trigger_history(&mut self, triggered: bool) {
        self.trigger_history.push_back(triggered);
        if self.trigger_history.len() > self.time_to_trigger_ticks {
            self.trigger_history.pop_front();
        }
    }
}

impl RrcMeasEventMonitor for EventA3Monitor {
    fn event_id(&self) -> RrcEventId {
        RrcEventId::A3
    }

    fn check(&mut self, serving_cell_id: Option<&str>, signal_map: &BTreeMap<CellId, f64>) {
        let Some(serving_cell_id) = serving_cell_id else {
            return;
        };
        if signal_map.len() <= 1 {
            // no neighbours to compare against
            return;
        }
        let Some(&serving_power) = signal_map.get(serving_cell_id) else {
            return;
        };

        let mut best_neighbour: Option<(&CellId, f64)> = None;
        for (cell_id, &power) in signal_map {
            if cell_id.as_str() == serving_cell_id {
                continue;
            }
            if best_neighbour.is_none_or(|(_, best)| power > best) {
                best_neighbour = Some((cell_id, power));
            }
        }
        let (best_id, best_power) = match best_neighbour {
            Some(best) => best,
            None => return,
        };

        let triggered = best_power - serving_power > self.power_threshold_db;
        self.update_trigger_history(triggered);

        let mut neighbours = signal_map.clone();
        neighbours.remove(serving_cell_id);
        self.last_evaluation = Some(A3Evaluation {
            serving_cell_id: serving_cell_id.to_string(),
            serving_cell_power_dbm: serving_power,
            best_neighbour_cell_id: best_id.clone(),
            best_neighbour_power_dbm: best_power,
            neighbour_measurements: neighbours,
        });
    }

    fn is_triggered(&self) -> bool {
        self.trigger_history.len() == self.time_to_trigger_ticks
            && self.trigger_history.iter().all(|&t| t)
    }

    fn event_report(&self, ue_imsi: &str) -> Option<RrcMeasurementEvent> {
        let eval = self.last_evaluation.as_ref()?;
        Some(RrcMeasurementEvent {
            event_id: RrcEventId::A3,
            ue_imsi: ue_imsi.to_string(),
            serving_cell_id: eval.serving_cell_id.clone(),
            report: RrcMeasEventReport::A3(EventA3Report {
                serving_cell_power_dbm: eval.serving_cell_power_dbm,
                best_neighbour_cell_id: eval.best_neighbour_cell_id.clone(),
                best_neighbour_power_dbm: eval.best_neighbour_power_dbm,
                neighbour_measurements: eval.neighbour_measurements.clone(),
            }),
        })
    }

    fn reset_trigger_history(&mut self) {
        self.trigger_history.clear();
        self.last_evaluation = None;
    }
}
