//! The xApp capability

use std::collections::BTreeMap;

use ransim_common::types::BsId;
use ransim_ran::base_station::BaseStation;

/// A control application hosted by the Near-RT RIC.
///
/// xApps are constructed by [`crate::ric::build_xapp`] and live for the
/// whole simulation. `start` runs once after every base station exists and
/// is where an xApp subscribes its event handlers; `step` runs every tick
/// for xApps that do periodic work.
pub trait XApp {
    /// Stable identifier, unique across loaded xApps.
    fn id(&self) -> &'static str;

    /// Subscribes this xApp to the events it handles, on every station.
    fn start(&mut self, base_stations: &mut BTreeMap<BsId, BaseStation>);

    /// Per-tick hook; most handover xApps are purely event-driven.
    fn step(&mut self, _delta_time: f64) {}
}
