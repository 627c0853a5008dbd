//! Simulation tick and clock
//!
//! The simulation advances in discrete ticks. One tick represents
//! `tick_duration_s` seconds of simulated time; all per-tick work runs to
//! completion before the next tick starts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Simulation time configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationTimeConfig {
    /// Duration of each tick in simulated seconds
    pub tick_duration_s: f64,
    /// Maximum number of ticks to run
    pub max_ticks: u64,
    /// Real-time simulation (if true, wait for `tick_duration_s` between ticks)
    pub real_time: bool,
}

impl Default for SimulationTimeConfig {
    fn default() -> Self {
        Self {
            tick_duration_s: 1.0,
            max_ticks: 200,
            real_time: false,
        }
    }
}

impl SimulationTimeConfig {
    /// Returns the tick duration as a `Duration`.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(self.tick_duration_s)
    }
}

/// Simulation clock coordinating tick progression.
#[derive(Debug)]
pub struct SimulationClock {
    current_tick: u64,
    config: SimulationTimeConfig,
    start_time: std::time::Instant,
}

impl SimulationClock {
    /// Creates a new simulation clock at tick 0.
    pub fn new(config: SimulationTimeConfig) -> Self {
        Self {
            current_tick: 0,
            config,
            start_time: std::time::Instant::now(),
        }
    }

    /// Returns the current tick.
    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SimulationTimeConfig {
        &self.config
    }

    /// Advances the clock by one tick.
    pub fn tick(&mut self) {
        self.current_tick += 1;
    }

    /// Returns true once `max_ticks` ticks have elapsed.
    pub fn is_complete(&self) -> bool {
        self.current_tick >= self.config.max_ticks
    }

    /// Returns the current simulated time in seconds.
    pub fn current_time_s(&self) -> f64 {
        self.current_tick as f64 * self.config.tick_duration_s
    }

    /// Resets the clock to tick 0.
    pub fn reset(&mut self) {
        self.current_tick = 0;
        self.start_time = std::time::Instant::now();
    }

    /// Waits until wall-clock time catches up with simulated time, when in
    /// real-time mode. A no-op otherwise.
    pub fn wait_for_next_tick(&self) {
        if !self.config.real_time {
            return;
        }
        let target = Duration::from_secs_f64(self.current_time_s());
        let elapsed = self.start_time.elapsed();
        if target > elapsed {
            std::thread::sleep(target - elapsed);
        }
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(SimulationTimeConfig::default())
    }
}
