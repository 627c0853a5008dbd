//! Shared identity and value types for the simulated network.

use serde::{Deserialize, Serialize};

/// UE identity (IMSI), e.g. `"IMSI_7"`.
pub type Imsi = String;

/// Cell identity, e.g. `"bs_11_cell_mid_freq"`.
pub type CellId = String;

/// Base station identity, e.g. `"bs_11"`.
pub type BsId = String;

/// Network slice categories per 3GPP TS 23.501.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SliceType {
    /// Enhanced Mobile Broadband
    #[serde(rename = "eMBB")]
    Embb,
    /// Ultra-Reliable Low-Latency Communication
    #[serde(rename = "URLLC")]
    Urllc,
    /// Massive Machine-Type Communication
    #[serde(rename = "mMTC")]
    Mmtc,
}

impl std::fmt::Display for SliceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SliceType::Embb => write!(f, "eMBB"),
            SliceType::Urllc => write!(f, "URLLC"),
            SliceType::Mmtc => write!(f, "mMTC"),
        }
    }
}

/// QoS profile attached to a network slice.
///
/// Assigned to a UE once at registration and held until deregistration.
/// `Copy` on purpose: assignment always copies the value, so a UE's live
/// profile never aliases the canonical slice table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QosProfile {
    /// 5G QoS Identifier (TS 23.501 Table 5.7.4-1)
    #[serde(rename = "5QI")]
    pub five_qi: u8,
    /// Guaranteed downlink bit rate (bit/s)
    pub gbr_dl_bps: f64,
    /// Guaranteed uplink bit rate (bit/s)
    pub gbr_ul_bps: f64,
    /// Downlink packet delay budget (ms)
    pub latency_dl_ms: f64,
    /// Uplink packet delay budget (ms)
    pub latency_ul_ms: f64,
}

/// A point in the 2D coverage plane (meters).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
