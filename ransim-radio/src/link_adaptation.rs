//! Link-adaptation tables and throughput estimation
//!
//! Static lookup tables from 3GPP TS 38.214:
//! - SINR (dB) -> CQI bucket mapping
//! - Table 5.2.2.1-3: 4-bit CQI Table 2 (CQI -> modulation / code rate /
//!   spectral efficiency)
//! - Table 5.1.3.1-2: MCS index table 2 for PDSCH (MCS -> modulation /
//!   target code rate / spectral efficiency)
//!
//! Throughput is estimated from resource elements per PRB per slot at
//! numerology 0 (12 subcarriers x 14 OFDM symbols, 1 ms slots).

use serde::{Deserialize, Serialize};

/// Subcarriers per physical resource block.
pub const SUBCARRIERS_PER_PRB: u32 = 12;

/// OFDM symbols per slot (normal cyclic prefix).
pub const SYMBOLS_PER_SLOT: u32 = 14;

/// Slot duration at numerology 0 (seconds).
pub const SLOT_DURATION_S: f64 = 1e-3;

/// Number of entries in the MCS table.
pub const MCS_TABLE_LEN: usize = 28;

/// Modulation schemes used by the CQI/MCS tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modulation {
    #[serde(rename = "QPSK")]
    Qpsk,
    #[serde(rename = "16QAM")]
    Qam16,
    #[serde(rename = "64QAM")]
    Qam64,
    #[serde(rename = "256QAM")]
    Qam256,
}

impl Modulation {
    /// Bits carried per modulation symbol.
    pub fn order(&self) -> u8 {
        match self {
            Modulation::Qpsk => 2,
            Modulation::Qam16 => 4,
            Modulation::Qam64 => 6,
            Modulation::Qam256 => 8,
        }
    }
}

impl std::fmt::Display for Modulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modulation::Qpsk => write!(f, "QPSK"),
            Modulation::Qam16 => write!(f, "16QAM"),
            Modulation::Qam64 => write!(f, "64QAM"),
            Modulation::Qam256 => write!(f, "256QAM"),
        }
    }
}

/// One row of the 4-bit CQI table. `modulation` is `None` for CQI 0
/// (out of range).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CqiEntry {
    pub modulation: Option<Modulation>,
    /// Target code rate x 1024
    pub code_rate: f64,
    pub spectral_efficiency: f64,
}

/// One row of the MCS index table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct McsEntry {
    pub modulation: Modulation,
    /// Target code rate x 1024
    pub target_code_rate: f64,
    pub spectral_efficiency: f64,
}

impl McsEntry {
    pub fn modulation_order(&self) -> u8 {
        self.modulation.order()
    }
}

/// SINR thresholds (dB) delimiting CQI buckets. An SINR below the first
/// threshold maps to CQI 0 (unusable).
const SINR_CQI_THRESHOLDS_DB: [f64; 15] = [
    -6.7, -4.7, -2.3, 0.2, 2.4, 4.3, 6.3, 8.4, 10.3, 11.7, 14.1, 16.3, 18.7, 21.0, 22.7,
];

/// 3GPP TS 38.214 Table 5.2.2.1-3: 4-bit CQI Table 2.
const CQI_TABLE: [CqiEntry; 16] = [
    CqiEntry { modulation: None, code_rate: 0.0, spectral_efficiency: 0.0 },
    CqiEntry { modulation: Some(Modulation::Qpsk), code_rate: 78.0, spectral_efficiency: 0.1523 },
    CqiEntry { modulation: Some(Modulation::Qpsk), code_rate: 193.0, spectral_efficiency: 0.3770 },
    CqiEntry { modulation: Some(Modulation::Qpsk), code_rate: 449.0, spectral_efficiency: 0.8770 },
    CqiEntry { modulation: Some(Modulation::Qam16), code_rate: 378.0, spectral_efficiency: 1.4766 },
    CqiEntry { modulation: Some(Modulation::Qam16), code_rate: 490.0, spectral_efficiency: 1.9141 },
    CqiEntry { modulation: Some(Modulation::Qam16), code_rate: 616.0, spectral_efficiency: 2.4063 },
    CqiEntry { modulation: Some(Modulation::Qam64), code_rate: 466.0, spectral_efficiency: 2.7305 },
    CqiEntry { modulation: Some(Modulation::Qam64), code_rate: 567.0, spectral_efficiency: 3.3223 },
    CqiEntry { modulation: Some(Modulation::Qam64), code_rate: 666.0, spectral_efficiency: 3.9023 },
    CqiEntry { modulation: Some(Modulation::Qam64), code_rate: 772.0, spectral_efficiency: 4.5234 },
    CqiEntry { modulation: Some(Modulation::Qam64), code_rate: 873.0, spectral_efficiency: 5.1152 },
    CqiEntry { modulation: Some(Modulation::Qam256), code_rate: 711.0, spectral_efficiency: 5.5547 },
    CqiEntry { modulation: Some(Modulation::Qam256), code_rate: 797.0, spectral_efficiency: 6.2266 },
    CqiEntry { modulation: Some(Modulation::Qam256), code_rate: 885.0, spectral_efficiency: 6.9141 },
    CqiEntry { modulation: Some(Modulation::Qam256), code_rate: 948.0, spectral_efficiency: 7.4063 },
];

/// 3GPP TS 38.214 Table 5.1.3.1-2: MCS index table 2 for PDSCH.
const MCS_TABLE: [McsEntry; MCS_TABLE_LEN] = [
    McsEntry { modulation: Modulation::Qpsk, target_code_rate: 120.0, spectral_efficiency: 0.2344 },
    McsEntry { modulation: Modulation::Qpsk, target_code_rate: 193.0, spectral_efficiency: 0.3770 },
    McsEntry { modulation: Modulation::Qpsk, target_code_rate: 308.0, spectral_efficiency: 0.6016 },
    McsEntry { modulation: Modulation::Qpsk, target_code_rate: 449.0, spectral_efficiency: 0.8770 },
    McsEntry { modulation: Modulation::Qpsk, target_code_rate: 602.0, spectral_efficiency: 1.1758 },
    McsEntry { modulation: Modulation::Qam16, target_code_rate: 378.0, spectral_efficiency: 1.4766 },
    McsEntry { modulation: Modulation::Qam16, target_code_rate: 434.0, spectral_efficiency: 1.6953 },
    McsEntry { modulation: Modulation::Qam16, target_code_rate: 490.0, spectral_efficiency: 1.9141 },
    McsEntry { modulation: Modulation::Qam16, target_code_rate: 553.0, spectral_efficiency: 2.1602 },
    McsEntry { modulation: Modulation::Qam16, target_code_rate: 616.0, spectral_efficiency: 2.4063 },
    McsEntry { modulation: Modulation::Qam16, target_code_rate: 658.0, spectral_efficiency: 2.5703 },
    McsEntry { modulation: Modulation::Qam64, target_code_rate: 466.0, spectral_efficiency: 2.7305 },
    McsEntry { modulation: Modulation::Qam64, target_code_rate: 517.0, spectral_efficiency: 3.0293 },
    McsEntry { modulation: Modulation::Qam64, target_code_rate: 567.0, spectral_efficiency: 3.3223 },
    McsEntry { modulation: Modulation::Qam64, target_code_rate: 616.0, spectral_efficiency: 3.6094 },
    McsEntry { modulation: Modulation::Qam64, target_code_rate: 666.0, spectral_efficiency: 3.9023 },
    McsEntry { modulation: Modulation::Qam64, target_code_rate: 719.0, spectral_efficiency: 4.2129 },
    McsEntry { modulation: Modulation::Qam64, target_code_rate: 772.0, spectral_efficiency: 4.5234 },
    McsEntry { modulation: Modulation::Qam64, target_code_rate: 822.0, spectral_efficiency: 4.8164 },
    McsEntry { modulation: Modulation::Qam64, target_code_rate: 873.0, spectral_efficiency: 5.1152 },
    McsEntry { modulation: Modulation::Qam256, target_code_rate: 682.5, spectral_efficiency: 5.3320 },
    McsEntry { modulation: Modulation::Qam256, target_code_rate: 711.0, spectral_efficiency: 5.5547 },
    McsEntry { modulation: Modulation::Qam256, target_code_rate: 754.0, spectral_efficiency: 5.8906 },
    McsEntry { modulation: Modulation::Qam256, target_code_rate: 797.0, spectral_efficiency: 6.2266 },
    McsEntry { modulation: Modulation::Qam256, target_code_rate: 841.0, spectral_efficiency: 6.5703 },
    McsEntry { modulation: Modulation::Qam256, target_code_rate: 885.0, spectral_efficiency: 6.9141 },
    McsEntry { modulation: Modulation::Qam256, target_code_rate: 916.5, spectral_efficiency: 7.1602 },
    McsEntry { modulation: Modulation::Qam256, target_code_rate: 948.0, spectral_efficiency: 7.4063 },
];

/// Maps an SINR measurement (dB) to a CQI index. CQI 0 means the channel
/// is unusable.
pub fn sinr_to_cqi(sinr_db: f64) -> u8 {
    for (i, threshold) in SINR_CQI_THRESHOLDS_DB.iter().enumerate() {
        if sinr_db < *threshold {
            return i as u8;
        }
    }
    15
}

/// Looks up a CQI table row. Returns `None` for indices outside 0..=15.
pub fn cqi_entry(cqi: u8) -> Option<&'static CqiEntry> {
    CQI_TABLE.get(cqi as usize)
}

/// Looks up an MCS table row. Returns `None` for indices outside 0..=27.
pub fn mcs_entry(index: u8) -> Option<&'static McsEntry> {
    MCS_TABLE.get(index as usize)
}

/// The full MCS table, ordered by index.
pub fn mcs_table() -> &'static [McsEntry] {
    &MCS_TABLE
}

/// Estimates achievable throughput (bit/s) for a transport over `num_prb`
/// resource blocks.
///
/// `target_code_rate` is expressed x1024 as in the MCS table.
pub fn estimate_throughput(modulation_order: u8, target_code_rate: f64, num_prb: u32) -> f64 {
    let re_per_prb_per_slot = (SUBCARRIERS_PER_PRB * SYMBOLS_PER_SLOT) as f64;
    let bits_per_slot =
        num_prb as f64 * re_per_prb_per_slot * modulation_order as f64 * (target_code_rate / 1024.0);
    bits_per_slot / SLOT_DURATION_S
}
