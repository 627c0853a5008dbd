//! Near Real-Time RAN Intelligent Controller and xApps
//!
//! The RIC loads a configured set of xApps through an explicit
//! name-to-constructor registry and steps them once per simulation tick.
//! Each xApp's `start` subscribes handler objects to RRC measurement
//! events on every base station; the handlers decide whether a reported
//! event warrants a handover control action.

pub mod handover_blind;
pub mod handover_freq_priority;
pub mod ric;
pub mod subscription;
pub mod xapp;

pub use handover_blind::A3HandoverBlindXApp;
pub use handover_freq_priority::A3HandoverFreqPriorityXApp;
pub use ric::{build_xapp, NearRtRic};
pub use subscription::{AiServiceSubscription, AiServiceSubscriptionManager};
pub use xapp::XApp;
