//! The Near-RT RIC: xApp loading and per-tick stepping

use std::collections::BTreeMap;

use tracing::info;

use ransim_common::error::{Error, Result};
use ransim_common::types::BsId;
use ransim_ran::base_station::BaseStation;

use crate::handover_blind::A3HandoverBlindXApp;
use crate::handover_freq_priority::A3HandoverFreqPriorityXApp;
use crate::subscription::AiServiceSubscriptionManager;
use crate::xapp::XApp;

/// Constructs an xApp by registry name. The registry replaces reflective
/// module discovery: new xApps add a constructor arm here and a name in
/// the RIC config.
pub fn build_xapp(name: &str) -> Option<Box<dyn XApp>> {
    match name {
        "a3-handover-blind" => Some(Box::new(A3HandoverBlindXApp::new())),
        "a3-handover-freq-priority" => Some(Box::new(A3HandoverFreqPriorityXApp::new())),
        _ => None,
    }
}

/// Near Real-Time RAN Intelligent Controller.
pub struct NearRtRic {
    ric_id: String,
    xapp_list: BTreeMap<String, Box<dyn XApp>>,
    subscription_manager: AiServiceSubscriptionManager,
}

impl std::fmt::Debug for NearRtRic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NearRtRic")
            .field("ric_id", &self.ric_id)
            .field("xapps", &self.xapp_list.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl NearRtRic {
    pub fn new() -> Self {
        Self {
            ric_id: "NearRT-RIC".to_string(),
            xapp_list: BTreeMap::new(),
            subscription_manager: AiServiceSubscriptionManager::new(),
        }
    }

    pub fn ric_id(&self) -> &str {
        &self.ric_id
    }

    /// Builds the configured xApps and starts each one, which is where the
    /// xApps subscribe their event handlers with every base station. The
    /// stations must therefore exist before the RIC loads.
    pub fn load_xapps(
        &mut self,
        names: &[String],
        base_stations: &mut BTreeMap<BsId, BaseStation>,
    ) -> Result<()> {
        self.xapp_list.clear();

        for name in names {
            let xapp = build_xapp(name)
                .ok_or_else(|| Error::Config(format!("unknown xApp: {name}")))?;
            let id = xapp.id().to_string();
            assert!(!self.xapp_list.contains_key(&id), "xApp {id} already exists");
            self.xapp_list.insert(id.clone(), xapp);
            info!("{}: loaded xApp {id}", self.ric_id);
        }

        for xapp in self.xapp_list.values_mut() {
            xapp.start(base_stations);
        }
        Ok(())
    }

    pub fn xapp_ids(&self) -> Vec<&str> {
        self.xapp_list.keys().map(String::as_str).collect()
    }

    pub fn subscription_manager(&self) -> &AiServiceSubscriptionManager {
        &self.subscription_manager
    }

    pub fn subscription_manager_mut(&mut self) -> &mut AiServiceSubscriptionManager {
        &mut self.subscription_manager
    }

    /// Steps every loaded xApp, then the AI-service subscriptions.
    pub fn step(&mut self, delta_time: f64) {
        for xapp in self.xapp_list.values_mut() {
            xapp.step(delta_time);
        }
        self.subscription_manager.step(delta_time);
    }
}

impl Default for NearRtRic {
    fn default() -> Self {
        Self::new()
    }
}
