//! AI-service subscription bookkeeping
//!
//! The RIC steps the subscription manager once per tick as a no-op-safe
//! hook. Deployment of the services themselves (containers, edge servers)
//! happens outside the simulation core; failures there surface as error
//! values, never as crashes.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use ransim_common::error::{Error, Result};
use ransim_common::types::Imsi;

/// One AI-service subscription covering a set of UEs.
#[derive(Debug, Clone, Serialize)]
pub struct AiServiceSubscription {
    pub subscription_id: String,
    pub ai_service_name: String,
    pub ue_imsi_list: Vec<Imsi>,
}

/// Tracks AI-service subscriptions across their lifecycle.
#[derive(Debug, Default)]
pub struct AiServiceSubscriptionManager {
    subscriptions: BTreeMap<String, AiServiceSubscription>,
    next_subscription_seq: u64,
}

impl AiServiceSubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a subscription and returns its id.
    pub fn create_subscription(
        &mut self,
        ai_service_name: &str,
        ue_imsi_list: Vec<Imsi>,
    ) -> Result<String> {
        if ue_imsi_list.is_empty() {
            return Err(Error::Subscription(format!(
                "subscription for {ai_service_name} needs at least one UE"
            )));
        }

        self.next_subscription_seq += 1;
        let subscription_id = format!("sub_{:04}", self.next_subscription_seq);
        info!(
            "AI service subscription {subscription_id} created for {ai_service_name} covering {} UEs",
            ue_imsi_list.len()
        );
        self.subscriptions.insert(
            subscription_id.clone(),
            AiServiceSubscription {
                subscription_id: subscription_id.clone(),
                ai_service_name: ai_service_name.to_string(),
                ue_imsi_list,
            },
        );
        Ok(subscription_id)
    }

    pub fn remove_subscription(&mut self, subscription_id: &str) -> Result<()> {
        self.subscriptions
            .remove(subscription_id)
            .map(|_| info!("AI service subscription {subscription_id} removed"))
            .ok_or_else(|| Error::NotFound(format!("subscription {subscription_id}")))
    }

    pub fn subscriptions(&self) -> &BTreeMap<String, AiServiceSubscription> {
        &self.subscriptions
    }

    /// Per-tick hook. Safe to call with no subscriptions present.
    pub fn step(&mut self, _delta_time: f64) {
        for subscription in self.subscriptions.values() {
            debug!(
                "stepping AI service subscription {} for service {}",
                subscription.subscription_id, subscription.ai_service_name
            );
        }
    }
}
