//! Core network: a minimal AMF/authentication stand-in
//!
//! On registration the core assigns the UE a network slice (honoring a
//! requested slice when the UE is subscribed to it, otherwise picking
//! uniformly at random among its subscriptions) and hands out a copy of
//! the slice's QoS profile. Subscription data is seeded at network setup
//! and can be provisioned at runtime for UEs admitted on request.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use ransim_common::error::{Error, Result};
use ransim_common::types::{Imsi, QosProfile, SliceType};

/// Record of one registered UE.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ActiveUeRecord {
    pub slice_type: SliceType,
    pub qos_profile: QosProfile,
}

pub struct CoreNetwork {
    /// Canonical slice table; profiles are copied out, never aliased
    slice_profiles: BTreeMap<SliceType, QosProfile>,
    /// Slice entitlements per IMSI (read-mostly seed/config data)
    ue_subscription_data: BTreeMap<Imsi, Vec<SliceType>>,
    active_ues: BTreeMap<Imsi, ActiveUeRecord>,
    rng: StdRng,
}

impl std::fmt::Debug for CoreNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreNetwork")
            .field("subscriptions", &self.ue_subscription_data.len())
            .field("active_ues", &self.active_ues.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl CoreNetwork {
    pub fn new(slice_profiles: BTreeMap<SliceType, QosProfile>, seed: Option<u64>) -> Self {
        Self {
            slice_profiles,
            ue_subscription_data: BTreeMap::new(),
            active_ues: BTreeMap::new(),
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
        }
    }

    /// Seeds subscription data for `ue_count` IMSI slots: roughly one in
    /// five devices is an IoT sensor on mMTC only; everything else gets
    /// eMBB, half of those additionally URLLC.
    pub fn seed_subscriptions(&mut self, ue_count: u32) {
        for i in 0..ue_count {
            let imsi = format!("IMSI_{i}");
            if self.rng.gen::<f64>() < 0.2 {
                self.ue_subscription_data.insert(imsi, vec![SliceType::Mmtc]);
                continue;
            }
            let mut slices = vec![SliceType::Embb];
            if self.rng.gen::<f64>() < 0.5 {
                slices.push(SliceType::Urllc);
            }
            self.ue_subscription_data.insert(imsi, slices);
        }
    }

    /// Installs or replaces a UE's slice subscriptions.
    pub fn provision_subscription(&mut self, imsi: &str, slices: Vec<SliceType>) -> Result<()> {
        if slices.is_empty() {
            return Err(Error::RegistrationRejected(format!(
                "UE {imsi}: subscription list must not be empty"
            )));
        }
        self.ue_subscription_data.insert(imsi.to_string(), slices);
        Ok(())
    }

    pub fn subscription(&self, imsi: &str) -> Option<&Vec<SliceType>> {
        self.ue_subscription_data.get(imsi)
    }

    /// Picks a slice and QoS profile for a registering UE, records it as
    /// active, and returns the assignment.
    ///
    /// A UE with no subscription record is rejected unless it requested a
    /// specific slice, in which case the subscription is provisioned ad hoc.
    pub fn handle_ue_authentication_and_registration(
        &mut self,
        imsi: &str,
        requested_slice: Option<SliceType>,
    ) -> Result<(SliceType, QosProfile)> {
        let slice_type = match self.ue_subscription_data.get(imsi) {
            None => match requested_slice {
                Some(slice) => {
                    self.ue_subscription_data.insert(imsi.to_string(), vec![slice]);
                    slice
                }
                None => {
                    return Err(Error::RegistrationRejected(format!(
                        "UE {imsi} has no subscription data"
                    )));
                }
            },
            Some(subscribed) => {
                if subscribed.is_empty() {
                    return Err(Error::RegistrationRejected(format!(
                        "UE {imsi} has an empty subscription list"
                    )));
                }
                match requested_slice {
                    Some(slice) if subscribed.contains(&slice) => slice,
                    _ => subscribed[self.rng.gen_range(0..subscribed.len())],
                }
            }
        };

        let qos_profile = *self.slice_profiles.get(&slice_type).ok_or_else(|| {
            Error::Config(format!("no QoS profile configured for slice {slice_type}"))
        })?;

        self.active_ues.insert(imsi.to_string(), ActiveUeRecord { slice_type, qos_profile });
        info!("CoreNetwork: registered UE {imsi} on slice {slice_type}");
        Ok((slice_type, qos_profile))
    }

    /// Removes a UE from the active set. A no-op (with a log) for unknown
    /// UEs.
    pub fn handle_deregistration_request(&mut self, imsi: &str) {
        if self.active_ues.remove(imsi).is_some() {
            info!("CoreNetwork: deregistered UE {imsi}");
        } else {
            warn!("CoreNetwork: UE {imsi} not found in active UEs");
        }
    }

    pub fn active_ues(&self) -> &BTreeMap<Imsi, ActiveUeRecord> {
        &self.active_ues
    }

    pub fn active_ue_count(&self) -> usize {
        self.active_ues.len()
    }
}
