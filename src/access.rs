//! Access control at the engine boundary.
//!
//! A principal may act for a storyteller when it is the storyteller or holds a
//! delegation from them. Checks run before any storyteller-scoped operation.

use crate::error::EngineError;
use crate::types::{PrincipalId, StorytellerId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

pub trait AccessPolicy: Send + Sync {
    fn can_act_for(&self, principal: &PrincipalId, storyteller: &StorytellerId) -> bool;

    fn authorize(
        &self,
        principal: &PrincipalId,
        storyteller: &StorytellerId,
    ) -> Result<(), EngineError> {
        if self.can_act_for(principal, storyteller) {
            Ok(())
        } else {
            warn!(principal = %principal, storyteller = %storyteller, "Access denied");
            Err(EngineError::AccessDenied {
                principal: principal.clone(),
                storyteller: storyteller.clone(),
            })
        }
    }
}

/// Delegation table: storyteller -> principals allowed to act for them
#[derive(Debug, Default)]
pub struct DelegationAccess {
    delegations: RwLock<HashMap<StorytellerId, HashSet<PrincipalId>>>,
}

impl DelegationAccess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[access] delegations` configuration table
    pub fn from_table(table: &BTreeMap<String, Vec<String>>) -> Self {
        let access = Self::new();
        for (storyteller, principals) in table {
            for principal in principals {
                access.grant(
                    &StorytellerId::new(storyteller.clone()),
                    PrincipalId::new(principal.clone()),
                );
            }
        }
        access
    }

    pub fn grant(&self, storyteller: &StorytellerId, principal: PrincipalId) {
        self.delegations
            .write()
            .entry(storyteller.clone())
            .or_default()
            .insert(principal);
    }

    pub fn revoke(&self, storyteller: &StorytellerId, principal: &PrincipalId) -> bool {
        self.delegations
            .write()
            .get_mut(storyteller)
            .map_or(false, |set| set.remove(principal))
    }

    pub fn delegates(&self, storyteller: &StorytellerId) -> Vec<PrincipalId> {
        let mut delegates: Vec<PrincipalId> = self
            .delegations
            .read()
            .get(storyteller)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        delegates.sort();
        delegates
    }
}

impl AccessPolicy for DelegationAccess {
    fn can_act_for(&self, principal: &PrincipalId, storyteller: &StorytellerId) -> bool {
        principal.as_str() == storyteller.as_str()
            || self
                .delegations
                .read()
                .get(storyteller)
                .map_or(false, |set| set.contains(principal))
    }
}
