use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::Principal;
use super::errors::AcceptanceError;

/// Eligible voters, curated by a single immutable chairman.
///
/// The chairman is seated at construction; add and remove rights derive from the chairman
/// identity alone and never from membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeRegistry {
    chairman: Principal,
    members: BTreeSet<Principal>,
}

impl CommitteeRegistry {
    pub fn new(chairman: Principal) -> Self {
        let mut members = BTreeSet::new();
        members.insert(chairman.clone());
        Self { chairman, members }
    }

    pub fn chairman(&self) -> &Principal {
        &self.chairman
    }

    pub fn add_member(
        &mut self,
        caller: &Principal,
        member: Principal,
    ) -> Result<(), AcceptanceError> {
        self.ensure_chairman(caller)?;
        if self.members.contains(&member) {
            return Err(AcceptanceError::AlreadyMember);
        }
        self.members.insert(member);
        Ok(())
    }

    pub fn remove_member(
        &mut self,
        caller: &Principal,
        member: &Principal,
    ) -> Result<(), AcceptanceError> {
        self.ensure_chairman(caller)?;
        if !self.members.remove(member) {
            return Err(AcceptanceError::NotMember);
        }
        Ok(())
    }

    pub fn is_member(&self, principal: &Principal) -> bool {
        self.members.contains(principal)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Members in stable (lexicographic) order.
    pub fn members(&self) -> impl Iterator<Item = &Principal> {
        self.members.iter()
    }

    fn ensure_chairman(&self, caller: &Principal) -> Result<(), AcceptanceError> {
        if caller == &self.chairman {
            Ok(())
        } else {
            Err(AcceptanceError::NotChairman)
        }
    }
}
