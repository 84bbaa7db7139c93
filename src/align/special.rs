//! Special token resolver.
//!
//! Roles are resolved in a fixed order (bos, eos, pad) and the first role to
//! claim a target slot keeps it. A target that reuses its eos id as pad
//! therefore cannot have the eos mapping made just before clobbered. Donor
//! ids may be shared between roles.

use std::collections::HashSet;

use tracing::{info, warn};

use super::mapping::{MappingEntry, MappingSource, TokenMapping};
use crate::error::Result;
use crate::vocab::{SpecialRole, SpecialTokenIds};

/// Donor ids assigned to each target special role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialTokenSet {
    pub bos: Option<u32>,
    pub eos: Option<u32>,
    pub pad: Option<u32>,
}

impl SpecialTokenSet {
    fn set(&mut self, role: SpecialRole, donor_id: u32) {
        match role {
            SpecialRole::Bos => self.bos = Some(donor_id),
            SpecialRole::Eos => self.eos = Some(donor_id),
            SpecialRole::Pad => self.pad = Some(donor_id),
        }
    }
}

/// Outcome of resolving one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleStatus {
    /// The target declares no id for this role.
    NotApplicable,
    /// The donor declares no id for this role.
    DonorMissing { target_id: u32 },
    /// The target id lies outside the target vocabulary.
    TargetOutOfRange { target_id: u32 },
    /// Slot already claimed; the existing mapping was left untouched.
    AlreadyMapped {
        target_id: u32,
        donor_id: u32,
        existing: Vec<u32>,
    },
    /// The target slot now maps to the donor id.
    Mapped { target_id: u32, donor_id: u32 },
}

impl RoleStatus {
    /// True for `Mapped`.
    pub fn is_mapped(&self) -> bool {
        matches!(self, RoleStatus::Mapped { .. })
    }
}

/// What the tokenizer-config patcher should do about bos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BosHandling {
    /// Nothing to patch.
    Unchanged,
    /// The target declares no bos but the donor was trained with one.
    NeedsSyntheticBos,
    /// The target prepends bos but the donor never saw one.
    DisableTargetBos,
}

impl BosHandling {
    /// Decides bos handling from both models' declarations.
    pub fn decide(donor: &SpecialTokenIds, target: &SpecialTokenIds) -> Self {
        if target.bos.is_none() && donor.uses_bos() {
            BosHandling::NeedsSyntheticBos
        } else if target.uses_bos() && !donor.uses_bos() {
            BosHandling::DisableTargetBos
        } else {
            BosHandling::Unchanged
        }
    }
}

/// Result of special token resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialResolution {
    /// Donor ids assigned per role.
    pub assigned: SpecialTokenSet,
    /// Per-role status, in resolution order.
    pub statuses: Vec<(SpecialRole, RoleStatus)>,
    /// Signal for the tokenizer-config patcher.
    pub bos: BosHandling,
}

impl SpecialResolution {
    /// Status for `role`.
    pub fn status(&self, role: SpecialRole) -> Option<&RoleStatus> {
        self.statuses
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, status)| status)
    }

    /// Roles whose slot was already claimed.
    pub fn conflicts(&self) -> impl Iterator<Item = (SpecialRole, &RoleStatus)> {
        self.statuses
            .iter()
            .filter(|(_, s)| matches!(s, RoleStatus::AlreadyMapped { .. }))
            .map(|(r, s)| (*r, s))
    }
}

/// Assigns donor special ids to the target's special slots.
///
/// A role fails with `AlreadyMapped` (non-fatal) when its target id was
/// claimed by an earlier role or by a manual override.
pub fn resolve_special_tokens(
    mut mapping: TokenMapping,
    donor: &SpecialTokenIds,
    target: &SpecialTokenIds,
) -> Result<(TokenMapping, SpecialResolution)> {
    let mut assigned = SpecialTokenSet::default();
    let mut claimed_targets = HashSet::new();
    let mut statuses = Vec::with_capacity(SpecialRole::ALL.len());

    for role in SpecialRole::ALL {
        let status = match (target.get(role), donor.get(role)) {
            (None, _) => RoleStatus::NotApplicable,
            (Some(target_id), None) => RoleStatus::DonorMissing { target_id },
            (Some(target_id), Some(donor_id)) => match mapping.get(target_id).cloned() {
                None => RoleStatus::TargetOutOfRange { target_id },
                Some(existing)
                    if claimed_targets.contains(&target_id)
                        || existing.source() == MappingSource::Override =>
                {
                    RoleStatus::AlreadyMapped {
                        target_id,
                        donor_id,
                        existing: existing.donor_ids().to_vec(),
                    }
                }
                Some(_) => {
                    mapping.replace(
                        target_id,
                        MappingEntry::new(vec![donor_id], MappingSource::Special(role))?,
                    )?;
                    claimed_targets.insert(target_id);
                    assigned.set(role, donor_id);
                    RoleStatus::Mapped {
                        target_id,
                        donor_id,
                    }
                }
            },
        };

        match &status {
            RoleStatus::Mapped {
                target_id,
                donor_id,
            } => info!(%role, target_id, donor_id, "special token mapped"),
            RoleStatus::AlreadyMapped {
                target_id,
                existing,
                ..
            } => warn!(%role, target_id, ?existing, "special token already mapped"),
            _ => {}
        }
        statuses.push((role, status));
    }

    let bos = BosHandling::decide(donor, target);

    Ok((
        mapping,
        SpecialResolution {
            assigned,
            statuses,
            bos,
        },
    ))
}
