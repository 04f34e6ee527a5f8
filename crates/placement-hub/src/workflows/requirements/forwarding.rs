//! Splitting a requirement's headcount across agencies.
//!
//! The operator edits a [`ForwardingDraft`], a normalized `(role, agency, quantity)` table
//! whose per-role view is derived on demand. The flattened [`ForwardRequest`] is validated
//! again on the server before any [`RoleForward`] row is written.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Agency, AgencyId, AgencyResponse, AgencyStatus, JobRole, JobRoleId, Requirement,
    RequirementId, RoleForward,
};

/// Agencies that turned down a role and may not receive it again.
pub type RejectedAgencies = HashMap<JobRoleId, HashSet<AgencyId>>;

pub fn rejected_agencies(forwards: &[RoleForward]) -> RejectedAgencies {
    let mut rejected = RejectedAgencies::new();
    for forward in forwards.iter().filter(|forward| !forward.is_live()) {
        rejected
            .entry(forward.job_role_id.clone())
            .or_default()
            .insert(forward.agency_id.clone());
    }
    rejected
}

fn is_rejected_for(rejected: &RejectedAgencies, role: &JobRoleId, agency: &AgencyId) -> bool {
    rejected
        .get(role)
        .map(|agencies| agencies.contains(agency))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ForwardingMode {
    SingleAgency,
    Split,
}

/// One commitment in the flattened forward payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardedRole {
    pub job_role_id: JobRoleId,
    pub agency_id: AgencyId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    pub requirement_id: RequirementId,
    pub forwarded_roles: Vec<ForwardedRole>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForwardingViolation {
    #[error("Please select an agency")]
    NoAgencySelected,
    #[error("Please assign quantities for {}", titles.join(", "))]
    UnassignedRoles { titles: Vec<String> },
    #[error("agency {agency_id} is not available for job role {job_role_id}")]
    AgencyUnavailable {
        job_role_id: JobRoleId,
        agency_id: AgencyId,
    },
    #[error("agency {agency_id} is already assigned to job role {job_role_id}")]
    DuplicateAssignment {
        job_role_id: JobRoleId,
        agency_id: AgencyId,
    },
    #[error("job role {0} does not belong to this requirement")]
    UnknownJobRole(JobRoleId),
    #[error("agency {0} does not exist")]
    UnknownAgency(AgencyId),
    #[error("agency {0} is not verified")]
    AgencyNotVerified(AgencyId),
    #[error("agency {agency_id} has no forward for job role {job_role_id}")]
    UnknownAssignment {
        job_role_id: JobRoleId,
        agency_id: AgencyId,
    },
    #[error("forward request does not contain any positive quantity")]
    EmptyRequest,
}

#[derive(Debug, Clone)]
struct RoleSummary {
    id: JobRoleId,
    title: String,
    quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DraftRow {
    job_role_id: JobRoleId,
    agency_id: AgencyId,
    quantity: u32,
}

/// Per-role view of the draft used for rendering "Assigned: X / requested".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAllocation {
    pub job_role_id: JobRoleId,
    pub title: String,
    pub requested_quantity: u32,
    pub total_assigned: u32,
    pub forwarded: Vec<ForwardedRole>,
}

/// Operator-side editor for a forward, covering both single-agency and split modes.
#[derive(Debug, Clone)]
pub struct ForwardingDraft {
    requirement_id: RequirementId,
    mode: ForwardingMode,
    roles: Vec<RoleSummary>,
    agencies: Vec<AgencyId>,
    rejected: RejectedAgencies,
    selected_agency: Option<AgencyId>,
    single_quantities: BTreeMap<JobRoleId, u32>,
    rows: Vec<DraftRow>,
}

fn clamp_quantity(quantity: i64) -> u32 {
    quantity.clamp(0, u32::MAX as i64) as u32
}

impl ForwardingDraft {
    pub fn new(
        requirement: &Requirement,
        agencies: &[Agency],
        rejected: RejectedAgencies,
        mode: ForwardingMode,
    ) -> Self {
        let roles: Vec<RoleSummary> = requirement
            .job_roles
            .iter()
            .map(|role| RoleSummary {
                id: role.id.clone(),
                title: role.title.clone(),
                quantity: role.quantity,
            })
            .collect();
        let single_quantities = roles
            .iter()
            .map(|role| (role.id.clone(), role.quantity))
            .collect();

        Self {
            requirement_id: requirement.id.clone(),
            mode,
            roles,
            agencies: agencies
                .iter()
                .filter(|agency| agency.status == AgencyStatus::Verified)
                .map(|agency| agency.id.clone())
                .collect(),
            rejected,
            selected_agency: None,
            single_quantities,
            rows: Vec::new(),
        }
    }

    pub fn single_agency(
        requirement: &Requirement,
        agencies: &[Agency],
        rejected: RejectedAgencies,
    ) -> Self {
        Self::new(requirement, agencies, rejected, ForwardingMode::SingleAgency)
    }

    pub fn split(requirement: &Requirement, agencies: &[Agency], rejected: RejectedAgencies) -> Self {
        Self::new(requirement, agencies, rejected, ForwardingMode::Split)
    }

    pub fn mode(&self) -> ForwardingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ForwardingMode) {
        self.mode = mode;
    }

    fn role(&self, role: &JobRoleId) -> Result<&RoleSummary, ForwardingViolation> {
        self.roles
            .iter()
            .find(|summary| &summary.id == role)
            .ok_or_else(|| ForwardingViolation::UnknownJobRole(role.clone()))
    }

    /// Agencies that may still be picked for `role`. `editing` keeps the agency of the row
    /// currently being changed in the list.
    pub fn available_agencies(&self, role: &JobRoleId, editing: Option<&AgencyId>) -> Vec<AgencyId> {
        self.agencies
            .iter()
            .filter(|agency| !is_rejected_for(&self.rejected, role, agency))
            .filter(|agency| {
                Some(*agency) == editing
                    || !self
                        .rows
                        .iter()
                        .any(|row| &row.job_role_id == role && &row.agency_id == *agency)
            })
            .cloned()
            .collect()
    }

    /// Agencies eligible to take the whole requirement in single-agency mode.
    pub fn available_single_agencies(&self) -> Vec<AgencyId> {
        self.agencies
            .iter()
            .filter(|agency| {
                !self
                    .roles
                    .iter()
                    .any(|role| is_rejected_for(&self.rejected, &role.id, agency))
            })
            .cloned()
            .collect()
    }

    pub fn select_agency(&mut self, agency: AgencyId) -> Result<(), ForwardingViolation> {
        if !self.available_single_agencies().contains(&agency) {
            let job_role_id = self
                .roles
                .iter()
                .find(|role| is_rejected_for(&self.rejected, &role.id, &agency))
                .map(|role| role.id.clone());
            return Err(match job_role_id {
                Some(job_role_id) => ForwardingViolation::AgencyUnavailable {
                    job_role_id,
                    agency_id: agency,
                },
                None => ForwardingViolation::UnknownAgency(agency),
            });
        }
        self.selected_agency = Some(agency);
        Ok(())
    }

    /// Override a role's forward quantity in single-agency mode, bounded by the request.
    pub fn set_single_quantity(
        &mut self,
        role: &JobRoleId,
        quantity: i64,
    ) -> Result<u32, ForwardingViolation> {
        let requested = self.role(role)?.quantity;
        let quantity = clamp_quantity(quantity).min(requested);
        self.single_quantities.insert(role.clone(), quantity);
        Ok(quantity)
    }

    /// Add an agency to a role in split mode, defaulting to the unassigned remainder.
    pub fn add_assignment(
        &mut self,
        role: &JobRoleId,
        agency: AgencyId,
    ) -> Result<u32, ForwardingViolation> {
        let requested = self.role(role)?.quantity;
        if !self.available_agencies(role, None).contains(&agency) {
            let violation = if self
                .rows
                .iter()
                .any(|row| &row.job_role_id == role && row.agency_id == agency)
            {
                ForwardingViolation::DuplicateAssignment {
                    job_role_id: role.clone(),
                    agency_id: agency,
                }
            } else {
                ForwardingViolation::AgencyUnavailable {
                    job_role_id: role.clone(),
                    agency_id: agency,
                }
            };
            return Err(violation);
        }

        let quantity = requested.saturating_sub(self.total_assigned(role));
        self.rows.push(DraftRow {
            job_role_id: role.clone(),
            agency_id: agency,
            quantity,
        });
        Ok(quantity)
    }

    pub fn remove_assignment(&mut self, role: &JobRoleId, agency: &AgencyId) -> bool {
        let before = self.rows.len();
        self.rows
            .retain(|row| !(&row.job_role_id == role && &row.agency_id == agency));
        before != self.rows.len()
    }

    /// Edit a split row's quantity; negative input clamps to zero.
    pub fn set_quantity(
        &mut self,
        role: &JobRoleId,
        agency: &AgencyId,
        quantity: i64,
    ) -> Result<u32, ForwardingViolation> {
        let row = self
            .rows
            .iter_mut()
            .find(|row| &row.job_role_id == role && &row.agency_id == agency)
            .ok_or_else(|| ForwardingViolation::UnknownAssignment {
                job_role_id: role.clone(),
                agency_id: agency.clone(),
            })?;
        row.quantity = clamp_quantity(quantity);
        Ok(row.quantity)
    }

    /// Swap the agency on an existing split row, keeping its quantity.
    pub fn change_agency(
        &mut self,
        role: &JobRoleId,
        current: &AgencyId,
        replacement: AgencyId,
    ) -> Result<(), ForwardingViolation> {
        if !self
            .available_agencies(role, Some(current))
            .contains(&replacement)
        {
            return Err(ForwardingViolation::AgencyUnavailable {
                job_role_id: role.clone(),
                agency_id: replacement,
            });
        }
        let row = self
            .rows
            .iter_mut()
            .find(|row| &row.job_role_id == role && &row.agency_id == current)
            .ok_or_else(|| ForwardingViolation::UnknownAssignment {
                job_role_id: role.clone(),
                agency_id: current.clone(),
            })?;
        row.agency_id = replacement;
        Ok(())
    }

    pub fn total_assigned(&self, role: &JobRoleId) -> u32 {
        self.rows
            .iter()
            .filter(|row| &row.job_role_id == role)
            .map(|row| row.quantity)
            .sum()
    }

    pub fn all_roles_assigned(&self) -> bool {
        self.roles.iter().all(|role| self.role_has_positive_row(&role.id))
    }

    fn role_has_positive_row(&self, role: &JobRoleId) -> bool {
        self.rows
            .iter()
            .any(|row| &row.job_role_id == role && row.quantity > 0)
    }

    pub fn by_role(&self) -> Vec<RoleAllocation> {
        self.roles
            .iter()
            .map(|role| RoleAllocation {
                job_role_id: role.id.clone(),
                title: role.title.clone(),
                requested_quantity: role.quantity,
                total_assigned: self.total_assigned(&role.id),
                forwarded: self
                    .rows
                    .iter()
                    .filter(|row| row.job_role_id == role.id)
                    .map(|row| ForwardedRole {
                        job_role_id: row.job_role_id.clone(),
                        agency_id: row.agency_id.clone(),
                        quantity: row.quantity,
                    })
                    .collect(),
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), ForwardingViolation> {
        match self.mode {
            ForwardingMode::SingleAgency => {
                if self.selected_agency.is_none() {
                    return Err(ForwardingViolation::NoAgencySelected);
                }
                Ok(())
            }
            ForwardingMode::Split => {
                let titles: Vec<String> = self
                    .roles
                    .iter()
                    .filter(|role| !self.role_has_positive_row(&role.id))
                    .map(|role| role.title.clone())
                    .collect();
                if titles.is_empty() {
                    Ok(())
                } else {
                    Err(ForwardingViolation::UnassignedRoles { titles })
                }
            }
        }
    }

    /// Flatten the draft into the payload submitted to the forward endpoint.
    pub fn into_request(&self) -> Result<ForwardRequest, ForwardingViolation> {
        self.validate()?;

        let forwarded_roles = match (&self.mode, &self.selected_agency) {
            (ForwardingMode::SingleAgency, Some(agency)) => self
                .roles
                .iter()
                .map(|role| ForwardedRole {
                    job_role_id: role.id.clone(),
                    agency_id: agency.clone(),
                    quantity: self
                        .single_quantities
                        .get(&role.id)
                        .copied()
                        .unwrap_or(role.quantity),
                })
                .collect(),
            (ForwardingMode::SingleAgency, None) => {
                return Err(ForwardingViolation::NoAgencySelected)
            }
            (ForwardingMode::Split, _) => self
                .roles
                .iter()
                .flat_map(|role| {
                    self.rows
                        .iter()
                        .filter(move |row| row.job_role_id == role.id)
                        .map(|row| ForwardedRole {
                            job_role_id: row.job_role_id.clone(),
                            agency_id: row.agency_id.clone(),
                            quantity: row.quantity,
                        })
                })
                .collect(),
        };

        Ok(ForwardRequest {
            requirement_id: self.requirement_id.clone(),
            forwarded_roles,
        })
    }
}

impl ForwardRequest {
    /// Server-side check of a submitted payload. Zero-quantity rows are dropped, but every
    /// role named must keep at least one positive row. Commitments keep submission order.
    pub fn validate(
        &self,
        requirement: &Requirement,
        agencies: &[Agency],
        rejected: &RejectedAgencies,
    ) -> Result<Vec<ForwardedRole>, ForwardingViolation> {
        let mut seen = HashSet::new();
        let mut accepted = Vec::with_capacity(self.forwarded_roles.len());

        for row in &self.forwarded_roles {
            if requirement.job_role(&row.job_role_id).is_none() {
                return Err(ForwardingViolation::UnknownJobRole(row.job_role_id.clone()));
            }

            let agency = agencies
                .iter()
                .find(|agency| agency.id == row.agency_id)
                .ok_or_else(|| ForwardingViolation::UnknownAgency(row.agency_id.clone()))?;
            if agency.status != AgencyStatus::Verified {
                return Err(ForwardingViolation::AgencyNotVerified(agency.id.clone()));
            }

            if is_rejected_for(rejected, &row.job_role_id, &row.agency_id) {
                return Err(ForwardingViolation::AgencyUnavailable {
                    job_role_id: row.job_role_id.clone(),
                    agency_id: row.agency_id.clone(),
                });
            }

            if !seen.insert((row.job_role_id.clone(), row.agency_id.clone())) {
                return Err(ForwardingViolation::DuplicateAssignment {
                    job_role_id: row.job_role_id.clone(),
                    agency_id: row.agency_id.clone(),
                });
            }

            if row.quantity > 0 {
                accepted.push(row.clone());
            }
        }

        if accepted.is_empty() {
            return Err(ForwardingViolation::EmptyRequest);
        }

        let mut titles: Vec<String> = Vec::new();
        for row in &self.forwarded_roles {
            if accepted.iter().any(|kept| kept.job_role_id == row.job_role_id) {
                continue;
            }
            if let Some(role) = requirement.job_role(&row.job_role_id) {
                if !titles.contains(&role.title) {
                    titles.push(role.title.clone());
                }
            }
        }
        if !titles.is_empty() {
            return Err(ForwardingViolation::UnassignedRoles { titles });
        }

        Ok(accepted)
    }
}

/// Write validated commitments into the forward table. A live row for the same pair is
/// topped up and returned to `Pending` so the agency confirms the new total.
pub fn apply_forwards(
    forwards: &mut Vec<RoleForward>,
    commitments: &[ForwardedRole],
    now: DateTime<Utc>,
) {
    for commitment in commitments {
        match forwards.iter_mut().find(|forward| {
            forward.job_role_id == commitment.job_role_id
                && forward.agency_id == commitment.agency_id
                && forward.is_live()
        }) {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(commitment.quantity);
                existing.response = AgencyResponse::Pending;
                existing.forwarded_at = now;
            }
            None => forwards.push(RoleForward {
                job_role_id: commitment.job_role_id.clone(),
                agency_id: commitment.agency_id.clone(),
                quantity: commitment.quantity,
                response: AgencyResponse::Pending,
                rejection_reason: None,
                forwarded_at: now,
            }),
        }
    }
}

/// Refresh the denormalized forwarding fields stored on a job role.
pub fn recompute_role_forwarding(role: &mut JobRole, forwards: &[RoleForward]) {
    let live: Vec<&RoleForward> = forwards
        .iter()
        .filter(|forward| forward.job_role_id == role.id && forward.is_live())
        .collect();

    role.forwarded_quantity = live.iter().map(|forward| forward.quantity).sum();

    match live.as_slice() {
        [only] => {
            role.assigned_agency_id = Some(only.agency_id.clone());
            role.agency_status = Some(only.response);
        }
        _ => {
            role.assigned_agency_id = None;
            role.agency_status = None;
        }
    }
}
