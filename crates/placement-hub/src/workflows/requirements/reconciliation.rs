use serde::Serialize;

use super::domain::{
    AssignmentId, JobRole, JobRoleId, LabourAssignment, LabourProfile, ReviewSide, ReviewStatus,
};

/// Which reviewing side turned a labourer down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectedBy {
    Admin,
    Client,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedLabour {
    pub assignment_id: AssignmentId,
    pub labour_name: String,
    pub rejected_by: RejectedBy,
    pub feedback: Vec<String>,
}

/// Shortfall derived for one job role from its current assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleReconciliation {
    pub job_role_id: JobRoleId,
    pub requested_quantity: u32,
    pub forwarded_quantity: u32,
    pub admin_rejected_count: u32,
    pub accepted_count: u32,
    /// Rejections tolerated before the role is flagged; negative when under-forwarded.
    pub rejection_threshold: i64,
    pub total_needed: u32,
    pub priority: bool,
    pub rejected: Vec<RejectedLabour>,
}

fn rejected_entry(
    assignment: &LabourAssignment,
    profiles: &[LabourProfile],
) -> Option<RejectedLabour> {
    let rejected_by = match (assignment.admin_status, assignment.client_status) {
        (ReviewStatus::Rejected, ReviewStatus::Rejected) => RejectedBy::Both,
        (ReviewStatus::Rejected, _) => RejectedBy::Admin,
        (_, ReviewStatus::Rejected) => RejectedBy::Client,
        _ => return None,
    };

    let labour_name = profiles
        .iter()
        .find(|profile| profile.id == assignment.labour_profile_id)
        .map(|profile| profile.name.clone())
        .unwrap_or_else(|| assignment.labour_profile_id.0.clone());

    let feedback = [
        (ReviewSide::Admin, &assignment.admin_feedback),
        (ReviewSide::Client, &assignment.client_feedback),
    ]
    .into_iter()
    .filter(|(side, _)| assignment.status_for(*side) == ReviewStatus::Rejected)
    .filter_map(|(side, text)| {
        text.as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(|text| format!("{}: {}", side.label(), text))
    })
    .collect();

    Some(RejectedLabour {
        assignment_id: assignment.id.clone(),
        labour_name,
        rejected_by,
        feedback,
    })
}

/// Derive how many labourers a role still needs. Read-only: persisted flags are owned by
/// the forwarding and review operations.
pub fn reconcile(
    role: &JobRole,
    assignments: &[LabourAssignment],
    profiles: &[LabourProfile],
) -> RoleReconciliation {
    let for_role = || {
        assignments
            .iter()
            .filter(move |assignment| assignment.job_role_id == role.id)
    };

    let admin_rejected_count = for_role()
        .filter(|assignment| assignment.admin_status == ReviewStatus::Rejected)
        .count() as u32;
    let accepted_count = for_role()
        .filter(|assignment| assignment.is_accepted())
        .count() as u32;

    let rejection_threshold = i64::from(role.forwarded_quantity) - i64::from(role.quantity);
    let total_needed = role.forwarded_quantity.saturating_sub(accepted_count);
    let priority = i64::from(admin_rejected_count) > rejection_threshold || role.needs_more_labour;

    let rejected = if priority {
        for_role()
            .filter_map(|assignment| rejected_entry(assignment, profiles))
            .collect()
    } else {
        Vec::new()
    };

    RoleReconciliation {
        job_role_id: role.id.clone(),
        requested_quantity: role.quantity,
        forwarded_quantity: role.forwarded_quantity,
        admin_rejected_count,
        accepted_count,
        rejection_threshold,
        total_needed,
        priority,
        rejected,
    }
}
