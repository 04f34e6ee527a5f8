use serde::Serialize;

use super::domain::{
    offer_letter_blocked, JobRoleId, LabourAssignment, LabourProfile, Requirement, RoleForward,
    OFFER_LETTER_BLOCKED_REASON,
};
use super::reconciliation::{reconcile, RoleReconciliation};
use super::repository::RequirementRecord;
use super::stage::StageAction;

pub const AWAITING_APPROVAL_REASON: &str = "Awaiting admin and client acceptance";

/// Stage action as rendered for an assignment card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionView {
    pub action: StageAction,
    pub endpoint: &'static str,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentView {
    #[serde(flatten)]
    pub assignment: LabourAssignment,
    pub labour_name: String,
    pub stage_label: &'static str,
    pub deployed: bool,
    pub actions: Vec<ActionView>,
}

impl AssignmentView {
    pub fn build(
        assignment: LabourAssignment,
        profiles: &[LabourProfile],
        offer_letter_blocked: bool,
    ) -> Self {
        let labour_name = profiles
            .iter()
            .find(|profile| profile.id == assignment.labour_profile_id)
            .map(|profile| profile.name.clone())
            .unwrap_or_else(|| assignment.labour_profile_id.0.clone());
        let stage = assignment.current_stage;
        let approved = assignment.is_accepted();

        let actions = stage
            .available_actions()
            .into_iter()
            .map(|action| {
                let disabled_reason =
                    if action.requires_offer_letter_details() && offer_letter_blocked {
                        Some(OFFER_LETTER_BLOCKED_REASON)
                    } else if !approved {
                        Some(AWAITING_APPROVAL_REASON)
                    } else {
                        None
                    };
                ActionView {
                    action,
                    endpoint: action.endpoint(),
                    enabled: disabled_reason.is_none(),
                    disabled_reason,
                }
            })
            .collect();

        Self {
            labour_name,
            stage_label: stage.label(),
            deployed: stage.is_terminal(),
            actions,
            assignment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleView {
    pub job_role_id: JobRoleId,
    pub title: String,
    pub reconciliation: RoleReconciliation,
    pub assignments: Vec<AssignmentView>,
}

/// Fully derived state of one requirement, rebuilt after every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementTree {
    pub requirement: Requirement,
    pub forwards: Vec<RoleForward>,
    pub offer_letter_blocked: bool,
    pub roles: Vec<RoleView>,
}

impl RequirementTree {
    pub fn build(
        record: RequirementRecord,
        assignments: &[LabourAssignment],
        profiles: &[LabourProfile],
    ) -> Self {
        let blocked = offer_letter_blocked(record.offer_letter.as_ref());
        let roles = record
            .requirement
            .job_roles
            .iter()
            .map(|role| RoleView {
                job_role_id: role.id.clone(),
                title: role.title.clone(),
                reconciliation: reconcile(role, assignments, profiles),
                assignments: assignments
                    .iter()
                    .filter(|assignment| assignment.job_role_id == role.id)
                    .cloned()
                    .map(|assignment| AssignmentView::build(assignment, profiles, blocked))
                    .collect(),
            })
            .collect();

        Self {
            requirement: record.requirement,
            forwards: record.forwards,
            offer_letter_blocked: blocked,
            roles,
        }
    }

    pub fn role(&self, id: &JobRoleId) -> Option<&RoleView> {
        self.roles.iter().find(|role| &role.job_role_id == id)
    }
}
