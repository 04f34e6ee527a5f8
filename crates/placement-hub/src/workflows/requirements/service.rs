use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::cache::RequirementCache;
use super::documents::{prepare_upload, UploadedFile};
use super::domain::{
    offer_letter_blocked, Agency, AgencyId, AgencyResponse, AgencyStatus, AssignmentDocuments,
    AssignmentId, ClientId, JobRole, JobRoleDraft, JobRoleId, LabourAssignment, LabourProfile,
    LabourProfileDraft, LabourProfileId, LabourStatus, OfferLetterDetails, Requirement,
    RequirementId, RequirementStatus, ReviewSide, ReviewStatus, VerificationStatus,
    OFFER_LETTER_BLOCKED_REASON,
};
use super::forwarding::{
    apply_forwards, recompute_role_forwarding, rejected_agencies, ForwardRequest,
    ForwardingDraft, ForwardingMode, ForwardingViolation,
};
use super::reconciliation::RoleReconciliation;
use super::repository::{
    DocumentError, DocumentStore, PlacementRepository, RepositoryError, RequirementFilter,
    RequirementRecord,
};
use super::stage::{Stage, StageAction, StageTransitionError};
use super::status::{check_transition, StatusTransitionError};
use super::views::{AssignmentView, RequirementTree};
use crate::config::WorkflowConfig;
use crate::workflows::labour_import::LabourImport;
use crate::workflows::notifications::{
    Notification, NotificationKind, NotificationPublisher, Priority, Recipient,
};

static REQUIREMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static JOB_ROLE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static AGENCY_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static LABOUR_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static ASSIGNMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_id(sequence: &AtomicU64, prefix: &str) -> String {
    let id = sequence.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

fn clean(text: Option<String>) -> Option<String> {
    text.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Client submission creating a requirement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequirement {
    pub client_id: ClientId,
    pub job_roles: Vec<JobRoleDraft>,
    /// `false` keeps the requirement as a client-only draft.
    #[serde(default)]
    pub submit: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgency {
    pub name: String,
    pub contact_email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignLabour {
    pub labour_profile_id: LabourProfileId,
    pub agency_id: AgencyId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardAnswer {
    pub decision: AgencyResponse,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDecision {
    pub side: ReviewSide,
    pub decision: ReviewStatus,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Payload-carrying form of a [`StageAction`].
#[derive(Debug, Clone)]
pub enum StageCommand {
    UploadOfferLetter(UploadedFile),
    VerifyOfferLetter,
    MarkVisaApplied,
    MarkQvcPaid,
    SignContract,
    MarkMedicalCleared,
    MarkFingerprintDone,
    UploadVisa(UploadedFile),
    ScheduleTravel { travel_date: NaiveDate },
    ConfirmTravel,
    ConfirmArrival { status: String, notes: Option<String> },
}

impl StageCommand {
    pub fn action(&self) -> StageAction {
        match self {
            StageCommand::UploadOfferLetter(_) => StageAction::UploadOfferLetter,
            StageCommand::VerifyOfferLetter => StageAction::VerifyOfferLetter,
            StageCommand::MarkVisaApplied => StageAction::MarkVisaApplied,
            StageCommand::MarkQvcPaid => StageAction::MarkQvcPaid,
            StageCommand::SignContract => StageAction::SignContract,
            StageCommand::MarkMedicalCleared => StageAction::MarkMedicalCleared,
            StageCommand::MarkFingerprintDone => StageAction::MarkFingerprintDone,
            StageCommand::UploadVisa(_) => StageAction::UploadVisa,
            StageCommand::ScheduleTravel { .. } => StageAction::ScheduleTravel,
            StageCommand::ConfirmTravel => StageAction::ConfirmTravel,
            StageCommand::ConfirmArrival { .. } => StageAction::ConfirmArrival,
        }
    }
}

/// Assignments of one job role together with its derived shortfall.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignments {
    pub assignments: Vec<AssignmentView>,
    pub reconciliation: RoleReconciliation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderSummary {
    pub roles_flagged: usize,
    pub client_reminders: usize,
}

/// Service composing the repository, document store, notification fan-out, and the
/// forwarding, reconciliation, and stage engines.
pub struct PlacementService<S, N, D> {
    repository: Arc<S>,
    notifier: Arc<N>,
    documents: Arc<D>,
    cache: RequirementCache,
    config: WorkflowConfig,
}

impl<S, N, D> PlacementService<S, N, D>
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    pub fn new(
        repository: Arc<S>,
        notifier: Arc<N>,
        documents: Arc<D>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            repository,
            notifier,
            documents,
            cache: RequirementCache::default(),
            config,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    fn notify(&self, notification: Notification) {
        let recipient = notification.recipient.key();
        if let Err(err) = self.notifier.publish(notification) {
            warn!(%recipient, error = %err, "notification delivery failed");
        }
    }

    fn load_tree(
        &self,
        id: &RequirementId,
    ) -> Result<Option<RequirementTree>, PlacementServiceError> {
        let Some(record) = self.repository.fetch_requirement(id)? else {
            return Ok(None);
        };

        let role_ids: Vec<JobRoleId> = record
            .requirement
            .job_roles
            .iter()
            .map(|role| role.id.clone())
            .collect();
        let assignments = self.repository.assignments_for_roles(&role_ids)?;
        let profile_ids: Vec<LabourProfileId> = assignments
            .iter()
            .map(|assignment| assignment.labour_profile_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let profiles = self.repository.profiles(&profile_ids)?;

        Ok(Some(RequirementTree::build(record, &assignments, &profiles)))
    }

    /// Rebuild the derived tree from authoritative state. Called after every mutation.
    pub fn refresh(&self, id: &RequirementId) -> Result<Arc<RequirementTree>, PlacementServiceError> {
        let generation = self.cache.invalidate(id);
        let tree = self
            .load_tree(id)?
            .ok_or_else(|| PlacementServiceError::NotFound(format!("requirement {id}")))?;
        Ok(self.cache.store(tree, generation))
    }

    pub fn requirement(
        &self,
        id: &RequirementId,
    ) -> Result<Arc<RequirementTree>, PlacementServiceError> {
        self.cache
            .get_or_load(id, || self.load_tree(id))?
            .ok_or_else(|| PlacementServiceError::NotFound(format!("requirement {id}")))
    }

    fn record(&self, id: &RequirementId) -> Result<RequirementRecord, PlacementServiceError> {
        self.repository
            .fetch_requirement(id)?
            .ok_or_else(|| PlacementServiceError::NotFound(format!("requirement {id}")))
    }

    fn record_for_role(
        &self,
        job_role_id: &JobRoleId,
    ) -> Result<RequirementRecord, PlacementServiceError> {
        self.repository
            .requirement_for_role(job_role_id)?
            .ok_or_else(|| PlacementServiceError::NotFound(format!("job role {job_role_id}")))
    }

    fn agency(&self, id: &AgencyId) -> Result<Agency, PlacementServiceError> {
        self.repository
            .fetch_agency(id)?
            .ok_or_else(|| PlacementServiceError::NotFound(format!("agency {id}")))
    }

    fn assignment(&self, id: &AssignmentId) -> Result<LabourAssignment, PlacementServiceError> {
        self.repository
            .fetch_assignment(id)?
            .ok_or_else(|| PlacementServiceError::NotFound(format!("assignment {id}")))
    }

    fn profile(&self, id: &LabourProfileId) -> Result<LabourProfile, PlacementServiceError> {
        self.repository
            .fetch_profile(id)?
            .ok_or_else(|| PlacementServiceError::NotFound(format!("labour profile {id}")))
    }

    /// Create a requirement as a draft or submit it straight to the admin queue.
    pub fn submit_requirement(
        &self,
        submission: NewRequirement,
    ) -> Result<Arc<RequirementTree>, PlacementServiceError> {
        if submission.job_roles.is_empty() {
            return Err(PlacementServiceError::Invalid(
                "a requirement needs at least one job role".to_string(),
            ));
        }
        for role in &submission.job_roles {
            if role.title.trim().is_empty() {
                return Err(PlacementServiceError::Invalid(
                    "every job role needs a title".to_string(),
                ));
            }
            if role.quantity == 0 {
                return Err(PlacementServiceError::Invalid(format!(
                    "job role '{}' needs a positive quantity",
                    role.title.trim()
                )));
            }
        }

        let id = RequirementId(next_id(&REQUIREMENT_SEQUENCE, "req"));
        let now = Utc::now();
        let status = if submission.submit {
            RequirementStatus::Submitted
        } else {
            RequirementStatus::Draft
        };
        let job_roles = submission
            .job_roles
            .into_iter()
            .map(|mut draft| {
                draft.title = draft.title.trim().to_string();
                JobRole::from_draft(
                    JobRoleId(next_id(&JOB_ROLE_SEQUENCE, "role")),
                    id.clone(),
                    draft,
                )
            })
            .collect();

        self.repository.insert_requirement(RequirementRecord {
            requirement: Requirement {
                id: id.clone(),
                client_id: submission.client_id,
                status,
                rejection_reason: None,
                created_at: now,
                updated_at: now,
                job_roles,
            },
            forwards: Vec::new(),
            offer_letter: None,
        })?;

        info!(requirement = %id, status = status.label(), "requirement created");
        if status == RequirementStatus::Submitted {
            self.notify(Notification::new(
                Recipient::Admin,
                NotificationKind::RequirementStatusChanged,
                Priority::Normal,
                "New requirement submitted",
                format!("Requirement {id} is waiting for review"),
                id.0.clone(),
            ));
        }

        self.refresh(&id)
    }

    /// List requirements. Without explicit statuses the admin queue is returned; drafts
    /// are only visible to their owning client.
    pub fn list_requirements(
        &self,
        mut filter: RequirementFilter,
    ) -> Result<Vec<Requirement>, PlacementServiceError> {
        if filter.statuses.is_empty() {
            filter.statuses = RequirementStatus::admin_queue().to_vec();
        }
        if filter.client_id.is_none() {
            filter
                .statuses
                .retain(|status| *status != RequirementStatus::Draft);
            if filter.statuses.is_empty() {
                return Ok(Vec::new());
            }
        }

        Ok(self
            .repository
            .list_requirements(&filter)?
            .into_iter()
            .map(|record| record.requirement)
            .collect())
    }

    pub fn update_status(
        &self,
        id: &RequirementId,
        status: RequirementStatus,
        reason: Option<&str>,
    ) -> Result<Arc<RequirementTree>, PlacementServiceError> {
        let mut record = self.record(id)?;
        let from = record.requirement.status;
        let reason = check_transition(from, status, reason)?;

        record.requirement.status = status;
        if reason.is_some() {
            record.requirement.rejection_reason = reason.clone();
        }
        record.requirement.updated_at = Utc::now();
        let client_id = record.requirement.client_id.clone();
        self.repository.update_requirement(record)?;

        info!(requirement = %id, from = from.label(), to = status.label(), "requirement status updated");
        let (priority, message) = match &reason {
            Some(reason) => (
                Priority::High,
                format!("Requirement {id} was rejected: {reason}"),
            ),
            None => (
                Priority::Normal,
                format!("Requirement {id} is now {}", status.label()),
            ),
        };
        self.notify(Notification::new(
            Recipient::Client(client_id),
            NotificationKind::RequirementStatusChanged,
            priority,
            "Requirement status updated",
            message,
            id.0.clone(),
        ));

        self.refresh(id)
    }

    /// Build an editor for a forward, pre-loaded with eligible agencies and past rejections.
    pub fn draft(
        &self,
        id: &RequirementId,
        mode: ForwardingMode,
    ) -> Result<ForwardingDraft, PlacementServiceError> {
        let record = self.record(id)?;
        let agencies = self.repository.list_agencies(Some(AgencyStatus::Verified))?;
        Ok(ForwardingDraft::new(
            &record.requirement,
            &agencies,
            rejected_agencies(&record.forwards),
            mode,
        ))
    }

    pub fn forward(
        &self,
        request: ForwardRequest,
    ) -> Result<Arc<RequirementTree>, PlacementServiceError> {
        let mut record = self.record(&request.requirement_id)?;
        let status = record.requirement.status;
        if !status.is_forwardable() {
            return Err(StatusTransitionError::NotForwardable(status.label()).into());
        }

        let agencies = self.repository.list_agencies(None)?;
        let rejected = rejected_agencies(&record.forwards);
        let commitments = request.validate(&record.requirement, &agencies, &rejected)?;

        let now = Utc::now();
        apply_forwards(&mut record.forwards, &commitments, now);

        let touched: BTreeSet<&JobRoleId> = commitments
            .iter()
            .map(|commitment| &commitment.job_role_id)
            .collect();
        for role in record.requirement.job_roles.iter_mut() {
            recompute_role_forwarding(role, &record.forwards);
            if touched.contains(&role.id) {
                role.needs_more_labour = false;
                if role.forwarded_quantity > role.quantity {
                    info!(
                        job_role = %role.id,
                        requested = role.quantity,
                        forwarded = role.forwarded_quantity,
                        "job role forwarded above requested quantity"
                    );
                }
            }
        }
        record.requirement.status = status.after_forward();
        record.requirement.updated_at = now;

        let requirement_id = record.requirement.id.clone();
        let mut per_agency: Vec<(AgencyId, Vec<String>)> = Vec::new();
        for commitment in &commitments {
            let title = record
                .requirement
                .job_role(&commitment.job_role_id)
                .map(|role| role.title.clone())
                .unwrap_or_else(|| commitment.job_role_id.0.clone());
            let line = format!("{title} x{}", commitment.quantity);
            match per_agency
                .iter_mut()
                .find(|(agency, _)| agency == &commitment.agency_id)
            {
                Some((_, lines)) => lines.push(line),
                None => per_agency.push((commitment.agency_id.clone(), vec![line])),
            }
        }
        self.repository.update_requirement(record)?;

        info!(
            requirement = %requirement_id,
            commitments = commitments.len(),
            "requirement forwarded"
        );
        for (agency_id, lines) in per_agency {
            self.notify(Notification::new(
                Recipient::Agency(agency_id),
                NotificationKind::RequirementForwarded,
                Priority::High,
                "New requirement forwarded",
                format!("Requirement {requirement_id}: {}", lines.join(", ")),
                requirement_id.0.clone(),
            ));
        }

        self.refresh(&requirement_id)
    }

    /// Record an agency's answer to a forwarded quantity.
    pub fn respond_to_forward(
        &self,
        agency_id: &AgencyId,
        job_role_id: &JobRoleId,
        answer: ForwardAnswer,
    ) -> Result<Arc<RequirementTree>, PlacementServiceError> {
        if answer.decision == AgencyResponse::Pending {
            return Err(PlacementServiceError::Invalid(
                "decision must be ACCEPTED or REJECTED".to_string(),
            ));
        }

        let mut record = self.record_for_role(job_role_id)?;
        let forward = record
            .forwards
            .iter_mut()
            .find(|forward| {
                &forward.job_role_id == job_role_id
                    && &forward.agency_id == agency_id
                    && forward.is_live()
            })
            .ok_or_else(|| {
                PlacementServiceError::NotFound(format!(
                    "forward of job role {job_role_id} to agency {agency_id}"
                ))
            })?;
        if forward.response != AgencyResponse::Pending {
            return Err(PlacementServiceError::Conflict(format!(
                "forward of job role {job_role_id} was already answered"
            )));
        }

        forward.response = answer.decision;
        let rejected = answer.decision == AgencyResponse::Rejected;
        if rejected {
            forward.rejection_reason = clean(answer.reason);
        }

        let forwards = record.forwards.clone();
        let title = match record.requirement.job_role_mut(job_role_id) {
            Some(role) => {
                recompute_role_forwarding(role, &forwards);
                if rejected {
                    role.needs_more_labour = true;
                }
                role.title.clone()
            }
            None => job_role_id.0.clone(),
        };
        record.requirement.updated_at = Utc::now();
        let requirement_id = record.requirement.id.clone();
        self.repository.update_requirement(record)?;

        info!(
            requirement = %requirement_id,
            job_role = %job_role_id,
            agency = %agency_id,
            rejected,
            "forward answered"
        );
        let (priority, verb) = if rejected {
            (Priority::High, "rejected")
        } else {
            (Priority::Normal, "accepted")
        };
        self.notify(Notification::new(
            Recipient::Admin,
            NotificationKind::ForwardAnswered,
            priority,
            format!("Forward {verb}"),
            format!("Agency {agency_id} {verb} {title} on requirement {requirement_id}"),
            job_role_id.0.clone(),
        ));

        self.refresh(&requirement_id)
    }

    pub fn register_agency(&self, agency: NewAgency) -> Result<Agency, PlacementServiceError> {
        let name = agency.name.trim();
        if name.is_empty() {
            return Err(PlacementServiceError::Invalid(
                "agency name is required".to_string(),
            ));
        }
        let agency = Agency {
            id: AgencyId(next_id(&AGENCY_SEQUENCE, "agency")),
            name: name.to_string(),
            contact_email: agency.contact_email.trim().to_string(),
            status: AgencyStatus::NotVerified,
        };
        self.repository.upsert_agency(agency.clone())?;
        info!(agency = %agency.id, "agency registered");
        Ok(agency)
    }

    pub fn set_agency_status(
        &self,
        id: &AgencyId,
        status: AgencyStatus,
    ) -> Result<Agency, PlacementServiceError> {
        let mut agency = self.agency(id)?;
        agency.status = status;
        self.repository.upsert_agency(agency.clone())?;
        info!(agency = %id, ?status, "agency status updated");
        Ok(agency)
    }

    pub fn list_agencies(
        &self,
        status: Option<AgencyStatus>,
    ) -> Result<Vec<Agency>, PlacementServiceError> {
        Ok(self.repository.list_agencies(status)?)
    }

    pub fn register_labour(
        &self,
        agency_id: &AgencyId,
        draft: LabourProfileDraft,
    ) -> Result<LabourProfile, PlacementServiceError> {
        self.agency(agency_id)?;
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(PlacementServiceError::Invalid(
                "labour name is required".to_string(),
            ));
        }

        let profile = LabourProfile {
            id: LabourProfileId(next_id(&LABOUR_SEQUENCE, "labour")),
            agency_id: agency_id.clone(),
            name: name.to_string(),
            nationality: clean(draft.nationality),
            passport_number: clean(draft.passport_number),
            profession: clean(draft.profession),
            status: LabourStatus::Received,
            verification_status: VerificationStatus::Pending,
        };
        self.repository.upsert_profile(profile.clone())?;
        Ok(profile)
    }

    pub fn import_labour(
        &self,
        agency_id: &AgencyId,
        import: LabourImport,
    ) -> Result<Vec<LabourProfile>, PlacementServiceError> {
        let profiles = import
            .profiles
            .into_iter()
            .map(|draft| self.register_labour(agency_id, draft))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            agency = %agency_id,
            imported = profiles.len(),
            skipped = import.skipped.len(),
            "labour profiles imported"
        );
        Ok(profiles)
    }

    /// Attach a labour profile to a job role the agency has accepted.
    pub fn assign_labour(
        &self,
        job_role_id: &JobRoleId,
        request: AssignLabour,
    ) -> Result<LabourAssignment, PlacementServiceError> {
        let record = self.record_for_role(job_role_id)?;
        let forward = record
            .forwards
            .iter()
            .find(|forward| {
                &forward.job_role_id == job_role_id
                    && forward.agency_id == request.agency_id
                    && forward.response == AgencyResponse::Accepted
            })
            .ok_or_else(|| {
                PlacementServiceError::Invalid(format!(
                    "agency {} has not accepted job role {job_role_id}",
                    request.agency_id
                ))
            })?;

        let mut profile = self.profile(&request.labour_profile_id)?;
        if profile.agency_id != request.agency_id {
            return Err(PlacementServiceError::Invalid(format!(
                "labour profile {} belongs to another agency",
                profile.id
            )));
        }
        if matches!(profile.status, LabourStatus::Rejected | LabourStatus::Deployed) {
            return Err(PlacementServiceError::Invalid(format!(
                "labour profile {} is no longer available",
                profile.id
            )));
        }

        let existing = self
            .repository
            .assignments_for_roles(std::slice::from_ref(job_role_id))?;
        if existing
            .iter()
            .any(|assignment| assignment.labour_profile_id == profile.id && !assignment.is_rejected())
        {
            return Err(PlacementServiceError::Conflict(format!(
                "labour profile {} is already assigned to job role {job_role_id}",
                profile.id
            )));
        }
        let live_for_agency = existing
            .iter()
            .filter(|assignment| assignment.agency_id == request.agency_id && !assignment.is_rejected())
            .count() as u32;
        if live_for_agency >= forward.quantity {
            return Err(PlacementServiceError::Invalid(format!(
                "agency {} has already assigned its forwarded quantity of {}",
                request.agency_id, forward.quantity
            )));
        }

        let now = Utc::now();
        let assignment = LabourAssignment {
            id: AssignmentId(next_id(&ASSIGNMENT_SEQUENCE, "asg")),
            labour_profile_id: profile.id.clone(),
            job_role_id: job_role_id.clone(),
            agency_id: request.agency_id.clone(),
            admin_status: ReviewStatus::Pending,
            client_status: ReviewStatus::Pending,
            admin_feedback: None,
            client_feedback: None,
            current_stage: Stage::OfferLetterSign,
            documents: AssignmentDocuments::default(),
            travel_date: None,
            arrival_notes: None,
            created_at: now,
            updated_at: now,
        };
        self.repository.insert_assignment(assignment.clone())?;

        if matches!(profile.status, LabourStatus::Received | LabourStatus::Shortlisted) {
            profile.status = LabourStatus::UnderReview;
            self.repository.upsert_profile(profile.clone())?;
        }

        let requirement_id = record.requirement.id.clone();
        info!(
            assignment = %assignment.id,
            job_role = %job_role_id,
            agency = %request.agency_id,
            "labour assigned"
        );
        for recipient in [
            Recipient::Admin,
            Recipient::Client(record.requirement.client_id.clone()),
        ] {
            self.notify(Notification::new(
                recipient,
                NotificationKind::AssignmentCreated,
                Priority::Normal,
                "Labour proposed",
                format!("{} was proposed for job role {job_role_id}", profile.name),
                assignment.id.0.clone(),
            ));
        }

        self.refresh(&requirement_id)?;
        Ok(assignment)
    }

    pub fn role_assignments(
        &self,
        job_role_id: &JobRoleId,
    ) -> Result<RoleAssignments, PlacementServiceError> {
        let record = self.record_for_role(job_role_id)?;
        let tree = self.requirement(&record.requirement.id)?;
        let role = tree
            .role(job_role_id)
            .ok_or_else(|| PlacementServiceError::NotFound(format!("job role {job_role_id}")))?;
        Ok(RoleAssignments {
            assignments: role.assignments.clone(),
            reconciliation: role.reconciliation.clone(),
        })
    }

    /// Record an admin or client accept/reject decision on an assignment.
    pub fn review_assignment(
        &self,
        id: &AssignmentId,
        review: ReviewDecision,
    ) -> Result<LabourAssignment, PlacementServiceError> {
        if review.decision == ReviewStatus::Pending {
            return Err(PlacementServiceError::Invalid(
                "decision must be ACCEPTED or REJECTED".to_string(),
            ));
        }

        let mut assignment = self.assignment(id)?;
        if assignment.current_stage.is_terminal() {
            return Err(PlacementServiceError::Conflict(format!(
                "assignment {id} is deployed and can no longer be reviewed"
            )));
        }

        let feedback = clean(review.feedback);
        match review.side {
            ReviewSide::Admin => {
                assignment.admin_status = review.decision;
                assignment.admin_feedback = feedback;
            }
            ReviewSide::Client => {
                assignment.client_status = review.decision;
                assignment.client_feedback = feedback;
            }
        }
        assignment.updated_at = Utc::now();

        let mut profile = self.profile(&assignment.labour_profile_id)?;
        if assignment.is_rejected() {
            profile.status = LabourStatus::Rejected;
        } else if assignment.is_accepted() {
            profile.status = LabourStatus::Approved;
        } else {
            profile.status = LabourStatus::UnderReview;
        }

        let mut record = self.record_for_role(&assignment.job_role_id)?;
        let rejected = review.decision == ReviewStatus::Rejected;
        if rejected {
            if let Some(role) = record.requirement.job_role_mut(&assignment.job_role_id) {
                role.needs_more_labour = true;
            }
            record.requirement.updated_at = assignment.updated_at;
        }

        self.repository.update_assignment(assignment.clone())?;
        self.repository.upsert_profile(profile.clone())?;
        let requirement_id = record.requirement.id.clone();
        let client_id = record.requirement.client_id.clone();
        if rejected {
            self.repository.update_requirement(record)?;
        }

        info!(
            assignment = %id,
            side = review.side.label(),
            decision = ?review.decision,
            "assignment reviewed"
        );
        let (priority, verb) = if rejected {
            (Priority::High, "rejected")
        } else {
            (Priority::Normal, "accepted")
        };
        self.notify(Notification::new(
            Recipient::Agency(assignment.agency_id.clone()),
            NotificationKind::AssignmentReviewed,
            priority,
            format!("Labour {verb}"),
            format!("{} was {verb} by the {}", profile.name, review.side.label()),
            id.0.clone(),
        ));
        if review.side == ReviewSide::Admin && !rejected {
            self.notify(Notification::new(
                Recipient::Client(client_id),
                NotificationKind::AssignmentReviewed,
                Priority::Normal,
                "Labour awaiting your review",
                format!("{} was approved by the admin", profile.name),
                id.0.clone(),
            ));
        }

        self.refresh(&requirement_id)?;
        Ok(assignment)
    }

    /// Apply one onboarding action. The stage is left unchanged on any failure.
    pub fn advance_stage(
        &self,
        id: &AssignmentId,
        command: StageCommand,
    ) -> Result<LabourAssignment, PlacementServiceError> {
        let mut assignment = self.assignment(id)?;
        if !assignment.is_accepted() {
            return Err(PlacementServiceError::AwaitingApproval(id.clone()));
        }

        let action = command.action();
        let from = assignment.current_stage;
        let next = from.apply(action)?;

        let record = self.record_for_role(&assignment.job_role_id)?;
        if action.requires_offer_letter_details()
            && offer_letter_blocked(record.offer_letter.as_ref())
        {
            return Err(PlacementServiceError::OfferLetterBlocked);
        }

        let limit = self.config.upload_max_bytes;
        match command {
            StageCommand::UploadOfferLetter(file) => {
                let upload = prepare_upload(id, "offer-letter", file, limit)?;
                assignment.documents.offer_letter = Some(self.documents.store(upload)?);
            }
            StageCommand::VerifyOfferLetter => {
                if assignment.documents.offer_letter.is_none() {
                    return Err(PlacementServiceError::Invalid(
                        "the signed offer letter has not been uploaded".to_string(),
                    ));
                }
            }
            StageCommand::UploadVisa(file) => {
                let upload = prepare_upload(id, "visa", file, limit)?;
                assignment.documents.visa = Some(self.documents.store(upload)?);
            }
            StageCommand::ScheduleTravel { travel_date } => {
                assignment.travel_date = Some(travel_date);
            }
            StageCommand::ConfirmArrival { status, notes } => {
                if !status.trim().eq_ignore_ascii_case("ARRIVED") {
                    return Err(PlacementServiceError::Invalid(
                        "arrival status must be ARRIVED".to_string(),
                    ));
                }
                assignment.arrival_notes = clean(notes);
            }
            StageCommand::MarkVisaApplied
            | StageCommand::MarkQvcPaid
            | StageCommand::SignContract
            | StageCommand::MarkMedicalCleared
            | StageCommand::MarkFingerprintDone
            | StageCommand::ConfirmTravel => {}
        }

        assignment.current_stage = next;
        assignment.updated_at = Utc::now();
        self.repository.update_assignment(assignment.clone())?;

        let mut profile = self.profile(&assignment.labour_profile_id)?;
        if next == Stage::Deployed {
            profile.status = LabourStatus::Deployed;
            self.repository.upsert_profile(profile.clone())?;
        }

        info!(
            assignment = %id,
            action = action.endpoint(),
            from = from.label(),
            to = next.label(),
            "assignment stage updated"
        );
        if next != from {
            let priority = if next == Stage::Deployed {
                Priority::High
            } else {
                Priority::Normal
            };
            for recipient in [
                Recipient::Agency(assignment.agency_id.clone()),
                Recipient::Client(record.requirement.client_id.clone()),
            ] {
                self.notify(Notification::new(
                    recipient,
                    NotificationKind::StageAdvanced,
                    priority,
                    format!("{} reached {}", profile.name, next.label()),
                    format!("Assignment {id} moved from {} to {}", from.label(), next.label()),
                    id.0.clone(),
                ));
            }
        }

        self.refresh(&record.requirement.id)?;
        Ok(assignment)
    }

    pub fn offer_letter_details(
        &self,
        id: &RequirementId,
    ) -> Result<Option<OfferLetterDetails>, PlacementServiceError> {
        Ok(self.record(id)?.offer_letter)
    }

    pub fn save_offer_letter_details(
        &self,
        id: &RequirementId,
        details: OfferLetterDetails,
    ) -> Result<OfferLetterDetails, PlacementServiceError> {
        let mut record = self.record(id)?;
        let details = OfferLetterDetails {
            working_hours: details.working_hours.trim().to_string(),
            working_days: details.working_days.trim().to_string(),
            leave_salary: details.leave_salary.trim().to_string(),
            end_of_service: details.end_of_service.trim().to_string(),
            probation_period: details.probation_period.trim().to_string(),
        };
        record.offer_letter = Some(details.clone());
        record.requirement.updated_at = Utc::now();
        self.repository.update_requirement(record)?;

        info!(requirement = %id, complete = details.is_complete(), "offer letter details saved");
        self.refresh(id)?;
        Ok(details)
    }

    /// Remind the admin about roles short of labour and clients about pending reviews.
    pub fn send_reminders(&self) -> Result<ReminderSummary, PlacementServiceError> {
        let active = self.repository.list_requirements(&RequirementFilter {
            client_id: None,
            statuses: vec![
                RequirementStatus::Forwarded,
                RequirementStatus::Accepted,
                RequirementStatus::ClientReview,
            ],
        })?;

        let mut summary = ReminderSummary::default();
        for record in active {
            let tree = self.refresh(&record.requirement.id)?;
            let requirement_id = &tree.requirement.id;

            for role in tree.roles.iter().filter(|role| role.reconciliation.priority) {
                summary.roles_flagged += 1;
                self.notify(Notification::new(
                    Recipient::Admin,
                    NotificationKind::Reminder,
                    Priority::High,
                    "Job role needs more labour",
                    format!(
                        "{} on requirement {requirement_id} still needs {} labourer(s)",
                        role.title, role.reconciliation.total_needed
                    ),
                    role.job_role_id.0.clone(),
                ));
            }

            let awaiting_client = tree
                .roles
                .iter()
                .flat_map(|role| role.assignments.iter())
                .filter(|view| {
                    view.assignment.admin_status == ReviewStatus::Accepted
                        && view.assignment.client_status == ReviewStatus::Pending
                })
                .count();
            if awaiting_client > 0 {
                summary.client_reminders += 1;
                self.notify(Notification::new(
                    Recipient::Client(tree.requirement.client_id.clone()),
                    NotificationKind::Reminder,
                    Priority::Normal,
                    "Labour awaiting your review",
                    format!(
                        "{awaiting_client} labour profile(s) on requirement {requirement_id} need your decision"
                    ),
                    requirement_id.0.clone(),
                ));
            }
        }

        info!(
            roles_flagged = summary.roles_flagged,
            client_reminders = summary.client_reminders,
            "reminders dispatched"
        );
        Ok(summary)
    }
}

/// Error raised by the placement service.
#[derive(Debug, thiserror::Error)]
pub enum PlacementServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Forwarding(#[from] ForwardingViolation),
    #[error(transparent)]
    Stage(#[from] StageTransitionError),
    #[error(transparent)]
    Status(#[from] StatusTransitionError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{}", OFFER_LETTER_BLOCKED_REASON)]
    OfferLetterBlocked,
    #[error("assignment {0} must be accepted by admin and client before onboarding")]
    AwaitingApproval(AssignmentId),
}
