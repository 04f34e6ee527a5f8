use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use serde_json::Value;

use crate::config::WorkflowConfig;
use crate::workflows::notifications::{
    Notification, NotificationError, NotificationPublisher, Recipient,
};
use crate::workflows::requirements::documents::UploadedFile;
use crate::workflows::requirements::domain::{
    Agency, AgencyId, AgencyResponse, AgencyStatus, AssignmentId, ClientId, JobRoleDraft,
    JobRoleId, LabourAssignment, LabourProfile, LabourProfileDraft, LabourProfileId,
    OfferLetterDetails, RequirementId, ReviewSide, ReviewStatus,
};
use crate::workflows::requirements::forwarding::{ForwardRequest, ForwardedRole};
use crate::workflows::requirements::memory::{InMemoryDocumentStore, InMemoryPlacementRepository};
use crate::workflows::requirements::repository::{
    PlacementRepository, RepositoryError, RequirementFilter, RequirementRecord,
};
use crate::workflows::requirements::service::{
    AssignLabour, ForwardAnswer, NewAgency, NewRequirement, PlacementService, ReviewDecision,
};
use crate::workflows::requirements::views::RequirementTree;

pub(super) const CRON_SECRET: &str = "cron-secret";
pub(super) const UPLOAD_LIMIT: usize = 1024;

pub(super) type TestService =
    PlacementService<InMemoryPlacementRepository, RecordingNotifier, InMemoryDocumentStore>;

#[derive(Default, Clone)]
pub(super) struct RecordingNotifier {
    events: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub(super) fn events(&self) -> Vec<Notification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn for_recipient(&self, recipient: &Recipient) -> Vec<Notification> {
        self.events()
            .into_iter()
            .filter(|event| &event.recipient == recipient)
            .collect()
    }
}

impl NotificationPublisher for RecordingNotifier {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct UnavailableNotifier;

impl NotificationPublisher for UnavailableNotifier {
    fn publish(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Unavailable)
    }
}

/// Repository whose next `fetch_requirement` reports the record it read and then blocks
/// until released, so a reader can be held between load and cache write.
#[derive(Default)]
pub(super) struct GatedRepository {
    pub(super) inner: InMemoryPlacementRepository,
    gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

impl GatedRepository {
    pub(super) fn arm(&self, loaded: Sender<()>, release: Receiver<()>) {
        *self.gate.lock().expect("gate mutex poisoned") = Some((loaded, release));
    }
}

impl PlacementRepository for GatedRepository {
    fn insert_requirement(&self, record: RequirementRecord) -> Result<(), RepositoryError> {
        self.inner.insert_requirement(record)
    }

    fn update_requirement(&self, record: RequirementRecord) -> Result<(), RepositoryError> {
        self.inner.update_requirement(record)
    }

    fn fetch_requirement(
        &self,
        id: &RequirementId,
    ) -> Result<Option<RequirementRecord>, RepositoryError> {
        let record = self.inner.fetch_requirement(id)?;
        let gate = self.gate.lock().expect("gate mutex poisoned").take();
        if let Some((loaded, release)) = gate {
            loaded.send(()).expect("test waits for the load");
            release.recv().expect("test releases the reader");
        }
        Ok(record)
    }

    fn requirement_for_role(
        &self,
        job_role_id: &JobRoleId,
    ) -> Result<Option<RequirementRecord>, RepositoryError> {
        self.inner.requirement_for_role(job_role_id)
    }

    fn list_requirements(
        &self,
        filter: &RequirementFilter,
    ) -> Result<Vec<RequirementRecord>, RepositoryError> {
        self.inner.list_requirements(filter)
    }

    fn upsert_agency(&self, agency: Agency) -> Result<(), RepositoryError> {
        self.inner.upsert_agency(agency)
    }

    fn fetch_agency(&self, id: &AgencyId) -> Result<Option<Agency>, RepositoryError> {
        self.inner.fetch_agency(id)
    }

    fn list_agencies(&self, status: Option<AgencyStatus>) -> Result<Vec<Agency>, RepositoryError> {
        self.inner.list_agencies(status)
    }

    fn upsert_profile(&self, profile: LabourProfile) -> Result<(), RepositoryError> {
        self.inner.upsert_profile(profile)
    }

    fn fetch_profile(
        &self,
        id: &LabourProfileId,
    ) -> Result<Option<LabourProfile>, RepositoryError> {
        self.inner.fetch_profile(id)
    }

    fn profiles(&self, ids: &[LabourProfileId]) -> Result<Vec<LabourProfile>, RepositoryError> {
        self.inner.profiles(ids)
    }

    fn insert_assignment(&self, assignment: LabourAssignment) -> Result<(), RepositoryError> {
        self.inner.insert_assignment(assignment)
    }

    fn update_assignment(&self, assignment: LabourAssignment) -> Result<(), RepositoryError> {
        self.inner.update_assignment(assignment)
    }

    fn fetch_assignment(
        &self,
        id: &AssignmentId,
    ) -> Result<Option<LabourAssignment>, RepositoryError> {
        self.inner.fetch_assignment(id)
    }

    fn assignments_for_roles(
        &self,
        job_role_ids: &[JobRoleId],
    ) -> Result<Vec<LabourAssignment>, RepositoryError> {
        self.inner.assignments_for_roles(job_role_ids)
    }
}

pub(super) fn workflow_config() -> WorkflowConfig {
    WorkflowConfig {
        cron_secret: Some(CRON_SECRET.to_string()),
        upload_max_bytes: UPLOAD_LIMIT,
    }
}

pub(super) fn build_service() -> (
    TestService,
    Arc<InMemoryPlacementRepository>,
    Arc<RecordingNotifier>,
    Arc<InMemoryDocumentStore>,
) {
    let repository = Arc::new(InMemoryPlacementRepository::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let documents = Arc::new(InMemoryDocumentStore::default());
    let service = PlacementService::new(
        repository.clone(),
        notifier.clone(),
        documents.clone(),
        workflow_config(),
    );
    (service, repository, notifier, documents)
}

pub(super) fn client() -> ClientId {
    ClientId::from("client-1")
}

pub(super) fn role_draft(title: &str, quantity: u32) -> JobRoleDraft {
    JobRoleDraft {
        title: title.to_string(),
        quantity,
        nationality: Some("Nepal".to_string()),
        salary: 1800,
        allowances: Default::default(),
        min_experience_years: Some(2),
        max_experience_years: None,
        languages: vec!["English".to_string()],
    }
}

/// Electrician x10 and Plumber x5, submitted to the admin queue.
pub(super) fn submitted_requirement(service: &TestService) -> Arc<RequirementTree> {
    service
        .submit_requirement(NewRequirement {
            client_id: client(),
            job_roles: vec![role_draft("Electrician", 10), role_draft("Plumber", 5)],
            submit: true,
        })
        .expect("requirement submitted")
}

pub(super) fn role_id(tree: &RequirementTree, index: usize) -> JobRoleId {
    tree.requirement.job_roles[index].id.clone()
}

pub(super) fn verified_agency(service: &TestService, name: &str) -> Agency {
    let agency = service
        .register_agency(NewAgency {
            name: name.to_string(),
            contact_email: format!("{}@agencies.test", name.to_lowercase()),
        })
        .expect("agency registered");
    service
        .set_agency_status(&agency.id, AgencyStatus::Verified)
        .expect("agency verified")
}

pub(super) fn forward(
    service: &TestService,
    tree: &RequirementTree,
    rows: &[(&JobRoleId, &AgencyId, u32)],
) -> Arc<RequirementTree> {
    service
        .forward(ForwardRequest {
            requirement_id: tree.requirement.id.clone(),
            forwarded_roles: rows
                .iter()
                .map(|(role, agency, quantity)| ForwardedRole {
                    job_role_id: (*role).clone(),
                    agency_id: (*agency).clone(),
                    quantity: *quantity,
                })
                .collect(),
        })
        .expect("forward accepted")
}

pub(super) fn answer(
    service: &TestService,
    agency: &AgencyId,
    role: &JobRoleId,
    decision: AgencyResponse,
) -> Arc<RequirementTree> {
    service
        .respond_to_forward(
            agency,
            role,
            ForwardAnswer {
                decision,
                reason: Some("capacity".to_string()),
            },
        )
        .expect("forward answered")
}

pub(super) fn assign_new_labour(
    service: &TestService,
    role: &JobRoleId,
    agency: &AgencyId,
    name: &str,
) -> LabourAssignment {
    let profile = service
        .register_labour(
            agency,
            LabourProfileDraft {
                name: name.to_string(),
                nationality: Some("Nepal".to_string()),
                passport_number: None,
                profession: Some("Electrician".to_string()),
            },
        )
        .expect("labour registered");
    service
        .assign_labour(
            role,
            AssignLabour {
                labour_profile_id: profile.id,
                agency_id: agency.clone(),
            },
        )
        .expect("labour assigned")
}

pub(super) fn review(
    service: &TestService,
    assignment: &LabourAssignment,
    side: ReviewSide,
    decision: ReviewStatus,
    feedback: Option<&str>,
) -> LabourAssignment {
    service
        .review_assignment(
            &assignment.id,
            ReviewDecision {
                side,
                decision,
                feedback: feedback.map(str::to_string),
            },
        )
        .expect("review recorded")
}

pub(super) fn complete_offer_letter() -> OfferLetterDetails {
    OfferLetterDetails {
        working_hours: "8 hours".to_string(),
        working_days: "6 days".to_string(),
        leave_salary: "30 days paid".to_string(),
        end_of_service: "As per labour law".to_string(),
        probation_period: "3 months".to_string(),
    }
}

pub(super) fn pdf(name: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.to_string(),
        content_type: Some("application/pdf".to_string()),
        bytes: b"%PDF-1.7 signed".to_vec(),
    }
}

/// Requirement forwarded to one agency which accepted; one labourer approved by both sides.
pub(super) struct ApprovedPlacement {
    pub(super) tree: Arc<RequirementTree>,
    pub(super) agency: Agency,
    pub(super) assignment: LabourAssignment,
}

pub(super) fn approved_placement(service: &TestService) -> ApprovedPlacement {
    let tree = submitted_requirement(service);
    let agency = verified_agency(service, "Summit");
    let electrician = role_id(&tree, 0);
    forward(service, &tree, &[(&electrician, &agency.id, 10)]);
    answer(service, &agency.id, &electrician, AgencyResponse::Accepted);

    let assignment = assign_new_labour(service, &electrician, &agency.id, "Ram Thapa");
    review(service, &assignment, ReviewSide::Admin, ReviewStatus::Accepted, None);
    let assignment = review(service, &assignment, ReviewSide::Client, ReviewStatus::Accepted, None);

    ApprovedPlacement {
        tree,
        agency,
        assignment,
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) async fn assert_error(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    let body = read_json_body(response).await;
    assert!(body["error"].is_string(), "missing error message: {body}");
    body
}
