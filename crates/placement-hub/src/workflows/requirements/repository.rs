use super::domain::{
    Agency, AgencyId, AgencyStatus, AssignmentId, ClientId, JobRoleId, LabourAssignment,
    LabourProfile, LabourProfileId, OfferLetterDetails, Requirement, RequirementId,
    RequirementStatus, RoleForward,
};

/// Repository record holding a requirement with its forward table and contract terms.
#[derive(Debug, Clone)]
pub struct RequirementRecord {
    pub requirement: Requirement,
    pub forwards: Vec<RoleForward>,
    pub offer_letter: Option<OfferLetterDetails>,
}

/// Filter applied to requirement listings.
#[derive(Debug, Clone, Default)]
pub struct RequirementFilter {
    pub client_id: Option<ClientId>,
    pub statuses: Vec<RequirementStatus>,
}

impl RequirementFilter {
    pub fn matches(&self, requirement: &Requirement) -> bool {
        let client_matches = self
            .client_id
            .as_ref()
            .map(|client| &requirement.client_id == client)
            .unwrap_or(true);
        let status_matches =
            self.statuses.is_empty() || self.statuses.contains(&requirement.status);
        client_matches && status_matches
    }
}

/// Storage abstraction for the workflow so the service can be exercised in isolation.
pub trait PlacementRepository: Send + Sync {
    fn insert_requirement(&self, record: RequirementRecord) -> Result<(), RepositoryError>;
    fn update_requirement(&self, record: RequirementRecord) -> Result<(), RepositoryError>;
    fn fetch_requirement(
        &self,
        id: &RequirementId,
    ) -> Result<Option<RequirementRecord>, RepositoryError>;
    fn requirement_for_role(
        &self,
        job_role_id: &JobRoleId,
    ) -> Result<Option<RequirementRecord>, RepositoryError>;
    fn list_requirements(
        &self,
        filter: &RequirementFilter,
    ) -> Result<Vec<RequirementRecord>, RepositoryError>;

    fn upsert_agency(&self, agency: Agency) -> Result<(), RepositoryError>;
    fn fetch_agency(&self, id: &AgencyId) -> Result<Option<Agency>, RepositoryError>;
    fn list_agencies(&self, status: Option<AgencyStatus>) -> Result<Vec<Agency>, RepositoryError>;

    fn upsert_profile(&self, profile: LabourProfile) -> Result<(), RepositoryError>;
    fn fetch_profile(&self, id: &LabourProfileId)
        -> Result<Option<LabourProfile>, RepositoryError>;
    fn profiles(&self, ids: &[LabourProfileId]) -> Result<Vec<LabourProfile>, RepositoryError>;

    fn insert_assignment(&self, assignment: LabourAssignment) -> Result<(), RepositoryError>;
    fn update_assignment(&self, assignment: LabourAssignment) -> Result<(), RepositoryError>;
    fn fetch_assignment(
        &self,
        id: &AssignmentId,
    ) -> Result<Option<LabourAssignment>, RepositoryError>;
    fn assignments_for_roles(
        &self,
        job_role_ids: &[JobRoleId],
    ) -> Result<Vec<LabourAssignment>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Collaborator that keeps uploaded documents and hands back a retrievable key.
pub trait DocumentStore: Send + Sync {
    fn store(&self, upload: DocumentUpload) -> Result<String, DocumentError>;
}

#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub assignment_id: AssignmentId,
    pub kind: &'static str,
    pub file_name: String,
    pub content_type: mime::Mime,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("no file was uploaded")]
    MissingFile,
    #[error("file exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },
    #[error("unsupported document type {0}; upload a PDF or an image")]
    UnsupportedType(String),
    #[error("document storage unavailable: {0}")]
    Storage(String),
}
