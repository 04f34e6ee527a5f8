//! Process-local adapters used by the demo binary, the HTTP service, and tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    Agency, AgencyId, AgencyStatus, AssignmentId, JobRoleId, LabourAssignment, LabourProfile,
    LabourProfileId, RequirementId,
};
use super::repository::{
    DocumentError, DocumentStore, DocumentUpload, PlacementRepository, RepositoryError,
    RequirementFilter, RequirementRecord,
};

#[derive(Debug, Default)]
struct MemoryState {
    requirements: BTreeMap<RequirementId, RequirementRecord>,
    agencies: BTreeMap<AgencyId, Agency>,
    profiles: BTreeMap<LabourProfileId, LabourProfile>,
    assignments: BTreeMap<AssignmentId, LabourAssignment>,
}

/// Mutex-guarded repository; last write wins.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPlacementRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryPlacementRepository {
    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl PlacementRepository for InMemoryPlacementRepository {
    fn insert_requirement(&self, record: RequirementRecord) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.requirements.contains_key(&record.requirement.id) {
            return Err(RepositoryError::Conflict);
        }
        state
            .requirements
            .insert(record.requirement.id.clone(), record);
        Ok(())
    }

    fn update_requirement(&self, record: RequirementRecord) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.requirements.get_mut(&record.requirement.id) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_requirement(
        &self,
        id: &RequirementId,
    ) -> Result<Option<RequirementRecord>, RepositoryError> {
        Ok(self.state()?.requirements.get(id).cloned())
    }

    fn requirement_for_role(
        &self,
        job_role_id: &JobRoleId,
    ) -> Result<Option<RequirementRecord>, RepositoryError> {
        Ok(self
            .state()?
            .requirements
            .values()
            .find(|record| record.requirement.job_role(job_role_id).is_some())
            .cloned())
    }

    fn list_requirements(
        &self,
        filter: &RequirementFilter,
    ) -> Result<Vec<RequirementRecord>, RepositoryError> {
        Ok(self
            .state()?
            .requirements
            .values()
            .filter(|record| filter.matches(&record.requirement))
            .cloned()
            .collect())
    }

    fn upsert_agency(&self, agency: Agency) -> Result<(), RepositoryError> {
        self.state()?.agencies.insert(agency.id.clone(), agency);
        Ok(())
    }

    fn fetch_agency(&self, id: &AgencyId) -> Result<Option<Agency>, RepositoryError> {
        Ok(self.state()?.agencies.get(id).cloned())
    }

    fn list_agencies(&self, status: Option<AgencyStatus>) -> Result<Vec<Agency>, RepositoryError> {
        Ok(self
            .state()?
            .agencies
            .values()
            .filter(|agency| status.map(|status| agency.status == status).unwrap_or(true))
            .cloned()
            .collect())
    }

    fn upsert_profile(&self, profile: LabourProfile) -> Result<(), RepositoryError> {
        self.state()?.profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    fn fetch_profile(
        &self,
        id: &LabourProfileId,
    ) -> Result<Option<LabourProfile>, RepositoryError> {
        Ok(self.state()?.profiles.get(id).cloned())
    }

    fn profiles(&self, ids: &[LabourProfileId]) -> Result<Vec<LabourProfile>, RepositoryError> {
        let state = self.state()?;
        Ok(ids
            .iter()
            .filter_map(|id| state.profiles.get(id).cloned())
            .collect())
    }

    fn insert_assignment(&self, assignment: LabourAssignment) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.assignments.contains_key(&assignment.id) {
            return Err(RepositoryError::Conflict);
        }
        state.assignments.insert(assignment.id.clone(), assignment);
        Ok(())
    }

    fn update_assignment(&self, assignment: LabourAssignment) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        match state.assignments.get_mut(&assignment.id) {
            Some(existing) => {
                *existing = assignment;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_assignment(
        &self,
        id: &AssignmentId,
    ) -> Result<Option<LabourAssignment>, RepositoryError> {
        Ok(self.state()?.assignments.get(id).cloned())
    }

    fn assignments_for_roles(
        &self,
        job_role_ids: &[JobRoleId],
    ) -> Result<Vec<LabourAssignment>, RepositoryError> {
        Ok(self
            .state()?
            .assignments
            .values()
            .filter(|assignment| job_role_ids.contains(&assignment.job_role_id))
            .cloned()
            .collect())
    }
}

/// Keeps uploaded documents in memory under `memory://{assignment}/{kind}/{file}` keys.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    uploads: Arc<Mutex<Vec<(String, DocumentUpload)>>>,
}

impl InMemoryDocumentStore {
    pub fn keys(&self) -> Vec<String> {
        self.uploads
            .lock()
            .map(|uploads| uploads.iter().map(|(key, _)| key.clone()).collect())
            .unwrap_or_default()
    }

    pub fn fetch(&self, key: &str) -> Option<DocumentUpload> {
        self.uploads.lock().ok().and_then(|uploads| {
            uploads
                .iter()
                .find(|(stored, _)| stored == key)
                .map(|(_, upload)| upload.clone())
        })
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn store(&self, upload: DocumentUpload) -> Result<String, DocumentError> {
        let key = format!(
            "memory://{}/{}/{}",
            upload.assignment_id, upload.kind, upload.file_name
        );
        self.uploads
            .lock()
            .map_err(|_| DocumentError::Storage("document store mutex poisoned".to_string()))?
            .push((key.clone(), upload));
        Ok(key)
    }
}
