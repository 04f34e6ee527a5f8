//! Requirement intake, agency forwarding, labour assignment, and onboarding.
//!
//! Mutations go through [`PlacementService`]; reads are served from the derived
//! [`RequirementTree`] kept in a read-through cache and rebuilt after every write.

pub mod cache;
pub mod documents;
pub mod domain;
pub mod forwarding;
pub mod memory;
pub mod reconciliation;
pub mod repository;
pub mod router;
pub mod service;
pub mod stage;
pub mod status;
pub mod views;

#[cfg(test)]
mod tests;

pub use documents::UploadedFile;
pub use domain::{
    Agency, AgencyId, AgencyResponse, AgencyStatus, Allowances, AssignmentDocuments,
    AssignmentId, ClientId, JobRole, JobRoleDraft, JobRoleId, LabourAssignment, LabourProfile,
    LabourProfileDraft, LabourProfileId, LabourStatus, OfferLetterDetails, Requirement,
    RequirementId, RequirementStatus, ReviewSide, ReviewStatus, RoleForward, VerificationStatus,
};
pub use forwarding::{
    ForwardRequest, ForwardedRole, ForwardingDraft, ForwardingMode, ForwardingViolation,
    RejectedAgencies,
};
pub use memory::{InMemoryDocumentStore, InMemoryPlacementRepository};
pub use reconciliation::{reconcile, RejectedBy, RejectedLabour, RoleReconciliation};
pub use repository::{
    DocumentError, DocumentStore, DocumentUpload, PlacementRepository, RepositoryError,
    RequirementFilter, RequirementRecord,
};
pub use router::{placement_router, CRON_SECRET_HEADER};
pub use service::{
    AssignLabour, ForwardAnswer, NewAgency, NewRequirement, PlacementService,
    PlacementServiceError, ReminderSummary, ReviewDecision, RoleAssignments, StageCommand,
};
pub use stage::{Stage, StageAction, StageTransitionError};
pub use status::{check_transition, StatusTransitionError};
pub use views::{ActionView, AssignmentView, RequirementTree, RoleView};
