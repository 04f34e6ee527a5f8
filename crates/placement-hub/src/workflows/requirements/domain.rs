use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::stage::Stage;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier wrapper for client staffing requests.
    RequirementId
);
string_id!(
    /// Identifier of a single position inside a requirement.
    JobRoleId
);
string_id!(AgencyId);
string_id!(ClientId);
string_id!(LabourProfileId);
string_id!(
    /// Link between a labour profile and a job role.
    AssignmentId
);

/// Lifecycle of a client's staffing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementStatus {
    Draft,
    Submitted,
    UnderReview,
    Forwarded,
    Accepted,
    Rejected,
    ClientReview,
    Completed,
}

impl RequirementStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Forwarded => "FORWARDED",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::ClientReview => "CLIENT_REVIEW",
            Self::Completed => "COMPLETED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Some(Self::Draft),
            "SUBMITTED" => Some(Self::Submitted),
            "UNDER_REVIEW" => Some(Self::UnderReview),
            "FORWARDED" => Some(Self::Forwarded),
            "ACCEPTED" => Some(Self::Accepted),
            "REJECTED" => Some(Self::Rejected),
            "CLIENT_REVIEW" => Some(Self::ClientReview),
            "COMPLETED" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Statuses shown in the admin review queue when no filter is supplied.
    pub const fn admin_queue() -> [Self; 2] {
        [Self::Submitted, Self::UnderReview]
    }
}

/// Accept/reject decision recorded independently by each reviewing side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

/// The two parties that approve a labour assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewSide {
    Admin,
    Client,
}

impl ReviewSide {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Client => "client",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgencyStatus {
    NotVerified,
    Verified,
    Rejected,
}

impl AgencyStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NOT_VERIFIED" => Some(Self::NotVerified),
            "VERIFIED" => Some(Self::Verified),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Agency eligible to receive forwarded work once verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agency {
    pub id: AgencyId,
    pub name: String,
    pub contact_email: String,
    pub status: AgencyStatus,
}

/// Monetary allowances attached to a job role, in the client's currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allowances {
    #[serde(default)]
    pub food: u32,
    #[serde(default)]
    pub housing: u32,
    #[serde(default)]
    pub transportation: u32,
}

/// Client-supplied description of a position before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRoleDraft {
    pub title: String,
    pub quantity: u32,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub salary: u32,
    #[serde(default)]
    pub allowances: Allowances,
    #[serde(default)]
    pub min_experience_years: Option<u8>,
    #[serde(default)]
    pub max_experience_years: Option<u8>,
    #[serde(default)]
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRole {
    pub id: JobRoleId,
    pub requirement_id: RequirementId,
    pub title: String,
    pub quantity: u32,
    pub nationality: Option<String>,
    pub salary: u32,
    pub allowances: Allowances,
    pub min_experience_years: Option<u8>,
    pub max_experience_years: Option<u8>,
    pub languages: Vec<String>,
    /// Set only while exactly one agency holds a live forward for this role.
    pub assigned_agency_id: Option<AgencyId>,
    pub agency_status: Option<AgencyResponse>,
    /// Sum of quantities across forwards the agencies have not rejected.
    pub forwarded_quantity: u32,
    pub needs_more_labour: bool,
}

impl JobRole {
    pub fn from_draft(id: JobRoleId, requirement_id: RequirementId, draft: JobRoleDraft) -> Self {
        Self {
            id,
            requirement_id,
            title: draft.title,
            quantity: draft.quantity,
            nationality: draft.nationality,
            salary: draft.salary,
            allowances: draft.allowances,
            min_experience_years: draft.min_experience_years,
            max_experience_years: draft.max_experience_years,
            languages: draft.languages,
            assigned_agency_id: None,
            agency_status: None,
            forwarded_quantity: 0,
            needs_more_labour: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub id: RequirementId,
    pub client_id: ClientId,
    pub status: RequirementStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub job_roles: Vec<JobRole>,
}

impl Requirement {
    pub fn job_role(&self, id: &JobRoleId) -> Option<&JobRole> {
        self.job_roles.iter().find(|role| &role.id == id)
    }

    pub fn job_role_mut(&mut self, id: &JobRoleId) -> Option<&mut JobRole> {
        self.job_roles.iter_mut().find(|role| &role.id == id)
    }
}

/// How an agency answered a forwarded quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgencyResponse {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

/// Persisted headcount commitment of one job role to one agency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleForward {
    pub job_role_id: JobRoleId,
    pub agency_id: AgencyId,
    pub quantity: u32,
    pub response: AgencyResponse,
    pub rejection_reason: Option<String>,
    pub forwarded_at: DateTime<Utc>,
}

impl RoleForward {
    pub fn is_live(&self) -> bool {
        self.response != AgencyResponse::Rejected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabourStatus {
    Received,
    UnderReview,
    Approved,
    Rejected,
    Shortlisted,
    Deployed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    #[default]
    Pending,
    PartiallyVerified,
    Verified,
    Rejected,
}

/// Biodata registered by an agency for a candidate labourer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabourProfileDraft {
    pub name: String,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub passport_number: Option<String>,
    #[serde(default)]
    pub profession: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabourProfile {
    pub id: LabourProfileId,
    pub agency_id: AgencyId,
    pub name: String,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub profession: Option<String>,
    pub status: LabourStatus,
    pub verification_status: VerificationStatus,
}

/// Document references collected as an assignment moves through onboarding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentDocuments {
    pub offer_letter: Option<String>,
    pub visa: Option<String>,
    pub flight_ticket: Option<String>,
    pub medical_certificate: Option<String>,
    pub police_clearance: Option<String>,
    pub employment_contract: Option<String>,
    #[serde(default)]
    pub additional: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabourAssignment {
    pub id: AssignmentId,
    pub labour_profile_id: LabourProfileId,
    pub job_role_id: JobRoleId,
    pub agency_id: AgencyId,
    pub admin_status: ReviewStatus,
    pub client_status: ReviewStatus,
    pub admin_feedback: Option<String>,
    pub client_feedback: Option<String>,
    pub current_stage: Stage,
    pub documents: AssignmentDocuments,
    pub travel_date: Option<NaiveDate>,
    pub arrival_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LabourAssignment {
    pub fn is_rejected(&self) -> bool {
        self.admin_status == ReviewStatus::Rejected || self.client_status == ReviewStatus::Rejected
    }

    pub fn is_accepted(&self) -> bool {
        self.admin_status == ReviewStatus::Accepted && self.client_status == ReviewStatus::Accepted
    }

    pub fn status_for(&self, side: ReviewSide) -> ReviewStatus {
        match side {
            ReviewSide::Admin => self.admin_status,
            ReviewSide::Client => self.client_status,
        }
    }
}

/// Contract terms the client must fill before an offer letter can be generated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferLetterDetails {
    #[serde(default)]
    pub working_hours: String,
    #[serde(default)]
    pub working_days: String,
    #[serde(default)]
    pub leave_salary: String,
    #[serde(default)]
    pub end_of_service: String,
    #[serde(default)]
    pub probation_period: String,
}

impl OfferLetterDetails {
    pub fn is_complete(&self) -> bool {
        [
            &self.working_hours,
            &self.working_days,
            &self.leave_salary,
            &self.end_of_service,
            &self.probation_period,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

/// Reason shown next to disabled offer-letter actions.
pub const OFFER_LETTER_BLOCKED_REASON: &str = "Offer letter details not filled by client";

/// True while offer-letter generation, download, and verification must stay disabled.
pub fn offer_letter_blocked(details: Option<&OfferLetterDetails>) -> bool {
    !details.map(OfferLetterDetails::is_complete).unwrap_or(false)
}
