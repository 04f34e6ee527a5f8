use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use super::documents::UploadedFile;
use super::domain::{
    AgencyId, AgencyStatus, AssignmentId, ClientId, JobRoleId, LabourProfileDraft,
    OfferLetterDetails, RequirementId, RequirementStatus,
};
use super::forwarding::{ForwardRequest, ForwardingMode};
use super::repository::{
    DocumentError, DocumentStore, PlacementRepository, RepositoryError, RequirementFilter,
};
use super::service::{
    AssignLabour, ForwardAnswer, NewAgency, NewRequirement, PlacementService,
    PlacementServiceError, ReviewDecision, StageCommand,
};
use super::stage::StageAction;
use crate::workflows::labour_import::LabourCsvImporter;
use crate::workflows::notifications::NotificationPublisher;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

/// Headroom above the document limit so oversized files reach our own size check.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Router exposing intake, forwarding, assignment, and onboarding endpoints.
pub fn placement_router<S, N, D>(service: Arc<PlacementService<S, N, D>>) -> Router
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    let body_limit = service
        .config()
        .upload_max_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route(
            "/api/requirements",
            post(submit_handler::<S, N, D>).get(list_handler::<S, N, D>),
        )
        .route("/api/requirements/forward", post(forward_handler::<S, N, D>))
        .route(
            "/api/requirements/:id",
            get(requirement_handler::<S, N, D>).patch(status_handler::<S, N, D>),
        )
        .route(
            "/api/requirements/:id/forward-options",
            get(forward_options_handler::<S, N, D>),
        )
        .route(
            "/api/requirements/:id/offer-letter-details",
            get(offer_letter_handler::<S, N, D>).post(save_offer_letter_handler::<S, N, D>),
        )
        .route(
            "/api/requirements/:id/assign",
            post(assign_handler::<S, N, D>).get(role_assignments_handler::<S, N, D>),
        )
        .route(
            "/api/agencies",
            post(register_agency_handler::<S, N, D>).get(list_agencies_handler::<S, N, D>),
        )
        .route(
            "/api/agencies/:id",
            axum::routing::patch(agency_status_handler::<S, N, D>),
        )
        .route(
            "/api/agencies/:id/labour",
            post(register_labour_handler::<S, N, D>),
        )
        .route(
            "/api/agencies/:id/labour/import",
            post(import_labour_handler::<S, N, D>),
        )
        .route(
            "/api/agencies/:id/forwards/:job_role_id",
            post(forward_answer_handler::<S, N, D>),
        )
        .route(
            "/api/assignments/:id/review",
            post(review_handler::<S, N, D>),
        )
        .route(
            "/api/clients/assignments/:id/:action",
            post(stage_handler::<S, N, D>),
        )
        .route("/api/cron/reminders", post(reminders_handler::<S, N, D>))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({
        "error": message.into(),
    });
    (status, axum::Json(payload)).into_response()
}

fn error_response(error: PlacementServiceError) -> Response {
    let status = match &error {
        PlacementServiceError::NotFound(_)
        | PlacementServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        PlacementServiceError::Conflict(_)
        | PlacementServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        PlacementServiceError::Forwarding(_)
        | PlacementServiceError::Stage(_)
        | PlacementServiceError::Status(_)
        | PlacementServiceError::Invalid(_)
        | PlacementServiceError::OfferLetterBlocked
        | PlacementServiceError::AwaitingApproval(_)
        | PlacementServiceError::Document(DocumentError::MissingFile) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PlacementServiceError::Document(DocumentError::TooLarge { .. }) => {
            StatusCode::PAYLOAD_TOO_LARGE
        }
        PlacementServiceError::Document(DocumentError::UnsupportedType(_)) => {
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        }
        PlacementServiceError::Document(DocumentError::Storage(_))
        | PlacementServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_body(status, error.to_string())
}

fn respond<T: serde::Serialize>(
    status: StatusCode,
    result: Result<T, PlacementServiceError>,
) -> Response {
    match result {
        Ok(value) => (status, axum::Json(value)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListQuery {
    client_id: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AgencyQuery {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusUpdate {
    status: RequirementStatus,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AgencyStatusUpdate {
    status: AgencyStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TravelSchedule {
    travel_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct ArrivalConfirmation {
    status: String,
    #[serde(default)]
    notes: Option<String>,
}

fn parse_statuses(raw: &str) -> Result<Vec<RequirementStatus>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| RequirementStatus::parse(value).ok_or_else(|| format!("unknown status {value}")))
        .collect()
}

pub(crate) async fn submit_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    axum::Json(submission): axum::Json<NewRequirement>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    respond(StatusCode::CREATED, service.submit_requirement(submission))
}

pub(crate) async fn list_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Query(query): Query<ListQuery>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    let statuses = match query.status.as_deref().map(parse_statuses).transpose() {
        Ok(statuses) => statuses.unwrap_or_default(),
        Err(message) => return error_body(StatusCode::UNPROCESSABLE_ENTITY, message),
    };
    let filter = RequirementFilter {
        client_id: query
            .client_id
            .filter(|id| !id.trim().is_empty())
            .map(|id| ClientId(id.trim().to_string())),
        statuses,
    };
    respond(StatusCode::OK, service.list_requirements(filter))
}

pub(crate) async fn requirement_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path(id): Path<String>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    respond(StatusCode::OK, service.requirement(&RequirementId(id)))
}

pub(crate) async fn status_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path(id): Path<String>,
    axum::Json(update): axum::Json<StatusUpdate>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    respond(
        StatusCode::OK,
        service.update_status(&RequirementId(id), update.status, update.reason.as_deref()),
    )
}

pub(crate) async fn forward_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    axum::Json(request): axum::Json<ForwardRequest>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    respond(StatusCode::OK, service.forward(request))
}

/// Agencies that can still receive each role of a requirement.
pub(crate) async fn forward_options_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path(id): Path<String>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    let id = RequirementId(id);
    let draft = match service.draft(&id, ForwardingMode::Split) {
        Ok(draft) => draft,
        Err(error) => return error_response(error),
    };
    let roles: Vec<serde_json::Value> = draft
        .by_role()
        .into_iter()
        .map(|role| {
            let available = draft.available_agencies(&role.job_role_id, None);
            json!({
                "jobRoleId": role.job_role_id,
                "title": role.title,
                "requestedQuantity": role.requested_quantity,
                "availableAgencies": available,
            })
        })
        .collect();
    let payload = json!({
        "requirementId": id,
        "roles": roles,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn offer_letter_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path(id): Path<String>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    match service.offer_letter_details(&RequirementId(id)) {
        Ok(Some(details)) => (StatusCode::OK, axum::Json(details)).into_response(),
        Ok(None) => error_body(StatusCode::NOT_FOUND, "offer letter details not found"),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn save_offer_letter_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path(id): Path<String>,
    axum::Json(details): axum::Json<OfferLetterDetails>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    respond(
        StatusCode::OK,
        service.save_offer_letter_details(&RequirementId(id), details),
    )
}

pub(crate) async fn assign_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path(job_role_id): Path<String>,
    axum::Json(request): axum::Json<AssignLabour>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    respond(
        StatusCode::CREATED,
        service.assign_labour(&JobRoleId(job_role_id), request),
    )
}

pub(crate) async fn role_assignments_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path(job_role_id): Path<String>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    respond(StatusCode::OK, service.role_assignments(&JobRoleId(job_role_id)))
}

pub(crate) async fn register_agency_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    axum::Json(agency): axum::Json<NewAgency>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    respond(StatusCode::CREATED, service.register_agency(agency))
}

pub(crate) async fn list_agencies_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Query(query): Query<AgencyQuery>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    let status = match query.status.as_deref().filter(|raw| !raw.trim().is_empty()) {
        Some(raw) => match AgencyStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                return error_body(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("unknown agency status {raw}"),
                )
            }
        },
        None => None,
    };
    respond(StatusCode::OK, service.list_agencies(status))
}

pub(crate) async fn agency_status_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path(id): Path<String>,
    axum::Json(update): axum::Json<AgencyStatusUpdate>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    respond(
        StatusCode::OK,
        service.set_agency_status(&AgencyId(id), update.status),
    )
}

pub(crate) async fn register_labour_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path(id): Path<String>,
    axum::Json(draft): axum::Json<LabourProfileDraft>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    respond(
        StatusCode::CREATED,
        service.register_labour(&AgencyId(id), draft),
    )
}

/// Accepts a raw CSV body in the agency export format.
pub(crate) async fn import_labour_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path(id): Path<String>,
    body: String,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    let import = match LabourCsvImporter::from_reader(body.as_bytes()) {
        Ok(import) => import,
        Err(error) => return error_body(StatusCode::UNPROCESSABLE_ENTITY, error.to_string()),
    };
    let skipped = import.skipped.clone();
    match service.import_labour(&AgencyId(id), import) {
        Ok(profiles) => {
            let payload = json!({
                "profiles": profiles,
                "skipped": skipped,
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn forward_answer_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path((agency_id, job_role_id)): Path<(String, String)>,
    axum::Json(answer): axum::Json<ForwardAnswer>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    respond(
        StatusCode::OK,
        service.respond_to_forward(&AgencyId(agency_id), &JobRoleId(job_role_id), answer),
    )
}

pub(crate) async fn review_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path(id): Path<String>,
    axum::Json(review): axum::Json<ReviewDecision>,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    respond(
        StatusCode::OK,
        service.review_assignment(&AssignmentId(id), review),
    )
}

async fn read_file(request: Request) -> Result<UploadedFile, Response> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(IntoResponse::into_response)?;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|err| error_body(err.status(), err.body_text()))?;
        let Some(field) = field else {
            return Err(error_body(
                StatusCode::UNPROCESSABLE_ENTITY,
                DocumentError::MissingFile.to_string(),
            ));
        };
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| error_body(err.status(), err.body_text()))?;
        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
}

async fn read_json<T>(request: Request) -> Result<T, Response>
where
    T: serde::de::DeserializeOwned,
{
    axum::Json::<T>::from_request(request, &())
        .await
        .map(|axum::Json(value)| value)
        .map_err(IntoResponse::into_response)
}

async fn stage_command(action: StageAction, request: Request) -> Result<StageCommand, Response> {
    Ok(match action {
        StageAction::UploadOfferLetter => StageCommand::UploadOfferLetter(read_file(request).await?),
        StageAction::VerifyOfferLetter => StageCommand::VerifyOfferLetter,
        StageAction::MarkVisaApplied => StageCommand::MarkVisaApplied,
        StageAction::MarkQvcPaid => StageCommand::MarkQvcPaid,
        StageAction::SignContract => StageCommand::SignContract,
        StageAction::MarkMedicalCleared => StageCommand::MarkMedicalCleared,
        StageAction::MarkFingerprintDone => StageCommand::MarkFingerprintDone,
        StageAction::UploadVisa => StageCommand::UploadVisa(read_file(request).await?),
        StageAction::ScheduleTravel => {
            let schedule: TravelSchedule = read_json(request).await?;
            StageCommand::ScheduleTravel {
                travel_date: schedule.travel_date,
            }
        }
        StageAction::ConfirmTravel => StageCommand::ConfirmTravel,
        StageAction::ConfirmArrival => {
            let arrival: ArrivalConfirmation = read_json(request).await?;
            StageCommand::ConfirmArrival {
                status: arrival.status,
                notes: arrival.notes,
            }
        }
    })
}

/// Single entry point for the onboarding actions; the last path segment names the action.
pub(crate) async fn stage_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    Path((id, action)): Path<(String, String)>,
    request: Request,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    let Some(action) = StageAction::from_endpoint(&action) else {
        return error_body(StatusCode::NOT_FOUND, format!("unknown action {action}"));
    };
    let command = match stage_command(action, request).await {
        Ok(command) => command,
        Err(response) => return response,
    };

    match service.advance_stage(&AssignmentId(id), command) {
        Ok(assignment) => {
            let payload = json!({
                "ok": true,
                "assignment": assignment,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reminders_handler<S, N, D>(
    State(service): State<Arc<PlacementService<S, N, D>>>,
    headers: HeaderMap,
) -> Response
where
    S: PlacementRepository + 'static,
    N: NotificationPublisher + 'static,
    D: DocumentStore + 'static,
{
    let Some(expected) = service.config().cron_secret.as_deref() else {
        return error_body(StatusCode::SERVICE_UNAVAILABLE, "cron secret is not configured");
    };
    let provided = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    if provided != Some(expected) {
        return error_body(StatusCode::UNAUTHORIZED, "invalid cron secret");
    }

    respond(StatusCode::OK, service.send_reminders())
}
