use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderMap, HeaderValue, Request, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

use crate::config::WorkflowConfig;
use crate::workflows::requirements::memory::{InMemoryDocumentStore, InMemoryPlacementRepository};
use crate::workflows::requirements::router::{placement_router, CRON_SECRET_HEADER};
use crate::workflows::requirements::service::PlacementService;

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("json")))
        .expect("request")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn multipart_request(uri: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "placement-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request")
}

#[tokio::test]
async fn submit_route_creates_requirements() {
    let (service, _, _, _) = build_service();
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/requirements",
            json!({
                "clientId": "client-9",
                "submit": true,
                "jobRoles": [{ "title": "Driver", "quantity": 4 }],
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["requirement"]["status"], json!("SUBMITTED"));
    assert_eq!(payload["requirement"]["jobRoles"][0]["quantity"], json!(4));
    assert_eq!(payload["offerLetterBlocked"], json!(true));
}

#[tokio::test]
async fn list_route_rejects_unknown_statuses() {
    let (service, _, _, _) = build_service();
    submitted_requirement(&service);
    let router = placement_router(Arc::new(service));

    let listed = router
        .clone()
        .oneshot(empty_request("GET", "/api/requirements?status=SUBMITTED,UNDER_REVIEW"))
        .await
        .expect("route executes");
    assert_eq!(listed.status(), StatusCode::OK);
    let payload = read_json_body(listed).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));

    let response = router
        .oneshot(empty_request("GET", "/api/requirements?status=ARCHIVED"))
        .await
        .expect("route executes");
    assert_error(response, StatusCode::UNPROCESSABLE_ENTITY).await;
}

#[tokio::test]
async fn missing_requirement_is_not_found() {
    let (service, _, _, _) = build_service();
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(empty_request("GET", "/api/requirements/req-missing"))
        .await
        .expect("route executes");
    let body = assert_error(response, StatusCode::NOT_FOUND).await;
    assert_eq!(body["error"], json!("requirement req-missing not found"));
}

#[tokio::test]
async fn forward_route_surfaces_validation_messages() {
    let (service, _, _, _) = build_service();
    let tree = submitted_requirement(&service);
    let alpha = verified_agency(&service, "Alpha");
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/requirements/forward",
            json!({
                "requirementId": tree.requirement.id,
                "forwardedRoles": [
                    { "jobRoleId": role_id(&tree, 0), "agencyId": alpha.id, "quantity": 0 },
                ],
            }),
        ))
        .await
        .expect("route executes");

    let body = assert_error(response, StatusCode::UNPROCESSABLE_ENTITY).await;
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .contains("positive quantity"));
}

#[tokio::test]
async fn invalid_status_change_is_unprocessable() {
    let (service, _, _, _) = build_service();
    let tree = submitted_requirement(&service);
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(json_request(
            "PATCH",
            &format!("/api/requirements/{}", tree.requirement.id),
            json!({ "status": "DRAFT" }),
        ))
        .await
        .expect("route executes");
    assert_error(response, StatusCode::UNPROCESSABLE_ENTITY).await;
}

#[tokio::test]
async fn offer_letter_details_round_through_the_api() {
    let (service, _, _, _) = build_service();
    let tree = submitted_requirement(&service);
    let router = placement_router(Arc::new(service));
    let uri = format!("/api/requirements/{}/offer-letter-details", tree.requirement.id);

    let missing = router
        .clone()
        .oneshot(empty_request("GET", &uri))
        .await
        .expect("route executes");
    assert_error(missing, StatusCode::NOT_FOUND).await;

    let saved = router
        .clone()
        .oneshot(json_request(
            "POST",
            &uri,
            serde_json::to_value(complete_offer_letter()).expect("json"),
        ))
        .await
        .expect("route executes");
    assert_eq!(saved.status(), StatusCode::OK);

    let fetched = router
        .clone()
        .oneshot(empty_request("GET", &uri))
        .await
        .expect("route executes");
    assert_eq!(fetched.status(), StatusCode::OK);
    let payload = read_json_body(fetched).await;
    assert_eq!(payload["probationPeriod"], json!("3 months"));

    let tree = router
        .oneshot(empty_request(
            "GET",
            &format!("/api/requirements/{}", tree.requirement.id),
        ))
        .await
        .expect("route executes");
    let payload = read_json_body(tree).await;
    assert_eq!(payload["offerLetterBlocked"], json!(false));
}

#[tokio::test]
async fn agency_answer_and_assignment_listing_routes() {
    let (service, _, _, _) = build_service();
    let tree = submitted_requirement(&service);
    let alpha = verified_agency(&service, "Alpha");
    let electrician = role_id(&tree, 0);
    forward(&service, &tree, &[(&electrician, &alpha.id, 3)]);
    let router = placement_router(Arc::new(service));

    let answered = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/agencies/{}/forwards/{}", alpha.id, electrician),
            json!({ "decision": "ACCEPTED" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(answered.status(), StatusCode::OK);

    let profile = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/agencies/{}/labour", alpha.id),
            json!({ "name": "Kiran", "passportNumber": "P7654321" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(profile.status(), StatusCode::CREATED);
    let profile = read_json_body(profile).await;

    let assigned = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/requirements/{electrician}/assign"),
            json!({ "labourProfileId": profile["id"], "agencyId": alpha.id }),
        ))
        .await
        .expect("route executes");
    assert_eq!(assigned.status(), StatusCode::CREATED);

    let listed = router
        .oneshot(empty_request(
            "GET",
            &format!("/api/requirements/{electrician}/assign"),
        ))
        .await
        .expect("route executes");
    assert_eq!(listed.status(), StatusCode::OK);
    let payload = read_json_body(listed).await;
    assert_eq!(payload["assignments"].as_array().map(Vec::len), Some(1));
    assert_eq!(payload["assignments"][0]["labourName"], json!("Kiran"));
    assert_eq!(payload["reconciliation"]["forwardedQuantity"], json!(3));
    assert_eq!(payload["reconciliation"]["totalNeeded"], json!(3));
}

#[tokio::test]
async fn stage_routes_map_upload_failures() {
    let (service, _, _, _) = build_service();
    let placement = approved_placement(&service);
    service
        .save_offer_letter_details(&placement.tree.requirement.id, complete_offer_letter())
        .expect("terms saved");
    let router = placement_router(Arc::new(service));
    let base = format!("/api/clients/assignments/{}", placement.assignment.id);

    let unknown = router
        .clone()
        .oneshot(empty_request("POST", &format!("{base}/teleport")))
        .await
        .expect("route executes");
    assert_error(unknown, StatusCode::NOT_FOUND).await;

    let too_large = router
        .clone()
        .oneshot(multipart_request(
            &format!("{base}/upload-offer-letter"),
            "offer.pdf",
            "application/pdf",
            &vec![1u8; UPLOAD_LIMIT + 1],
        ))
        .await
        .expect("route executes");
    assert_error(too_large, StatusCode::PAYLOAD_TOO_LARGE).await;

    let unsupported = router
        .clone()
        .oneshot(multipart_request(
            &format!("{base}/upload-offer-letter"),
            "offer.exe",
            "application/x-msdownload",
            b"MZ",
        ))
        .await
        .expect("route executes");
    assert_error(unsupported, StatusCode::UNSUPPORTED_MEDIA_TYPE).await;

    let uploaded = router
        .clone()
        .oneshot(multipart_request(
            &format!("{base}/upload-offer-letter"),
            "offer.pdf",
            "application/pdf",
            b"%PDF-1.7",
        ))
        .await
        .expect("route executes");
    assert_eq!(uploaded.status(), StatusCode::OK);
    let payload = read_json_body(uploaded).await;
    assert_eq!(payload["ok"], json!(true));
    assert_eq!(payload["assignment"]["currentStage"], json!("OFFER_LETTER_SIGN"));

    let out_of_order = router
        .oneshot(json_request(
            "POST",
            &format!("{base}/schedule-travel"),
            json!({ "travelDate": "2026-12-01" }),
        ))
        .await
        .expect("route executes");
    assert_error(out_of_order, StatusCode::UNPROCESSABLE_ENTITY).await;
}

#[tokio::test]
async fn reminders_require_the_cron_secret() {
    let (service, _, _, _) = build_service();
    let service = Arc::new(service);

    let denied = crate::workflows::requirements::router::reminders_handler::<
        InMemoryPlacementRepository,
        RecordingNotifier,
        InMemoryDocumentStore,
    >(State(service.clone()), HeaderMap::new())
    .await;
    assert_error(denied, StatusCode::UNAUTHORIZED).await;

    let mut headers = HeaderMap::new();
    headers.insert(CRON_SECRET_HEADER, HeaderValue::from_static(CRON_SECRET));
    let allowed = crate::workflows::requirements::router::reminders_handler::<
        InMemoryPlacementRepository,
        RecordingNotifier,
        InMemoryDocumentStore,
    >(State(service), headers)
    .await;
    assert_eq!(allowed.status(), StatusCode::OK);
    let payload = read_json_body(allowed).await;
    assert_eq!(payload, json!({ "rolesFlagged": 0, "clientReminders": 0 }));
}

#[tokio::test]
async fn reminders_are_unavailable_without_a_configured_secret() {
    let service = PlacementService::new(
        Arc::new(InMemoryPlacementRepository::default()),
        Arc::new(RecordingNotifier::default()),
        Arc::new(InMemoryDocumentStore::default()),
        WorkflowConfig::default(),
    );
    let router = placement_router(Arc::new(service));

    let response = router
        .oneshot(
            Request::post("/api/cron/reminders")
                .header(CRON_SECRET_HEADER, "anything")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_error(response, StatusCode::SERVICE_UNAVAILABLE).await;
}

#[tokio::test]
async fn agency_directory_filters_by_status() {
    let (service, _, _, _) = build_service();
    verified_agency(&service, "Alpha");
    let router = placement_router(Arc::new(service));

    let registered = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/agencies",
            json!({ "name": "Beta", "contactEmail": "beta@agencies.test" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(registered.status(), StatusCode::CREATED);
    let registered = read_json_body(registered).await;
    assert_eq!(registered["status"], json!("NOT_VERIFIED"));

    let verified = router
        .clone()
        .oneshot(empty_request("GET", "/api/agencies?status=VERIFIED"))
        .await
        .expect("route executes");
    let verified = read_json_body(verified).await;
    assert_eq!(verified.as_array().map(Vec::len), Some(1));
    assert_eq!(verified[0]["name"], json!("Alpha"));

    let rejected = router
        .oneshot(json_request(
            "PATCH",
            &format!("/api/agencies/{}", registered["id"].as_str().expect("id")),
            json!({ "status": "REJECTED" }),
        ))
        .await
        .expect("route executes");
    let rejected = read_json_body(rejected).await;
    assert_eq!(rejected["status"], json!("REJECTED"));
}
