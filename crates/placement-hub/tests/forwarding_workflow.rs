//! Forwarding and reconciliation driven through the public service facade, with the real
//! notification bus attached so agency and admin fan-out is observed end to end.

use std::sync::Arc;

use placement_hub::config::{NotificationConfig, WorkflowConfig};
use placement_hub::workflows::notifications::{
    NotificationBus, NotificationKind, Priority, Recipient,
};
use placement_hub::workflows::requirements::{
    AgencyResponse, AgencyStatus, AssignLabour, ForwardAnswer, ForwardRequest, ForwardedRole,
    ForwardingDraft, ForwardingViolation, InMemoryDocumentStore, InMemoryPlacementRepository,
    JobRoleDraft, LabourProfileDraft, NewAgency, NewRequirement, PlacementService,
    PlacementServiceError, RejectedBy, RequirementStatus, ReviewDecision, ReviewSide,
    ReviewStatus,
};

type Service = PlacementService<InMemoryPlacementRepository, NotificationBus, InMemoryDocumentStore>;

fn build() -> (Service, Arc<NotificationBus>) {
    let bus = Arc::new(NotificationBus::new(&NotificationConfig::default(), None));
    let service = PlacementService::new(
        Arc::new(InMemoryPlacementRepository::default()),
        bus.clone(),
        Arc::new(InMemoryDocumentStore::default()),
        WorkflowConfig::default(),
    );
    (service, bus)
}

fn role(title: &str, quantity: u32) -> JobRoleDraft {
    JobRoleDraft {
        title: title.to_string(),
        quantity,
        nationality: None,
        salary: 1500,
        allowances: Default::default(),
        min_experience_years: None,
        max_experience_years: None,
        languages: Vec::new(),
    }
}

fn agency(service: &Service, name: &str) -> placement_hub::workflows::requirements::Agency {
    let agency = service
        .register_agency(NewAgency {
            name: name.to_string(),
            contact_email: format!("ops@{}.test", name.to_lowercase()),
        })
        .expect("registered");
    service
        .set_agency_status(&agency.id, AgencyStatus::Verified)
        .expect("verified")
}

#[tokio::test]
async fn split_forward_rejection_and_reforward() {
    let (service, bus) = build();
    let tree = service
        .submit_requirement(NewRequirement {
            client_id: "client-42".into(),
            job_roles: vec![role("Electrician", 10), role("Plumber", 5)],
            submit: true,
        })
        .expect("submitted");
    let alpha = agency(&service, "Alpha");
    let beta = agency(&service, "Beta");
    let gamma = agency(&service, "Gamma");
    let electrician = tree.requirement.job_roles[0].id.clone();
    let plumber = tree.requirement.job_roles[1].id.clone();

    let mut beta_inbox = bus
        .subscribe(&Recipient::Agency(beta.id.clone()))
        .expect("subscribed");
    let mut admin_inbox = bus.subscribe(&Recipient::Admin).expect("subscribed");

    // The operator builds the split in the draft editor before submitting it.
    let agencies = service
        .list_agencies(Some(AgencyStatus::Verified))
        .expect("agencies");
    let mut draft = ForwardingDraft::split(&tree.requirement, &agencies, Default::default());
    draft
        .add_assignment(&electrician, alpha.id.clone())
        .expect("alpha added");
    draft
        .set_quantity(&electrician, &alpha.id, 6)
        .expect("alpha quantity");
    draft
        .add_assignment(&electrician, beta.id.clone())
        .expect("beta added");
    draft
        .set_quantity(&electrician, &beta.id, 4)
        .expect("beta quantity");
    assert_eq!(
        draft.validate(),
        Err(ForwardingViolation::UnassignedRoles {
            titles: vec!["Plumber".to_string()]
        })
    );
    draft
        .add_assignment(&plumber, beta.id.clone())
        .expect("plumber added");
    assert_eq!(draft.total_assigned(&plumber), 5);

    let request = draft.into_request().expect("valid draft");
    let forwarded = service.forward(request).expect("forwarded");
    assert_eq!(forwarded.requirement.status, RequirementStatus::Forwarded);
    assert_eq!(
        forwarded
            .requirement
            .job_role(&electrician)
            .expect("role")
            .forwarded_quantity,
        10
    );

    let forwarded_event = beta_inbox.recv().await.expect("beta notified");
    assert_eq!(forwarded_event.kind, NotificationKind::RequirementForwarded);
    assert_eq!(forwarded_event.priority, Priority::High);

    service
        .respond_to_forward(
            &alpha.id,
            &electrician,
            ForwardAnswer {
                decision: AgencyResponse::Accepted,
                reason: None,
            },
        )
        .expect("alpha accepts");
    let after_reject = service
        .respond_to_forward(
            &beta.id,
            &electrician,
            ForwardAnswer {
                decision: AgencyResponse::Rejected,
                reason: Some("No electricians available".to_string()),
            },
        )
        .expect("beta rejects");
    let electrician_role = after_reject.requirement.job_role(&electrician).expect("role");
    assert_eq!(electrician_role.forwarded_quantity, 6);
    assert!(electrician_role.needs_more_labour);
    assert!(after_reject.role(&electrician).expect("view").reconciliation.priority);

    let accepted = admin_inbox.recv().await.expect("admin notified");
    assert_eq!(accepted.kind, NotificationKind::ForwardAnswered);
    assert_eq!(accepted.priority, Priority::Normal);
    let rejected = admin_inbox.recv().await.expect("admin notified");
    assert_eq!(rejected.priority, Priority::High);

    let again = service
        .forward(ForwardRequest {
            requirement_id: tree.requirement.id.clone(),
            forwarded_roles: vec![ForwardedRole {
                job_role_id: electrician.clone(),
                agency_id: beta.id.clone(),
                quantity: 4,
            }],
        })
        .expect_err("beta may not receive the role again");
    assert!(matches!(
        again,
        PlacementServiceError::Forwarding(ForwardingViolation::AgencyUnavailable { .. })
    ));

    let refilled = service
        .forward(ForwardRequest {
            requirement_id: tree.requirement.id.clone(),
            forwarded_roles: vec![ForwardedRole {
                job_role_id: electrician.clone(),
                agency_id: gamma.id.clone(),
                quantity: 4,
            }],
        })
        .expect("gamma receives the shortfall");
    let electrician_role = refilled.requirement.job_role(&electrician).expect("role");
    assert_eq!(electrician_role.forwarded_quantity, 10);
    assert!(!electrician_role.needs_more_labour);
}

#[tokio::test]
async fn client_rejection_reconciles_the_shortfall() {
    let (service, bus) = build();
    let tree = service
        .submit_requirement(NewRequirement {
            client_id: "client-7".into(),
            job_roles: vec![role("Cleaner", 2)],
            submit: true,
        })
        .expect("submitted");
    let cleaner = tree.requirement.job_roles[0].id.clone();
    let alpha = agency(&service, "Alpha");
    service
        .forward(ForwardRequest {
            requirement_id: tree.requirement.id.clone(),
            forwarded_roles: vec![ForwardedRole {
                job_role_id: cleaner.clone(),
                agency_id: alpha.id.clone(),
                quantity: 2,
            }],
        })
        .expect("forwarded");
    service
        .respond_to_forward(
            &alpha.id,
            &cleaner,
            ForwardAnswer {
                decision: AgencyResponse::Accepted,
                reason: None,
            },
        )
        .expect("accepted");

    let mut agency_inbox = bus
        .subscribe(&Recipient::Agency(alpha.id.clone()))
        .expect("subscribed");

    let mut assignments = Vec::new();
    for name in ["Asha", "Meena"] {
        let profile = service
            .register_labour(
                &alpha.id,
                LabourProfileDraft {
                    name: name.to_string(),
                    nationality: Some("Sri Lanka".to_string()),
                    passport_number: None,
                    profession: Some("Cleaner".to_string()),
                },
            )
            .expect("registered");
        assignments.push(
            service
                .assign_labour(
                    &cleaner,
                    AssignLabour {
                        labour_profile_id: profile.id,
                        agency_id: alpha.id.clone(),
                    },
                )
                .expect("assigned"),
        );
    }

    for assignment in &assignments {
        service
            .review_assignment(
                &assignment.id,
                ReviewDecision {
                    side: ReviewSide::Admin,
                    decision: ReviewStatus::Accepted,
                    feedback: None,
                },
            )
            .expect("admin accepts");
    }
    service
        .review_assignment(
            &assignments[0].id,
            ReviewDecision {
                side: ReviewSide::Client,
                decision: ReviewStatus::Accepted,
                feedback: None,
            },
        )
        .expect("client accepts");
    service
        .review_assignment(
            &assignments[1].id,
            ReviewDecision {
                side: ReviewSide::Client,
                decision: ReviewStatus::Rejected,
                feedback: Some("Insufficient experience".to_string()),
            },
        )
        .expect("client rejects");

    let view = service.role_assignments(&cleaner).expect("role view");
    let reconciliation = view.reconciliation;
    assert_eq!(reconciliation.accepted_count, 1);
    assert_eq!(reconciliation.admin_rejected_count, 0);
    assert_eq!(reconciliation.total_needed, 1);
    assert!(reconciliation.priority, "client rejection flags the role");
    assert_eq!(reconciliation.rejected.len(), 1);
    assert_eq!(reconciliation.rejected[0].labour_name, "Meena");
    assert_eq!(reconciliation.rejected[0].rejected_by, RejectedBy::Client);
    assert_eq!(
        reconciliation.rejected[0].feedback,
        vec!["client: Insufficient experience".to_string()]
    );

    let mut priorities = Vec::new();
    for _ in 0..4 {
        priorities.push(agency_inbox.recv().await.expect("agency event").priority);
    }
    assert_eq!(priorities.last(), Some(&Priority::High));
}
