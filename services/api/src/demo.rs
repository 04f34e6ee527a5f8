use crate::infra::{build_service, parse_date, ApiService, LoggingEmailGateway};
use chrono::{Local, NaiveDate};
use clap::Args;
use placement_hub::config::{NotificationConfig, WorkflowConfig};
use placement_hub::error::AppError;
use placement_hub::workflows::labour_import::LabourCsvImporter;
use placement_hub::workflows::requirements::{
    Agency, AgencyId, AgencyResponse, AgencyStatus, AssignLabour, ForwardAnswer, ForwardRequest,
    ForwardedRole, ForwardingMode, JobRoleDraft, JobRoleId, LabourAssignment, LabourProfileDraft,
    NewAgency, NewRequirement, OfferLetterDetails, PlacementServiceError, RequirementTree,
    ReviewDecision, ReviewSide, ReviewStatus, RoleView, StageCommand, UploadedFile,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Travel date used when scheduling the flight (YYYY-MM-DD). Defaults to today + 21 days.
    #[arg(long, value_parser = parse_date)]
    pub(crate) travel_date: Option<NaiveDate>,
    /// Print the final requirement tree as JSON.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct LabourImportArgs {
    /// Agency the profiles would be registered under
    #[arg(long)]
    pub(crate) agency_id: String,
    /// Path to the agency's CSV export
    #[arg(long)]
    pub(crate) csv: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DemoOutcome<'a> {
    tree: &'a RequirementTree,
    emails_sent: usize,
}

pub(crate) fn run_labour_import(args: LabourImportArgs) -> Result<(), AppError> {
    let import = LabourCsvImporter::from_path(&args.csv)?;

    println!(
        "Agency {} export: {} profile(s) ready, {} row(s) skipped",
        args.agency_id,
        import.profiles.len(),
        import.skipped.len()
    );
    for profile in &import.profiles {
        println!(
            "  - {} | {} | passport {} | {}",
            profile.name,
            profile.nationality.as_deref().unwrap_or("-"),
            profile.passport_number.as_deref().unwrap_or("-"),
            profile.profession.as_deref().unwrap_or("-"),
        );
    }
    for row in &import.skipped {
        println!("  ! line {}: {}", row.line, row.reason);
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let travel_date = args
        .travel_date
        .unwrap_or_else(|| Local::now().date_naive() + chrono::Duration::days(21));
    let email = LoggingEmailGateway::default();
    let (service, _bus) = build_service(
        &NotificationConfig::default(),
        WorkflowConfig::default(),
        email.clone(),
    );

    println!("Placement hub demo");
    let alpha = verified_agency(&service, "Alpha Manpower")?;
    let beta = verified_agency(&service, "Beta Recruiters")?;
    let gamma = verified_agency(&service, "Gamma Staffing")?;

    let tree = service.submit_requirement(NewRequirement {
        client_id: "client-demo".into(),
        job_roles: vec![role("Electrician", 6, 1800), role("Plumber", 3, 1600)],
        submit: true,
    })?;
    let requirement_id = tree.requirement.id.clone();
    let electrician = tree.requirement.job_roles[0].id.clone();
    let plumber = tree.requirement.job_roles[1].id.clone();
    println!(
        "\n1. Requirement {} submitted -> {}",
        requirement_id,
        tree.requirement.status.label()
    );

    let mut draft = service.draft(&requirement_id, ForwardingMode::Split)?;
    draft
        .add_assignment(&electrician, alpha.id.clone())
        .map_err(PlacementServiceError::from)?;
    draft
        .set_quantity(&electrician, &alpha.id, 4)
        .map_err(PlacementServiceError::from)?;
    draft
        .add_assignment(&electrician, beta.id.clone())
        .map_err(PlacementServiceError::from)?;
    draft
        .add_assignment(&plumber, beta.id.clone())
        .map_err(PlacementServiceError::from)?;
    let request = draft.into_request().map_err(PlacementServiceError::from)?;
    let tree = service.forward(request)?;
    println!("\n2. Split forward -> {}", tree.requirement.status.label());
    for forward in &tree.forwards {
        println!(
            "  - {} x{} -> {}",
            role_title(&tree, &forward.job_role_id),
            forward.quantity,
            forward.agency_id
        );
    }

    answer(&service, &alpha.id, &electrician, AgencyResponse::Accepted, None)?;
    answer(&service, &beta.id, &plumber, AgencyResponse::Accepted, None)?;
    let tree = answer(
        &service,
        &beta.id,
        &electrician,
        AgencyResponse::Rejected,
        Some("No certified electricians this month"),
    )?;
    println!("\n3. Agency answers recorded");
    print_role(&tree, &electrician);

    let tree = service.forward(ForwardRequest {
        requirement_id: requirement_id.clone(),
        forwarded_roles: vec![ForwardedRole {
            job_role_id: electrician.clone(),
            agency_id: gamma.id.clone(),
            quantity: 2,
        }],
    })?;
    answer(&service, &gamma.id, &electrician, AgencyResponse::Accepted, None)?;
    println!("\n4. Shortfall re-forwarded to {}", gamma.name);
    print_role(&tree, &electrician);

    let hired = assign(&service, &electrician, &alpha, "Suresh Gurung")?;
    let declined = assign(&service, &electrician, &alpha, "Bikash Rai")?;
    for assignment in [&hired, &declined] {
        review(&service, assignment, ReviewSide::Admin, ReviewStatus::Accepted, None)?;
    }
    let hired = review(&service, &hired, ReviewSide::Client, ReviewStatus::Accepted, None)?;
    review(
        &service,
        &declined,
        ReviewSide::Client,
        ReviewStatus::Rejected,
        Some("Needs industrial wiring experience"),
    )?;
    let view = service.role_assignments(&electrician)?;
    println!("\n5. Client reviews reconciled");
    println!(
        "  accepted {} | still needed {} | priority {}",
        view.reconciliation.accepted_count,
        view.reconciliation.total_needed,
        view.reconciliation.priority
    );
    for rejected in &view.reconciliation.rejected {
        println!(
            "  - {} rejected by {:?}: {}",
            rejected.labour_name,
            rejected.rejected_by,
            rejected.feedback.join("; ")
        );
    }

    service.save_offer_letter_details(
        &requirement_id,
        OfferLetterDetails {
            working_hours: "8 hours".to_string(),
            working_days: "6 days a week".to_string(),
            leave_salary: "30 days paid annually".to_string(),
            end_of_service: "As per Qatar labour law".to_string(),
            probation_period: "3 months".to_string(),
        },
    )?;

    println!("\n6. Onboarding {}", hired.id);
    let pipeline = vec![
        StageCommand::UploadOfferLetter(document("offer-letter.pdf", "application/pdf")),
        StageCommand::VerifyOfferLetter,
        StageCommand::MarkVisaApplied,
        StageCommand::MarkQvcPaid,
        StageCommand::SignContract,
        StageCommand::MarkMedicalCleared,
        StageCommand::MarkFingerprintDone,
        StageCommand::UploadVisa(document("visa.jpg", "image/jpeg")),
        StageCommand::ScheduleTravel { travel_date },
        StageCommand::ConfirmTravel,
        StageCommand::ConfirmArrival {
            status: "ARRIVED".to_string(),
            notes: Some("Received at the airport".to_string()),
        },
    ];
    for command in pipeline {
        let action = command.action();
        let assignment = service.advance_stage(&hired.id, command)?;
        println!(
            "  - {:<22} -> {}",
            action.endpoint(),
            assignment.current_stage.label()
        );
    }

    let summary = service.send_reminders()?;
    println!(
        "\n7. Reminder sweep: {} role(s) flagged, {} client reminder(s)",
        summary.roles_flagged, summary.client_reminders
    );

    let tree = service.requirement(&requirement_id)?;
    let emails_sent = email.sent().len();
    println!("  High priority emails dispatched: {emails_sent}");

    if args.json {
        let outcome = DemoOutcome {
            tree: &tree,
            emails_sent,
        };
        match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("\nRequirement tree:\n{json}"),
            Err(err) => println!("\nRequirement tree unavailable: {err}"),
        }
    }

    Ok(())
}

fn role(title: &str, quantity: u32, salary: u32) -> JobRoleDraft {
    JobRoleDraft {
        title: title.to_string(),
        quantity,
        nationality: Some("Nepal".to_string()),
        salary,
        allowances: Default::default(),
        min_experience_years: Some(2),
        max_experience_years: None,
        languages: vec!["English".to_string(), "Hindi".to_string()],
    }
}

fn document(name: &str, content_type: &str) -> UploadedFile {
    UploadedFile {
        file_name: name.to_string(),
        content_type: Some(content_type.to_string()),
        bytes: format!("demo copy of {name}").into_bytes(),
    }
}

fn verified_agency(service: &ApiService, name: &str) -> Result<Agency, PlacementServiceError> {
    let agency = service.register_agency(NewAgency {
        name: name.to_string(),
        contact_email: format!(
            "desk@{}.example",
            name.split_whitespace().next().unwrap_or(name).to_lowercase()
        ),
    })?;
    service.set_agency_status(&agency.id, AgencyStatus::Verified)
}

fn answer(
    service: &ApiService,
    agency: &AgencyId,
    role: &JobRoleId,
    decision: AgencyResponse,
    reason: Option<&str>,
) -> Result<std::sync::Arc<RequirementTree>, PlacementServiceError> {
    service.respond_to_forward(
        agency,
        role,
        ForwardAnswer {
            decision,
            reason: reason.map(str::to_string),
        },
    )
}

fn assign(
    service: &ApiService,
    role: &JobRoleId,
    agency: &Agency,
    name: &str,
) -> Result<LabourAssignment, PlacementServiceError> {
    let profile = service.register_labour(
        &agency.id,
        LabourProfileDraft {
            name: name.to_string(),
            nationality: Some("Nepal".to_string()),
            passport_number: None,
            profession: Some("Electrician".to_string()),
        },
    )?;
    service.assign_labour(
        role,
        AssignLabour {
            labour_profile_id: profile.id,
            agency_id: agency.id.clone(),
        },
    )
}

fn review(
    service: &ApiService,
    assignment: &LabourAssignment,
    side: ReviewSide,
    decision: ReviewStatus,
    feedback: Option<&str>,
) -> Result<LabourAssignment, PlacementServiceError> {
    service.review_assignment(
        &assignment.id,
        ReviewDecision {
            side,
            decision,
            feedback: feedback.map(str::to_string),
        },
    )
}

fn role_title<'a>(tree: &'a RequirementTree, id: &JobRoleId) -> &'a str {
    tree.requirement
        .job_role(id)
        .map(|role| role.title.as_str())
        .unwrap_or("unknown role")
}

fn print_role(tree: &RequirementTree, id: &JobRoleId) {
    let Some(RoleView {
        title,
        reconciliation,
        ..
    }) = tree.role(id)
    else {
        return;
    };
    let needs_more = tree
        .requirement
        .job_role(id)
        .map(|role| role.needs_more_labour)
        .unwrap_or(false);
    println!(
        "  {title}: requested {} | forwarded {} | needs more labour {} | priority {}",
        reconciliation.requested_quantity,
        reconciliation.forwarded_quantity,
        needs_more,
        reconciliation.priority
    );
}
