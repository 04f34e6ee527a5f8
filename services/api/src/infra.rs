use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use placement_hub::config::{NotificationConfig, WorkflowConfig};
use placement_hub::workflows::notifications::{
    EmailGateway, EmailMessage, NotificationBus, NotificationError,
};
use placement_hub::workflows::requirements::{
    InMemoryDocumentStore, InMemoryPlacementRepository, PlacementService,
};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

pub(crate) type ApiService =
    PlacementService<InMemoryPlacementRepository, NotificationBus, InMemoryDocumentStore>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Mail transport stand-in: records each message and writes it to the log.
#[derive(Default, Clone)]
pub(crate) struct LoggingEmailGateway {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl EmailGateway for LoggingEmailGateway {
    fn send(&self, email: EmailMessage) -> Result<(), NotificationError> {
        info!(
            recipient = %email.recipient.key(),
            subject = %email.subject,
            "high priority email dispatched"
        );
        self.sent
            .lock()
            .map_err(|_| NotificationError::Email("mail outbox poisoned".to_string()))?
            .push(email);
        Ok(())
    }
}

impl LoggingEmailGateway {
    pub(crate) fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

/// Shared wiring for `serve` and `demo`: in-memory storage behind the notification bus.
pub(crate) fn build_service(
    notifications: &NotificationConfig,
    workflow: WorkflowConfig,
    email: LoggingEmailGateway,
) -> (Arc<ApiService>, Arc<NotificationBus>) {
    let email: Arc<dyn EmailGateway> = Arc::new(email);
    let bus = Arc::new(NotificationBus::new(notifications, Some(email)));
    let service = Arc::new(PlacementService::new(
        Arc::new(InMemoryPlacementRepository::default()),
        bus.clone(),
        Arc::new(InMemoryDocumentStore::default()),
        workflow,
    ));
    (service, bus)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
