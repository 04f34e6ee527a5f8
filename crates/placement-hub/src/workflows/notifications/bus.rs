use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{
    EmailGateway, EmailMessage, Notification, NotificationError, NotificationPublisher, Priority,
    Recipient,
};
use crate::config::NotificationConfig;

type Channels = Arc<Mutex<HashMap<String, broadcast::Sender<Notification>>>>;

/// Publish/subscribe map keyed by recipient. A recipient's channel exists only while at
/// least one [`Subscription`] for it is alive.
pub struct NotificationBus {
    channels: Channels,
    capacity: usize,
    email: Option<Arc<dyn EmailGateway>>,
}

impl NotificationBus {
    pub fn new(config: &NotificationConfig, email: Option<Arc<dyn EmailGateway>>) -> Self {
        let email = if config.email_high_priority { email } else { None };
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: config.channel_capacity.max(1),
            email,
        }
    }

    pub fn subscribe(&self, recipient: &Recipient) -> Result<Subscription, NotificationError> {
        let key = recipient.key();
        let mut guard = self
            .channels
            .lock()
            .map_err(|_| NotificationError::Unavailable)?;
        let receiver = guard
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();
        debug!(recipient = %key, "notification subscriber attached");

        Ok(Subscription {
            key,
            receiver,
            channels: self.channels.clone(),
        })
    }

    pub fn subscriber_count(&self, recipient: &Recipient) -> usize {
        self.channels
            .lock()
            .ok()
            .and_then(|guard| {
                guard
                    .get(&recipient.key())
                    .map(|sender| sender.receiver_count())
            })
            .unwrap_or(0)
    }
}

impl NotificationPublisher for NotificationBus {
    fn publish(&self, notification: Notification) -> Result<(), NotificationError> {
        let key = notification.recipient.key();
        {
            let guard = self
                .channels
                .lock()
                .map_err(|_| NotificationError::Unavailable)?;
            if let Some(sender) = guard.get(&key) {
                // A send error only means every receiver went away mid-publish.
                let _ = sender.send(notification.clone());
            }
        }

        if notification.priority == Priority::High {
            if let Some(email) = &self.email {
                email.send(EmailMessage {
                    recipient: notification.recipient.clone(),
                    subject: notification.title.clone(),
                    body: notification.message.clone(),
                })?;
            }
        }

        Ok(())
    }
}

/// Live listener for one recipient. Dropping the last subscription removes the channel.
pub struct Subscription {
    key: String,
    receiver: broadcast::Receiver<Notification>,
    channels: Channels,
}

impl Subscription {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait for the next notification; `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(notification) => return Some(notification),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(recipient = %self.key, skipped, "notification subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.channels.lock() {
            let last = guard
                .get(&self.key)
                .map(|sender| sender.receiver_count() <= 1)
                .unwrap_or(false);
            if last {
                guard.remove(&self.key);
                debug!(recipient = %self.key, "notification channel released");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::notifications::NotificationKind;
    use crate::workflows::requirements::domain::AgencyId;

    #[derive(Default)]
    struct RecordingEmail {
        sent: Mutex<Vec<EmailMessage>>,
    }

    impl EmailGateway for RecordingEmail {
        fn send(&self, email: EmailMessage) -> Result<(), NotificationError> {
            self.sent.lock().expect("email mutex poisoned").push(email);
            Ok(())
        }
    }

    fn agency() -> Recipient {
        Recipient::Agency(AgencyId::from("agency-1"))
    }

    fn notification(priority: Priority) -> Notification {
        Notification::new(
            agency(),
            NotificationKind::RequirementForwarded,
            priority,
            "New requirement forwarded",
            "Welder x5",
            "req-1",
        )
    }

    #[tokio::test]
    async fn subscribers_receive_their_notifications() {
        let bus = NotificationBus::new(&NotificationConfig::default(), None);
        let mut subscription = bus.subscribe(&agency()).expect("subscribe");

        bus.publish(notification(Priority::Normal)).expect("publish");

        let received = subscription.recv().await.expect("notification delivered");
        assert_eq!(received.reference, "req-1");
    }

    #[test]
    fn channel_is_released_with_the_last_subscriber() {
        let bus = NotificationBus::new(&NotificationConfig::default(), None);
        let first = bus.subscribe(&agency()).expect("subscribe");
        let second = bus.subscribe(&agency()).expect("subscribe");
        assert_eq!(bus.subscriber_count(&agency()), 2);

        drop(first);
        assert_eq!(bus.subscriber_count(&agency()), 1);

        drop(second);
        assert_eq!(bus.subscriber_count(&agency()), 0);
        assert!(bus.channels.lock().expect("lock").is_empty());
    }

    #[test]
    fn publishing_without_subscribers_is_not_an_error() {
        let bus = NotificationBus::new(&NotificationConfig::default(), None);
        assert!(bus.publish(notification(Priority::Normal)).is_ok());
    }

    #[test]
    fn high_priority_notifications_are_emailed_when_enabled() {
        let email = Arc::new(RecordingEmail::default());
        let gateway: Arc<dyn EmailGateway> = email.clone();
        let bus = NotificationBus::new(&NotificationConfig::default(), Some(gateway));

        bus.publish(notification(Priority::Normal)).expect("publish");
        bus.publish(notification(Priority::High)).expect("publish");

        let sent = email.sent.lock().expect("lock");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "New requirement forwarded");
    }

    #[test]
    fn email_can_be_disabled_by_config() {
        let email = Arc::new(RecordingEmail::default());
        let config = NotificationConfig {
            channel_capacity: 8,
            email_high_priority: false,
        };
        let gateway: Arc<dyn EmailGateway> = email.clone();
        let bus = NotificationBus::new(&config, Some(gateway));

        bus.publish(notification(Priority::High)).expect("publish");

        assert!(email.sent.lock().expect("lock").is_empty());
    }
}
