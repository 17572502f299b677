use tracing::info;

use crate::domain::events::MessengerEvent;
use crate::domain::ports::EventPublisher;

/// Publishes domain events as structured log records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventPublisher;

impl EventPublisher<MessengerEvent> for TracingEventPublisher {
    fn publish(&self, event: &MessengerEvent) {
        match event {
            MessengerEvent::UserRegistered { id, at } => {
                info!(target: "messenger.events", user_id = %id, at = %at, "user registered");
            }
            MessengerEvent::UserDeleted { id, at } => {
                info!(target: "messenger.events", user_id = %id, at = %at, "user deleted");
            }
            MessengerEvent::ThreadCreated { id, at } => {
                info!(target: "messenger.events", thread_id = %id, at = %at, "thread created");
            }
            MessengerEvent::MessagesAttached {
                thread_id,
                accepted,
                rejected,
                at,
            } => {
                info!(
                    target: "messenger.events",
                    thread_id = %thread_id,
                    accepted,
                    rejected,
                    at = %at,
                    "messages attached"
                );
            }
            MessengerEvent::AvatarReplaced { user_id, at } => {
                info!(target: "messenger.events", user_id = %user_id, at = %at, "avatar replaced");
            }
        }
    }
}
