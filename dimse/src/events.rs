//! Notification events.
//!
//! Notification events let the embedding application observe
//! protocol activity without taking part in it:
//! any number of handlers may be subscribed to a kind of event,
//! and a failing handler is logged and otherwise ignored.
//!
//! The decision points of the protocol
//! (the intervention events of the service classes)
//! are not dispatched through this bus;
//! they are the typed handler traits of the [`service`](crate::service) module,
//! whose errors propagate into protocol status codes.
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use tracing::warn;

use crate::command::CommandField;

/// The kind of a notification event.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum NotificationKind {
    /// A DIMSE message was sent.
    DimseSent,
    /// A DIMSE message was received.
    DimseRecv,
    /// An association control message was sent.
    AcseSent,
    /// An association control message was received.
    AcseRecv,
    /// A protocol data unit was sent.
    PduSent,
    /// A protocol data unit was received.
    PduRecv,
    /// The upper layer state machine changed state.
    FsmTransition,
    /// A transport connection was opened.
    ConnOpen,
    /// A transport connection was closed.
    ConnClose,
    /// The association was aborted.
    Aborted,
    /// An association request was accepted.
    Accepted,
    /// An association request was rejected.
    Rejected,
    /// The association was released.
    Released,
    /// An association was requested.
    Requested,
    /// The association was established.
    Established,
}

impl NotificationKind {
    /// A short description of the event kind.
    pub fn description(self) -> &'static str {
        match self {
            NotificationKind::DimseSent => "DIMSE message sent",
            NotificationKind::DimseRecv => "DIMSE message received",
            NotificationKind::AcseSent => "ACSE message sent",
            NotificationKind::AcseRecv => "ACSE message received",
            NotificationKind::PduSent => "PDU sent",
            NotificationKind::PduRecv => "PDU received",
            NotificationKind::FsmTransition => "state machine transition occurred",
            NotificationKind::ConnOpen => "connection opened",
            NotificationKind::ConnClose => "connection closed",
            NotificationKind::Aborted => "association aborted",
            NotificationKind::Accepted => "association request accepted",
            NotificationKind::Rejected => "association request rejected",
            NotificationKind::Released => "association released",
            NotificationKind::Requested => "association requested",
            NotificationKind::Established => "association established",
        }
    }
}

/// Event-specific payload of a notification.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationData {
    /// A DIMSE message summary.
    Message {
        /// The command field enumerator of the message.
        command_field: CommandField,
        /// The presentation context the message travels on.
        context_id: u8,
        /// The data set length in bytes, when one is present.
        data_length: Option<usize>,
    },
    /// No event-specific payload.
    None,
}

/// A notification event as delivered to subscribed handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// What happened.
    pub kind: NotificationKind,
    /// When the event was created.
    pub at: SystemTime,
    /// Event-specific payload.
    pub data: NotificationData,
}

impl Notification {
    /// Create a notification with the current time.
    pub fn new(kind: NotificationKind, data: NotificationData) -> Self {
        Notification {
            kind,
            at: SystemTime::now(),
            data,
        }
    }
}

type NotificationHandler =
    Box<dyn Fn(&Notification) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync>;

/// A bus of notification handlers.
///
/// Handlers are invoked in subscription order.
/// Errors returned from a handler are logged and swallowed:
/// observers never affect protocol flow.
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<NotificationKind, Vec<NotificationHandler>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count: usize = self
            .handlers
            .lock()
            .map(|map| map.values().map(Vec::len).sum())
            .unwrap_or(0);
        f.debug_struct("EventBus").field("handlers", &count).finish()
    }
}

impl EventBus {
    /// Create a bus with no subscribed handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler to a kind of event.
    pub fn subscribe<F>(&self, kind: NotificationKind, handler: F)
    where
        F: Fn(&Notification) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers
            .lock()
            .expect("event bus lock poisoned")
            .entry(kind)
            .or_default()
            .push(Box::new(handler));
    }

    /// Deliver an event to every handler subscribed to its kind.
    pub fn publish(&self, notification: &Notification) {
        let handlers = self.handlers.lock().expect("event bus lock poisoned");
        if let Some(list) = handlers.get(&notification.kind) {
            for handler in list {
                if let Err(e) = handler(notification) {
                    warn!(
                        "notification handler for `{}` failed: {}",
                        notification.kind.description(),
                        e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn handlers_are_invoked_and_errors_swallowed() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&seen);
        bus.subscribe(NotificationKind::DimseSent, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        bus.subscribe(NotificationKind::DimseSent, |_| Err("observer broke".into()));
        let counter = Arc::clone(&seen);
        bus.subscribe(NotificationKind::DimseSent, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(&Notification::new(
            NotificationKind::DimseSent,
            NotificationData::None,
        ));
        // both sound handlers ran despite the failing one in between
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        // no handlers for this kind
        bus.publish(&Notification::new(
            NotificationKind::ConnClose,
            NotificationData::None,
        ));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
