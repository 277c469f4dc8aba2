//! The DIMSE service provider.
//!
//! One provider exists per association.
//! It is a passive state holder with two producers:
//! the upper layer task feeds inbound P-DATA through
//! [`receive_pdata`](DimseProvider::receive_pdata),
//! while the association task sends primitives with
//! [`send_msg`](DimseProvider::send_msg)
//! and consumes indications with [`get_msg`](DimseProvider::get_msg).
//!
//! C-CANCEL requests never reach the indication queue:
//! they are recorded in a bounded map keyed on the message ID
//! of the operation they target,
//! so that long running retrieve handlers can poll for cancellation
//! through a [`CancelToken`].
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};

use dicom_ul::pdu::{PDataValue, Pdu};
use snafu::{ResultExt, Snafu};
use tracing::{debug, warn};

use crate::config::DimseConfig;
use crate::events::{EventBus, Notification, NotificationData, NotificationKind};
use crate::message::{self, Message, MessageAssembler};
use crate::primitives::{CCancel, Primitive};

/// An event escalated to the upper layer's state machine.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum UpperLayerEvent {
    /// An unrecognized or invalid PDU was received
    /// (event 19 of the upper layer state machine).
    /// The upper layer reacts by aborting the association.
    InvalidPdu,
}

/// The capabilities that the DIMSE layer requires
/// from the DICOM Upper Layer.
///
/// The upper layer owns the transport:
/// the provider only pushes fully formed PDUs down,
/// escalates protocol errors,
/// and asks whether the association is still usable.
pub trait Dul: Send {
    /// Send one PDU to the peer.
    fn send_pdu(
        &mut self,
        pdu: Pdu,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;

    /// Push an event onto the upper layer's event queue.
    fn push_event(&mut self, event: UpperLayerEvent);

    /// Whether the association is still alive.
    fn is_alive(&self) -> bool;
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("Could not build outbound message"))]
    Build {
        #[snafu(backtrace)]
        source: message::BuildError,
    },

    #[snafu(display("Could not send message through the upper layer"))]
    Send {
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Inbound state guarded by one lock:
/// the indication queue and the cancel map.
#[derive(Debug, Default)]
struct Inbound {
    queue: VecDeque<(u8, Primitive)>,
    cancels: HashMap<u16, CCancel>,
}

#[derive(Debug, Default)]
struct SharedState {
    inbound: Mutex<Inbound>,
    available: Condvar,
}

/// A handle for polling whether a C-CANCEL request
/// has arrived for a given operation.
///
/// Cancellation is advisory:
/// there is no forcible interrupt,
/// the handler is expected to finish with a Cancel status
/// on its own accord.
#[derive(Debug, Clone)]
pub struct CancelToken {
    shared: Arc<SharedState>,
    message_id: u16,
}

impl CancelToken {
    /// Whether a C-CANCEL targeting this operation has been received.
    pub fn is_cancelled(&self) -> bool {
        self.shared
            .inbound
            .lock()
            .expect("provider lock poisoned")
            .cancels
            .contains_key(&self.message_id)
    }

    /// Remove and return the pending C-CANCEL request, if any.
    pub fn take(&self) -> Option<CCancel> {
        self.shared
            .inbound
            .lock()
            .expect("provider lock poisoned")
            .cancels
            .remove(&self.message_id)
    }
}

/// The per-association DIMSE service provider.
pub struct DimseProvider<D> {
    dul: Mutex<D>,
    config: DimseConfig,
    events: EventBus,
    shared: Arc<SharedState>,
    assembler: Mutex<MessageAssembler>,
}

impl<D> std::fmt::Debug for DimseProvider<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DimseProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<D> DimseProvider<D>
where
    D: Dul,
{
    /// Create a provider over the given upper layer handle.
    pub fn new(dul: D, config: DimseConfig) -> Self {
        DimseProvider {
            dul: Mutex::new(dul),
            config,
            events: EventBus::new(),
            shared: Arc::new(SharedState::default()),
            assembler: Mutex::new(MessageAssembler::new()),
        }
    }

    /// The configuration in effect for this provider.
    pub fn config(&self) -> &DimseConfig {
        &self.config
    }

    /// The notification event bus of this provider.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Whether the underlying association is still alive.
    pub fn is_alive(&self) -> bool {
        self.dul.lock().expect("provider lock poisoned").is_alive()
    }

    /// Send a DIMSE primitive to the peer
    /// under the given presentation context.
    ///
    /// The request form is selected unless
    /// _MessageIDBeingRespondedTo_ is set.
    pub fn send_msg(&self, primitive: &Primitive, context_id: u8) -> Result<()> {
        let message = Message::from_primitive(primitive, context_id, &self.config)
            .context(BuildSnafu)?;

        self.events.publish(&Notification::new(
            NotificationKind::DimseSent,
            NotificationData::Message {
                command_field: message.command_field,
                context_id,
                data_length: message.data.as_ref().map(Vec::len),
            },
        ));
        debug!(
            "sending {} on presentation context {}",
            message.command_field.name(),
            context_id
        );

        let fragments = message
            .fragments(self.config.max_pdu_size)
            .context(BuildSnafu)?;
        let mut dul = self.dul.lock().expect("provider lock poisoned");
        for pdu in fragments {
            dul.send_pdu(pdu).context(SendSnafu)?;
        }
        Ok(())
    }

    /// Push one PDU to the peer without going through a primitive.
    ///
    /// Used by service classes for association-level signalling
    /// such as aborting on an unserviceable request.
    pub fn send_pdu(&self, pdu: Pdu) -> Result<()> {
        self.dul
            .lock()
            .expect("provider lock poisoned")
            .send_pdu(pdu)
            .context(SendSnafu)
    }

    /// Dequeue the next indication.
    ///
    /// When `block` is on, waits until either an indication arrives
    /// or the configured DIMSE timeout elapses;
    /// on timeout, `None` is returned.
    /// When `block` is off, returns immediately.
    pub fn get_msg(&self, block: bool) -> Option<(u8, Primitive)> {
        let mut inbound = self.shared.inbound.lock().expect("provider lock poisoned");
        if !block {
            return inbound.queue.pop_front();
        }

        match self.config.dimse_timeout {
            Some(timeout) => {
                let (mut inbound, result) = self
                    .shared
                    .available
                    .wait_timeout_while(inbound, timeout, |state| state.queue.is_empty())
                    .expect("provider lock poisoned");
                if result.timed_out() && inbound.queue.is_empty() {
                    return None;
                }
                inbound.queue.pop_front()
            }
            None => {
                while inbound.queue.is_empty() {
                    inbound = self
                        .shared
                        .available
                        .wait(inbound)
                        .expect("provider lock poisoned");
                }
                inbound.queue.pop_front()
            }
        }
    }

    /// Read the next indication without removing it from the queue.
    pub fn peek_msg(&self) -> Option<(u8, Primitive)> {
        self.shared
            .inbound
            .lock()
            .expect("provider lock poisoned")
            .queue
            .front()
            .cloned()
    }

    /// Process one P-DATA primitive received from the peer.
    ///
    /// Called by the upper layer task for every inbound P-DATA.
    /// Completed messages become indications on the queue,
    /// except for C-CANCEL requests,
    /// which go to the bounded cancel map.
    /// A message that cannot be understood escalates
    /// [`UpperLayerEvent::InvalidPdu`] and discards the partial state.
    pub fn receive_pdata(&self, values: &[PDataValue]) {
        let mut assembler = self.assembler.lock().expect("provider lock poisoned");
        let message = match assembler.feed_pdata(values) {
            Ok(None) => return,
            Ok(Some(message)) => message,
            Err(e) => {
                warn!("received an invalid DIMSE message: {}", e);
                *assembler = MessageAssembler::new();
                self.dul
                    .lock()
                    .expect("provider lock poisoned")
                    .push_event(UpperLayerEvent::InvalidPdu);
                return;
            }
        };
        // ready for the next message
        *assembler = MessageAssembler::new();
        drop(assembler);

        self.events.publish(&Notification::new(
            NotificationKind::DimseRecv,
            NotificationData::Message {
                command_field: message.command_field,
                context_id: message.context_id,
                data_length: message.data.as_ref().map(Vec::len),
            },
        ));

        let context_id = message.context_id;
        let primitive = match message.into_primitive() {
            Ok(primitive) => primitive,
            Err(e) => {
                warn!("received an invalid DIMSE message: {}", e);
                self.dul
                    .lock()
                    .expect("provider lock poisoned")
                    .push_event(UpperLayerEvent::InvalidPdu);
                return;
            }
        };

        let mut inbound = self.shared.inbound.lock().expect("provider lock poisoned");
        if let Primitive::CCancel(cancel) = primitive {
            if inbound.cancels.len() < self.config.cancel_queue_capacity {
                if let Some(message_id) = cancel.message_id_being_responded_to {
                    debug!("C-CANCEL received for message ID {}", message_id);
                    inbound.cancels.insert(message_id, cancel);
                }
            }
            return;
        }
        inbound.queue.push_back((context_id, primitive));
        drop(inbound);
        self.shared.available.notify_one();
    }

    /// Obtain a token for observing C-CANCEL requests
    /// directed at the given message ID.
    pub fn cancel_token(&self, message_id: u16) -> CancelToken {
        CancelToken {
            shared: Arc::clone(&self.shared),
            message_id,
        }
    }

    /// Remove and return a pending C-CANCEL request
    /// directed at the given message ID.
    pub fn take_cancel(&self, message_id: u16) -> Option<CCancel> {
        self.shared
            .inbound
            .lock()
            .expect("provider lock poisoned")
            .cancels
            .remove(&message_id)
    }
}
