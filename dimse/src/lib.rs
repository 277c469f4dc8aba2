//! This crate contains the types and methods needed to exchange
//! DICOM Message Service Element (DIMSE) messages
//! over an established upper layer association.
//!
//! The DIMSE layer multiplexes composite and normalized operations
//! (C-ECHO, C-STORE, C-FIND, C-GET, C-MOVE, C-CANCEL and the N-services)
//! onto the reliable byte stream negotiated by the upper layer,
//! preserving the request/indication/response/confirmation
//! primitive semantics of PS3.7.
//!
//! - The [`command`] module
//!   models the Command Set and its Implicit VR Little Endian codec.
//! - The [`primitives`] module
//!   provides typed carriers for every DIMSE request and response.
//! - The [`message`] module
//!   bridges primitives and the wire:
//!   presentation data value fragmentation and reassembly.
//! - The [`provider`] module
//!   holds the per-association service provider:
//!   the indication queue, the C-CANCEL map and the DIMSE timeout.
//! - The [`service`] module
//!   dispatches indications to user handlers
//!   and drives the C-GET/C-MOVE sub-operation engines.
//! - The [`events`] module
//!   carries observational notification events.
//! - The [`status`] module
//!   holds the status code taxonomy.
//!
//! The upper layer itself
//! (TCP lifecycle, association negotiation, ARTIM timing)
//! is not this crate's concern:
//! it is consumed through the [`provider::Dul`] capability
//! and the PDU vocabulary of [`dicom_ul`].

pub mod command;
pub mod config;
pub mod dataset;
pub mod events;
pub mod message;
pub mod primitives;
pub mod provider;
pub mod service;
pub mod status;

// re-exports

pub use command::{CommandField, CommandSet};
pub use config::DimseConfig;
pub use events::{EventBus, Notification, NotificationKind};
pub use message::{Message, MessageAssembler};
pub use primitives::{AeTitle, Priority, Primitive, Uid};
pub use provider::{CancelToken, DimseProvider, Dul, UpperLayerEvent};
pub use service::{
    DispatchOutcome, HandlerStatus, PresentationContext, ServiceClassKind, ServiceDispatcher,
    ServiceHandlers, StatusDetail,
};
pub use status::{category, StatusCategory};
