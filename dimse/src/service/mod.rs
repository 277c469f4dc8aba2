//! Service class dispatch.
//!
//! The dispatcher drains indications from a [`DimseProvider`],
//! routes each request to the service class
//! registered for its SOP class UID,
//! and turns the bound handler's result into
//! correctly formed and ordered response primitives.
//!
//! Handlers are the intervention points of the protocol:
//! at most one handler is bound per service,
//! and a handler error propagates into
//! the service specific failure status
//! instead of tearing the association down.
use std::sync::Arc;

use dicom_core::Tag;
use dicom_dictionary_std::uids;
use dicom_object::InMemDicomObject;
use dicom_ul::pdu::{AbortRQSource, Pdu};
use snafu::{Backtrace, ResultExt, Snafu};
use tracing::warn;

use crate::primitives::{
    AeTitle, CEcho, CFind, CGet, CMove, CStore, NAction, NCreate, NDelete, NEventReport, NGet,
    NSet, Primitive, Uid,
};
use crate::provider::{self, CancelToken, DimseProvider, Dul};
use crate::status::{category, StatusCategory};

pub mod normalized;
pub mod query_retrieve;
pub mod storage;
pub mod verification;

pub use query_retrieve::{MoveDestination, MoveSubOperations, SubOperations};

/// The error type of a handler.
///
/// Handler failures never reach the wire as aborts;
/// the dispatcher folds them into the failure status
/// reserved for the service at hand.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The service class responsible for a SOP class UID.
#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ServiceClassKind {
    /// The verification service class (C-ECHO).
    Verification,
    /// The storage service class (C-STORE).
    Storage,
    /// Query/retrieve matching (C-FIND).
    QueryRetrieveFind,
    /// Query/retrieve retrieval over the same association (C-GET).
    QueryRetrieveGet,
    /// Query/retrieve retrieval towards another application entity (C-MOVE).
    QueryRetrieveMove,
    /// Basic worklist matching (C-FIND).
    BasicWorklistFind,
    /// Normalized services (DIMSE-N operations).
    Normalized,
}

impl ServiceClassKind {
    /// Whether the status code belongs to
    /// the valid set of this service class.
    pub fn is_valid_status(self, code: u16) -> bool {
        use ServiceClassKind::*;
        match self {
            Verification => matches!(code, 0x0000 | 0x0122 | 0x0210 | 0x0211 | 0x0212),
            Storage => {
                matches!(
                    code,
                    0x0000
                        | 0xB000
                        | 0xB006
                        | 0xB007
                        | 0x0117
                        | 0x0122
                        | 0x0124
                        | 0x0210
                        | 0x0211
                        | 0x0212
                ) || (0xA700..=0xA7FF).contains(&code)
                    || (0xA900..=0xA9FF).contains(&code)
                    || (0xC000..=0xCFFF).contains(&code)
            }
            QueryRetrieveFind | BasicWorklistFind => {
                matches!(
                    code,
                    0x0000 | 0xFE00 | 0xFF00 | 0xFF01 | 0x0122 | 0x0124 | 0x0210 | 0x0211
                        | 0x0212 | 0xA700 | 0xA900
                ) || (0xC000..=0xCFFF).contains(&code)
            }
            QueryRetrieveGet => {
                matches!(
                    code,
                    0x0000 | 0xFE00 | 0xFF00 | 0xB000 | 0x0122 | 0x0124 | 0x0210 | 0x0211
                        | 0x0212 | 0xA701 | 0xA702 | 0xA900
                ) || (0xC000..=0xCFFF).contains(&code)
            }
            QueryRetrieveMove => {
                matches!(
                    code,
                    0x0000 | 0xFE00 | 0xFF00 | 0xB000 | 0x0122 | 0x0124 | 0x0210 | 0x0211
                        | 0x0212 | 0xA701 | 0xA702 | 0xA801 | 0xA900
                ) || (0xC000..=0xCFFF).contains(&code)
            }
            Normalized => category(code) != StatusCategory::Unknown,
        }
    }
}

/// Map a SOP class UID to the service class that serves it.
pub fn service_class_for(sop_class_uid: &str) -> Option<ServiceClassKind> {
    match sop_class_uid {
        uids::VERIFICATION => Some(ServiceClassKind::Verification),
        uids::PATIENT_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND
        | uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND => {
            Some(ServiceClassKind::QueryRetrieveFind)
        }
        uids::MODALITY_WORKLIST_INFORMATION_MODEL_FIND => {
            Some(ServiceClassKind::BasicWorklistFind)
        }
        uids::PATIENT_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_GET
        | uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_GET
        | uids::COMPOSITE_INSTANCE_ROOT_RETRIEVE_GET
        | uids::COMPOSITE_INSTANCE_RETRIEVE_WITHOUT_BULK_DATA_GET => {
            Some(ServiceClassKind::QueryRetrieveGet)
        }
        uids::PATIENT_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE
        | uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE
        | uids::COMPOSITE_INSTANCE_ROOT_RETRIEVE_MOVE => {
            Some(ServiceClassKind::QueryRetrieveMove)
        }
        uids::MODALITY_PERFORMED_PROCEDURE_STEP | uids::STORAGE_COMMITMENT_PUSH_MODEL => {
            Some(ServiceClassKind::Normalized)
        }
        _ if sop_class_uid.starts_with("1.2.840.10008.5.1.4.1.1.") => {
            Some(ServiceClassKind::Storage)
        }
        _ => None,
    }
}

/// A presentation context negotiated for the association,
/// as needed by the DIMSE layer:
/// the context ID,
/// the abstract syntax (a SOP class UID)
/// and the accepted transfer syntax.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct PresentationContext {
    pub id: u8,
    pub abstract_syntax: String,
    pub transfer_syntax: String,
}

/// Additional response detail accompanying a status code.
///
/// Recognized fields are copied onto the response primitive;
/// fields that the response at hand cannot carry are dropped with a log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusDetail {
    pub status: u16,
    pub error_comment: Option<String>,
    pub offending_element: Option<Vec<Tag>>,
    pub affected_sop_instance_uid: Option<Uid>,
    pub number_of_remaining_suboperations: Option<u16>,
    pub number_of_completed_suboperations: Option<u16>,
    pub number_of_failed_suboperations: Option<u16>,
    pub number_of_warning_suboperations: Option<u16>,
}

impl StatusDetail {
    /// A detail carrying only a status code.
    pub fn from_status(status: u16) -> Self {
        StatusDetail {
            status,
            ..Default::default()
        }
    }
}

/// The outcome of a handler:
/// either a bare status code
/// or a status with additional detail elements.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerStatus {
    Code(u16),
    Detail(StatusDetail),
}

impl HandlerStatus {
    /// The status code of this outcome.
    pub fn status(&self) -> u16 {
        match self {
            HandlerStatus::Code(code) => *code,
            HandlerStatus::Detail(detail) => detail.status,
        }
    }

    pub(crate) fn into_detail(self) -> StatusDetail {
        match self {
            HandlerStatus::Code(code) => StatusDetail::from_status(code),
            HandlerStatus::Detail(detail) => detail,
        }
    }
}

impl From<u16> for HandlerStatus {
    fn from(code: u16) -> Self {
        HandlerStatus::Code(code)
    }
}

impl From<StatusDetail> for HandlerStatus {
    fn from(detail: StatusDetail) -> Self {
        HandlerStatus::Detail(detail)
    }
}

/// Log a warning when a handler returns a status
/// outside the valid set of its service class.
/// The value is kept as returned.
pub(crate) fn check_status(kind: ServiceClassKind, code: u16) {
    if !kind.is_valid_status(code) {
        warn!("unknown status value returned by handler: {:#06x}", code);
    }
}

/// A lazy, finite stream of `(status, data set)` pairs
/// produced by a multi-response handler.
pub type ResponseStream =
    Box<dyn Iterator<Item = (HandlerStatus, Option<InMemDicomObject>)> + Send>;

/// Handler for verification requests.
pub trait EchoHandler: Send {
    /// Handle a C-ECHO request.
    fn on_c_echo(
        &mut self,
        request: &CEcho,
        context: &PresentationContext,
    ) -> Result<HandlerStatus, HandlerError>;
}

/// Handler for storage requests.
pub trait StoreHandler: Send {
    /// Handle a C-STORE request.
    ///
    /// The data set is already decoded
    /// under the presentation context's transfer syntax;
    /// the raw bytes remain available on the request primitive.
    fn on_c_store(
        &mut self,
        request: &CStore,
        data_set: &InMemDicomObject,
        context: &PresentationContext,
    ) -> Result<HandlerStatus, HandlerError>;
}

/// Handler for query matching requests.
pub trait FindHandler: Send {
    /// Handle a C-FIND request by producing a stream of
    /// pending matches terminated by a final status.
    ///
    /// The cancel token reports whether a C-CANCEL
    /// targeting this request has arrived;
    /// the expected reaction is a Cancel status pair.
    fn on_c_find(
        &mut self,
        request: &CFind,
        identifier: &InMemDicomObject,
        context: &PresentationContext,
        cancel: CancelToken,
    ) -> Result<ResponseStream, HandlerError>;
}

/// Handler for retrieve requests served over the same association.
pub trait GetHandler: Send {
    /// Handle a C-GET request.
    fn on_c_get(
        &mut self,
        request: &CGet,
        identifier: &InMemDicomObject,
        context: &PresentationContext,
        cancel: CancelToken,
    ) -> Result<SubOperations, HandlerError>;
}

/// Handler for retrieve requests served towards another application entity.
pub trait MoveHandler: Send {
    /// Handle a C-MOVE request.
    fn on_c_move(
        &mut self,
        request: &CMove,
        identifier: &InMemDicomObject,
        context: &PresentationContext,
        cancel: CancelToken,
    ) -> Result<MoveSubOperations, HandlerError>;
}

/// Handler for N-EVENT-REPORT requests.
pub trait EventReportHandler: Send {
    /// Handle an N-EVENT-REPORT request,
    /// returning the status and the optional event reply data set.
    fn on_n_event_report(
        &mut self,
        request: &NEventReport,
        context: &PresentationContext,
    ) -> Result<(HandlerStatus, Option<InMemDicomObject>), HandlerError>;
}

/// Handler for N-GET requests.
pub trait NGetHandler: Send {
    /// Handle an N-GET request,
    /// returning the status and the optional attribute list.
    fn on_n_get(
        &mut self,
        request: &NGet,
        context: &PresentationContext,
    ) -> Result<(HandlerStatus, Option<InMemDicomObject>), HandlerError>;
}

/// Handler for N-SET requests.
pub trait NSetHandler: Send {
    /// Handle an N-SET request,
    /// returning the status and the optional attribute list.
    fn on_n_set(
        &mut self,
        request: &NSet,
        modification_list: &InMemDicomObject,
        context: &PresentationContext,
    ) -> Result<(HandlerStatus, Option<InMemDicomObject>), HandlerError>;
}

/// Handler for N-ACTION requests.
pub trait NActionHandler: Send {
    /// Handle an N-ACTION request,
    /// returning the status and the optional action reply.
    fn on_n_action(
        &mut self,
        request: &NAction,
        context: &PresentationContext,
    ) -> Result<(HandlerStatus, Option<InMemDicomObject>), HandlerError>;
}

/// Handler for N-CREATE requests.
pub trait NCreateHandler: Send {
    /// Handle an N-CREATE request,
    /// returning the status and the optional attribute list.
    fn on_n_create(
        &mut self,
        request: &NCreate,
        context: &PresentationContext,
    ) -> Result<(HandlerStatus, Option<InMemDicomObject>), HandlerError>;
}

/// Handler for N-DELETE requests.
pub trait NDeleteHandler: Send {
    /// Handle an N-DELETE request.
    fn on_n_delete(
        &mut self,
        request: &NDelete,
        context: &PresentationContext,
    ) -> Result<HandlerStatus, HandlerError>;
}

/// The set of bound intervention handlers for an association.
///
/// At most one handler per service.
/// A request for a negotiated service with no bound handler
/// is answered with the service's handler-failure status.
#[derive(Default)]
pub struct ServiceHandlers {
    pub(crate) on_c_echo: Option<Box<dyn EchoHandler>>,
    pub(crate) on_c_store: Option<Box<dyn StoreHandler>>,
    pub(crate) on_c_find: Option<Box<dyn FindHandler>>,
    pub(crate) on_c_get: Option<Box<dyn GetHandler>>,
    pub(crate) on_c_move: Option<Box<dyn MoveHandler>>,
    pub(crate) on_n_event_report: Option<Box<dyn EventReportHandler>>,
    pub(crate) on_n_get: Option<Box<dyn NGetHandler>>,
    pub(crate) on_n_set: Option<Box<dyn NSetHandler>>,
    pub(crate) on_n_action: Option<Box<dyn NActionHandler>>,
    pub(crate) on_n_create: Option<Box<dyn NCreateHandler>>,
    pub(crate) on_n_delete: Option<Box<dyn NDeleteHandler>>,
}

impl std::fmt::Debug for ServiceHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandlers")
            .field("on_c_echo", &self.on_c_echo.is_some())
            .field("on_c_store", &self.on_c_store.is_some())
            .field("on_c_find", &self.on_c_find.is_some())
            .field("on_c_get", &self.on_c_get.is_some())
            .field("on_c_move", &self.on_c_move.is_some())
            .finish_non_exhaustive()
    }
}

impl ServiceHandlers {
    /// Create an empty handler set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the C-ECHO handler.
    pub fn on_c_echo(mut self, handler: impl EchoHandler + 'static) -> Self {
        self.on_c_echo = Some(Box::new(handler));
        self
    }

    /// Bind the C-STORE handler.
    pub fn on_c_store(mut self, handler: impl StoreHandler + 'static) -> Self {
        self.on_c_store = Some(Box::new(handler));
        self
    }

    /// Bind the C-FIND handler.
    pub fn on_c_find(mut self, handler: impl FindHandler + 'static) -> Self {
        self.on_c_find = Some(Box::new(handler));
        self
    }

    /// Bind the C-GET handler.
    pub fn on_c_get(mut self, handler: impl GetHandler + 'static) -> Self {
        self.on_c_get = Some(Box::new(handler));
        self
    }

    /// Bind the C-MOVE handler.
    pub fn on_c_move(mut self, handler: impl MoveHandler + 'static) -> Self {
        self.on_c_move = Some(Box::new(handler));
        self
    }

    /// Bind the N-EVENT-REPORT handler.
    pub fn on_n_event_report(mut self, handler: impl EventReportHandler + 'static) -> Self {
        self.on_n_event_report = Some(Box::new(handler));
        self
    }

    /// Bind the N-GET handler.
    pub fn on_n_get(mut self, handler: impl NGetHandler + 'static) -> Self {
        self.on_n_get = Some(Box::new(handler));
        self
    }

    /// Bind the N-SET handler.
    pub fn on_n_set(mut self, handler: impl NSetHandler + 'static) -> Self {
        self.on_n_set = Some(Box::new(handler));
        self
    }

    /// Bind the N-ACTION handler.
    pub fn on_n_action(mut self, handler: impl NActionHandler + 'static) -> Self {
        self.on_n_action = Some(Box::new(handler));
        self
    }

    /// Bind the N-CREATE handler.
    pub fn on_n_create(mut self, handler: impl NCreateHandler + 'static) -> Self {
        self.on_n_create = Some(Box::new(handler));
        self
    }

    /// Bind the N-DELETE handler.
    pub fn on_n_delete(mut self, handler: impl NDeleteHandler + 'static) -> Self {
        self.on_n_delete = Some(Box::new(handler));
        self
    }
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("No service class registered for SOP class `{}`", uid))]
    UnsupportedSopClass { uid: String, backtrace: Backtrace },

    #[snafu(display("No presentation context with ID {}", id))]
    UnknownPresentationContext { id: u8, backtrace: Backtrace },

    #[snafu(display("Request is missing the SOP class UID"))]
    MissingSopClass { backtrace: Backtrace },

    #[snafu(display("Could not send response"))]
    SendResponse {
        #[snafu(backtrace)]
        source: provider::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The outcome of serving one indication.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DispatchOutcome {
    /// A request was dispatched.
    Handled,
    /// The dequeue timed out with no indication.
    TimedOut,
}

/// The association-level dispatch loop.
///
/// Owns the bound handlers and the view of
/// the association's negotiated presentation contexts.
pub struct ServiceDispatcher<D> {
    provider: Arc<DimseProvider<D>>,
    handlers: ServiceHandlers,
    contexts: Vec<PresentationContext>,
    local_ae_title: Option<AeTitle>,
}

impl<D> ServiceDispatcher<D>
where
    D: Dul,
{
    /// Create a dispatcher over an association's provider.
    ///
    /// `contexts` is the accepted presentation context set
    /// negotiated by the upper layer;
    /// `local_ae_title` is this node's AE title,
    /// used as the originator of C-MOVE sub-operations.
    pub fn new(
        provider: Arc<DimseProvider<D>>,
        contexts: Vec<PresentationContext>,
        local_ae_title: Option<AeTitle>,
        handlers: ServiceHandlers,
    ) -> Self {
        ServiceDispatcher {
            provider,
            handlers,
            contexts,
            local_ae_title,
        }
    }

    /// Serve indications until the association dies
    /// or a blocking dequeue times out.
    pub fn serve(&mut self) -> Result<()> {
        while self.provider.is_alive() {
            if self.serve_one()? == DispatchOutcome::TimedOut {
                break;
            }
        }
        Ok(())
    }

    /// Serve a single indication, waiting up to the DIMSE timeout.
    pub fn serve_one(&mut self) -> Result<DispatchOutcome> {
        match self.provider.get_msg(true) {
            None => Ok(DispatchOutcome::TimedOut),
            Some((context_id, primitive)) => {
                self.dispatch(context_id, primitive)?;
                Ok(DispatchOutcome::Handled)
            }
        }
    }

    /// Route one indication to its service class.
    pub fn dispatch(&mut self, context_id: u8, primitive: Primitive) -> Result<()> {
        if primitive.message_id_being_responded_to().is_some() {
            // a stray confirmation; requests are the only
            // indications this loop serves
            warn!(
                "ignoring unsolicited {} confirmation on context {}",
                primitive.name(),
                context_id
            );
            return Ok(());
        }

        let Some(context) = self.contexts.iter().find(|c| c.id == context_id).cloned() else {
            self.abort();
            return UnknownPresentationContextSnafu { id: context_id }.fail();
        };

        let Some(sop_class_uid) = request_sop_class(&primitive) else {
            self.abort();
            return MissingSopClassSnafu.fail();
        };
        let Some(kind) = service_class_for(&sop_class_uid) else {
            // the peer negotiated a context we cannot serve
            self.abort();
            return UnsupportedSopClassSnafu { uid: sop_class_uid }.fail();
        };

        match (kind, primitive) {
            (ServiceClassKind::Verification, Primitive::CEcho(req)) => {
                verification::scp(&mut self.handlers, &self.provider, &context, req)
            }
            (ServiceClassKind::Storage, Primitive::CStore(req)) => {
                storage::scp(&mut self.handlers, &self.provider, &context, req)
            }
            (
                ServiceClassKind::QueryRetrieveFind | ServiceClassKind::BasicWorklistFind,
                Primitive::CFind(req),
            ) => query_retrieve::find_scp(&mut self.handlers, &self.provider, &context, req, kind),
            (ServiceClassKind::QueryRetrieveGet, Primitive::CGet(req)) => {
                query_retrieve::get_scp(
                    &mut self.handlers,
                    &self.provider,
                    &self.contexts,
                    &context,
                    req,
                )
            }
            (ServiceClassKind::QueryRetrieveMove, Primitive::CMove(req)) => {
                query_retrieve::move_scp(
                    &mut self.handlers,
                    &self.provider,
                    &context,
                    req,
                    self.local_ae_title.as_ref(),
                )
            }
            (_, primitive @ (Primitive::NEventReport(_)
            | Primitive::NGet(_)
            | Primitive::NSet(_)
            | Primitive::NAction(_)
            | Primitive::NCreate(_)
            | Primitive::NDelete(_))) => {
                normalized::scp(&mut self.handlers, &self.provider, &context, primitive)
            }
            (kind, primitive) => {
                warn!(
                    "{} request does not belong to the {:?} service class",
                    primitive.name(),
                    kind
                );
                self.abort();
                UnsupportedSopClassSnafu { uid: sop_class_uid }.fail()
            }
        }
    }

    /// Abort the association through the upper layer.
    fn abort(&self) {
        let _ = self.provider.send_pdu(Pdu::AbortRQ {
            source: AbortRQSource::ServiceUser,
        });
    }
}

/// The SOP class UID that routes a request primitive:
/// the affected SOP class for composite operations,
/// N-EVENT-REPORT and N-CREATE,
/// or the requested SOP class for the remaining N-services.
fn request_sop_class(primitive: &Primitive) -> Option<String> {
    let uid = match primitive {
        Primitive::CEcho(p) => p.affected_sop_class_uid.as_ref(),
        Primitive::CStore(p) => p.affected_sop_class_uid.as_ref(),
        Primitive::CFind(p) => p.affected_sop_class_uid.as_ref(),
        Primitive::CGet(p) => p.affected_sop_class_uid.as_ref(),
        Primitive::CMove(p) => p.affected_sop_class_uid.as_ref(),
        Primitive::CCancel(_) => None,
        Primitive::NEventReport(p) => p.affected_sop_class_uid.as_ref(),
        Primitive::NCreate(p) => p.affected_sop_class_uid.as_ref(),
        Primitive::NGet(p) => p.requested_sop_class_uid.as_ref(),
        Primitive::NSet(p) => p.requested_sop_class_uid.as_ref(),
        Primitive::NAction(p) => p.requested_sop_class_uid.as_ref(),
        Primitive::NDelete(p) => p.requested_sop_class_uid.as_ref(),
    };
    uid.map(|uid| uid.as_str().to_string())
}

/// Send a response primitive, mapping provider errors.
pub(crate) fn send_response<D: Dul>(
    provider: &DimseProvider<D>,
    context_id: u8,
    response: Primitive,
) -> Result<()> {
    provider
        .send_msg(&response, context_id)
        .context(SendResponseSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sop_class_routing() {
        assert_eq!(
            service_class_for(uids::VERIFICATION),
            Some(ServiceClassKind::Verification)
        );
        assert_eq!(
            service_class_for("1.2.840.10008.5.1.4.1.1.2"),
            Some(ServiceClassKind::Storage)
        );
        assert_eq!(
            service_class_for(uids::PATIENT_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_FIND),
            Some(ServiceClassKind::QueryRetrieveFind)
        );
        assert_eq!(
            service_class_for(uids::COMPOSITE_INSTANCE_RETRIEVE_WITHOUT_BULK_DATA_GET),
            Some(ServiceClassKind::QueryRetrieveGet)
        );
        assert_eq!(
            service_class_for(uids::STUDY_ROOT_QUERY_RETRIEVE_INFORMATION_MODEL_MOVE),
            Some(ServiceClassKind::QueryRetrieveMove)
        );
        assert_eq!(service_class_for("1.2.3.4"), None);
    }

    #[test]
    fn per_service_status_sets() {
        use ServiceClassKind::*;
        assert!(Verification.is_valid_status(0x0000));
        assert!(!Verification.is_valid_status(0xFF00));
        assert!(Storage.is_valid_status(0xB007));
        assert!(Storage.is_valid_status(0xC211));
        assert!(!Storage.is_valid_status(0xFF00));
        assert!(QueryRetrieveFind.is_valid_status(0xFF01));
        assert!(!QueryRetrieveGet.is_valid_status(0xFF01));
        assert!(QueryRetrieveMove.is_valid_status(0xA801));
        assert!(!QueryRetrieveGet.is_valid_status(0xA801));
    }
}
