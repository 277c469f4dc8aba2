//! The query/retrieve service classes:
//! C-FIND matching and the C-GET/C-MOVE retrieve engines.
//!
//! Both retrieve operations share one shape:
//! the handler announces a number of C-STORE sub-operations
//! and then yields `(status, data set)` pairs.
//! The engine executes each pending pair as a C-STORE sub-operation,
//! keeps the `[remaining, failed, warning, completed]` tally,
//! emits an interim Pending response after every attempt,
//! and rolls the tally up into the final response status.
//!
//! C-GET sub-operations ride the same association with reversed roles;
//! C-MOVE sub-operations ride a new association
//! opened towards the resolved move destination.
use dicom_core::value::C;
use dicom_core::{DataElement, PrimitiveValue, VR};
use dicom_dictionary_std::{tags, uids};
use dicom_object::InMemDicomObject;
use dicom_ul::association::ClientAssociationOptions;
use dicom_ul::pdu::Pdu;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::{debug, error, info, warn};

use crate::config::DimseConfig;
use crate::dataset;
use crate::message::{Message, MessageAssembler};
use crate::primitives::{AeTitle, CFind, CGet, CMove, CStore, Primitive, Priority, Uid};
use crate::provider::{self, DimseProvider, Dul};
use crate::service::{
    check_status, send_response, PresentationContext, ResponseStream, Result, ServiceClassKind,
    ServiceHandlers,
};
use crate::status::{category, codes, StatusCategory};

/// The sub-operation plan of a C-GET handler:
/// the total sub-operation count
/// followed by the `(status, data set)` stream.
pub struct SubOperations {
    /// The number of C-STORE sub-operations required
    /// to complete the retrieve.
    pub count: u16,
    /// The response stream;
    /// every Pending item carries the next instance to store.
    pub responses: ResponseStream,
}

/// A resolved C-MOVE destination endpoint.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct MoveDestination {
    pub host: String,
    pub port: u16,
}

/// The sub-operation plan of a C-MOVE handler.
pub struct MoveSubOperations {
    /// The network endpoint of the move destination,
    /// or `None` when the destination AE title is unknown.
    pub destination: Option<MoveDestination>,
    /// The storage SOP classes to propose
    /// on the association to the destination.
    pub store_classes: Vec<String>,
    /// The sub-operation count and response stream.
    pub sub_operations: SubOperations,
}

#[derive(Debug, Snafu)]
enum SubOpError {
    #[snafu(display("data set carries no SOP instance identity"))]
    MissingInstanceIdentity,

    #[snafu(display("no presentation context for SOP class `{}`", uid))]
    NoPresentationContext { uid: String },

    #[snafu(display("could not encode the data set"))]
    EncodeDataSet {
        #[snafu(backtrace)]
        source: dataset::Error,
    },

    #[snafu(display("could not send the sub-operation request"))]
    SendSubOp {
        #[snafu(backtrace)]
        source: provider::Error,
    },

    #[snafu(display("timed out waiting for the sub-operation response"))]
    SubOpTimeout,

    #[snafu(display("sub-operation response carried no status"))]
    MissingStatus,

    #[snafu(display("sub-operation exchange failed: {}", message))]
    Exchange { message: String },
}

/// Tally of one retrieve operation.
#[derive(Debug, Default)]
struct SubOpTracker {
    remaining: u16,
    failed: u16,
    warning: u16,
    completed: u16,
    failed_instances: Vec<String>,
}

impl SubOpTracker {
    fn new(count: u16) -> Self {
        SubOpTracker {
            remaining: count,
            ..Default::default()
        }
    }

    /// Record the outcome of one C-STORE sub-operation
    /// by storage status category.
    fn record(&mut self, outcome: std::result::Result<u16, SubOpError>, instance_uid: Option<String>) {
        let store_category = match outcome {
            Ok(code) => category(code),
            Err(e) => {
                warn!("C-STORE sub-operation failed: {}", e);
                StatusCategory::Failure
            }
        };
        match store_category {
            StatusCategory::Success => self.completed += 1,
            StatusCategory::Warning => {
                self.warning += 1;
                self.failed_instances.push(instance_uid.unwrap_or_default());
            }
            _ => {
                self.failed += 1;
                self.failed_instances.push(instance_uid.unwrap_or_default());
            }
        }
        self.remaining -= 1;
    }
}

/// Serve one C-FIND request.
pub(crate) fn find_scp<D: Dul>(
    handlers: &mut ServiceHandlers,
    provider: &DimseProvider<D>,
    context: &PresentationContext,
    req: CFind,
    kind: ServiceClassKind,
) -> Result<()> {
    let mut rsp = CFind {
        message_id: req.message_id,
        message_id_being_responded_to: req.message_id,
        affected_sop_class_uid: req.affected_sop_class_uid.clone(),
        ..Default::default()
    };

    // decode the identifier before any user code runs
    let identifier = match req
        .identifier
        .as_deref()
        .map(|bytes| dataset::read_dataset(bytes, &context.transfer_syntax))
    {
        Some(Ok(identifier)) => identifier,
        other => {
            if let Some(Err(e)) = other {
                error!("failed to decode the request identifier: {}", e);
            }
            rsp.status = Some(codes::FIND_DECODE_FAILURE);
            rsp.error_comment = Some("Unable to decode the dataset".to_string());
            return send_response(provider, context.id, Primitive::CFind(rsp));
        }
    };

    let cancel = provider.cancel_token(req.message_id.unwrap_or_default());
    let mut responses = match handlers.on_c_find.as_mut() {
        None => {
            warn!("no handler bound for C-FIND");
            rsp.status = Some(codes::FIND_HANDLER_FAILURE);
            return send_response(provider, context.id, Primitive::CFind(rsp));
        }
        Some(handler) => match handler.on_c_find(&req, &identifier, context, cancel) {
            Ok(responses) => responses,
            Err(e) => {
                error!("exception in the C-FIND handler: {}", e);
                rsp.status = Some(codes::FIND_HANDLER_FAILURE);
                return send_response(provider, context.id, Primitive::CFind(rsp));
            }
        },
    };

    let mut match_number = 0usize;
    for (outcome, data_set) in &mut responses {
        let detail = outcome.into_detail();
        check_status(kind, detail.status);

        match category(detail.status) {
            StatusCategory::Pending => {
                match_number += 1;
                let encoded = data_set
                    .as_ref()
                    .and_then(|ds| dataset::write_dataset(ds, &context.transfer_syntax).ok())
                    .filter(|bytes| !bytes.is_empty());
                let Some(encoded) = encoded else {
                    error!("failed to encode match #{} for the response", match_number);
                    let mut rsp = rsp.clone();
                    rsp.status = Some(codes::FIND_ENCODE_FAILURE);
                    provider.take_cancel(req.message_id.unwrap_or_default());
                    return send_response(provider, context.id, Primitive::CFind(rsp));
                };
                debug!("find response {} (Pending)", match_number);
                let mut pending = rsp.clone();
                pending.status = Some(detail.status);
                pending.identifier = Some(encoded);
                send_response(provider, context.id, Primitive::CFind(pending))?;
            }
            StatusCategory::Cancel => {
                info!("received C-CANCEL-FIND from peer");
                let mut rsp = rsp.clone();
                rsp.status = Some(detail.status);
                provider.take_cancel(req.message_id.unwrap_or_default());
                return send_response(provider, context.id, Primitive::CFind(rsp));
            }
            StatusCategory::Success => {
                // matches left unread by the handler are dropped
                debug!("find handler finished with Success");
                let mut rsp = rsp.clone();
                rsp.status = Some(0x0000);
                provider.take_cancel(req.message_id.unwrap_or_default());
                return send_response(provider, context.id, Primitive::CFind(rsp));
            }
            _ => {
                let mut rsp = rsp.clone();
                rsp.status = Some(detail.status);
                rsp.error_comment = detail.error_comment;
                rsp.offending_element = detail.offending_element;
                provider.take_cancel(req.message_id.unwrap_or_default());
                return send_response(provider, context.id, Primitive::CFind(rsp));
            }
        }
    }

    // the stream ended without a terminal status
    rsp.status = Some(0x0000);
    provider.take_cancel(req.message_id.unwrap_or_default());
    send_response(provider, context.id, Primitive::CFind(rsp))
}

/// Serve one C-GET request.
///
/// Sub-operations are C-STORE requests issued over the same association,
/// under a presentation context whose abstract syntax
/// matches each instance's SOP class.
pub(crate) fn get_scp<D: Dul>(
    handlers: &mut ServiceHandlers,
    provider: &DimseProvider<D>,
    contexts: &[PresentationContext],
    context: &PresentationContext,
    req: CGet,
) -> Result<()> {
    let mut rsp = CGet {
        message_id: req.message_id,
        message_id_being_responded_to: req.message_id,
        affected_sop_class_uid: req.affected_sop_class_uid.clone(),
        ..Default::default()
    };

    let identifier = match req
        .identifier
        .as_deref()
        .map(|bytes| dataset::read_dataset(bytes, &context.transfer_syntax))
    {
        Some(Ok(identifier)) => identifier,
        other => {
            if let Some(Err(e)) = other {
                error!("failed to decode the request identifier: {}", e);
            }
            rsp.status = Some(codes::GET_DECODE_FAILURE);
            rsp.error_comment = Some("Unable to decode the dataset".to_string());
            return send_response(provider, context.id, Primitive::CGet(rsp));
        }
    };

    let message_id = req.message_id.unwrap_or_default();
    let cancel = provider.cancel_token(message_id);
    let sub_operations = match handlers.on_c_get.as_mut() {
        None => {
            warn!("no handler bound for C-GET");
            rsp.status = Some(codes::GET_HANDLER_FAILURE);
            return send_response(provider, context.id, Primitive::CGet(rsp));
        }
        Some(handler) => match handler.on_c_get(&req, &identifier, context, cancel) {
            Ok(sub_operations) => sub_operations,
            Err(e) => {
                error!("exception in the C-GET handler: {}", e);
                rsp.status = Some(codes::GET_HANDLER_FAILURE);
                return send_response(provider, context.id, Primitive::CGet(rsp));
            }
        },
    };

    let strip_bulk =
        context.abstract_syntax == uids::COMPOSITE_INSTANCE_RETRIEVE_WITHOUT_BULK_DATA_GET;
    let mut tracker = SubOpTracker::new(sub_operations.count);
    let mut responses = sub_operations.responses;
    let mut subop_message_id = 0u16;

    for (outcome, data_set) in &mut responses {
        if tracker.remaining == 0 {
            warn!(
                "handler yielded further results, but all {} sub-operations are complete",
                sub_operations.count
            );
            break;
        }

        let detail = outcome.into_detail();
        check_status(ServiceClassKind::QueryRetrieveGet, detail.status);

        match category(detail.status) {
            StatusCategory::Cancel => {
                info!("received C-CANCEL-GET from peer");
                let mut rsp = rsp.clone();
                rsp.status = Some(detail.status);
                rsp.number_of_remaining_suboperations = Some(tracker.remaining);
                rsp.number_of_completed_suboperations = Some(tracker.completed);
                rsp.number_of_failed_suboperations = Some(tracker.failed);
                rsp.number_of_warning_suboperations = Some(tracker.warning);
                rsp.identifier =
                    failed_instances_identifier(data_set, &tracker.failed_instances, context);
                provider.take_cancel(message_id);
                return send_response(provider, context.id, Primitive::CGet(rsp));
            }
            StatusCategory::Failure | StatusCategory::Warning => {
                info!(
                    "get handler finalized with status {:#06x}",
                    detail.status
                );
                let mut rsp = rsp.clone();
                rsp.status = Some(detail.status);
                rsp.error_comment = detail.error_comment;
                rsp.offending_element = detail.offending_element;
                rsp.number_of_completed_suboperations = Some(tracker.completed);
                rsp.number_of_failed_suboperations = Some(tracker.failed + tracker.remaining);
                rsp.number_of_warning_suboperations = Some(tracker.warning);
                rsp.identifier =
                    failed_instances_identifier(data_set, &tracker.failed_instances, context);
                provider.take_cancel(message_id);
                return send_response(provider, context.id, Primitive::CGet(rsp));
            }
            StatusCategory::Success => {
                provider.take_cancel(message_id);
                return send_final_get(provider, context, rsp, &tracker);
            }
            StatusCategory::Pending => {
                let Some(data_set) = data_set else {
                    error!("received an unusable data set from the handler");
                    tracker.failed += 1;
                    tracker.failed_instances.push(String::new());
                    let mut interim = rsp.clone();
                    interim.status = Some(detail.status);
                    interim.number_of_remaining_suboperations = Some(tracker.remaining);
                    interim.number_of_completed_suboperations = Some(tracker.completed);
                    interim.number_of_failed_suboperations = Some(tracker.failed);
                    interim.number_of_warning_suboperations = Some(tracker.warning);
                    send_response(provider, context.id, Primitive::CGet(interim))?;
                    continue;
                };

                let data_set = if strip_bulk {
                    let (stripped, removed) = dataset::strip_bulk_data(data_set);
                    if !removed.is_empty() {
                        warn!(
                            "retrieval without bulk data requested, removed: {}",
                            removed.join(",")
                        );
                    }
                    stripped
                } else {
                    data_set
                };

                let instance_uid = instance_uid_of(&data_set);
                subop_message_id = subop_message_id.wrapping_add(1);
                let outcome = local_store_subop(
                    provider,
                    contexts,
                    &data_set,
                    subop_message_id,
                    req.priority,
                );
                tracker.record(outcome, instance_uid);

                let mut interim = rsp.clone();
                interim.status = Some(codes::PENDING);
                interim.number_of_remaining_suboperations = Some(tracker.remaining);
                interim.number_of_completed_suboperations = Some(tracker.completed);
                interim.number_of_failed_suboperations = Some(tracker.failed);
                interim.number_of_warning_suboperations = Some(tracker.warning);
                send_response(provider, context.id, Primitive::CGet(interim))?;
            }
            StatusCategory::Unknown => {
                let mut rsp = rsp.clone();
                rsp.status = Some(detail.status);
                provider.take_cancel(message_id);
                return send_response(provider, context.id, Primitive::CGet(rsp));
            }
        }
    }

    provider.take_cancel(message_id);
    send_final_get(provider, context, rsp, &tracker)
}

fn send_final_get<D: Dul>(
    provider: &DimseProvider<D>,
    context: &PresentationContext,
    mut rsp: CGet,
    tracker: &SubOpTracker,
) -> Result<()> {
    if tracker.failed == 0 && tracker.warning == 0 {
        info!("get SCP result: Success");
        rsp.status = Some(0x0000);
    } else {
        info!("get SCP result: Warning");
        rsp.status = Some(codes::WARNING_SUBOPERATIONS);
        rsp.identifier = failed_instances_identifier(None, &tracker.failed_instances, context);
    }
    rsp.number_of_completed_suboperations = Some(tracker.completed);
    rsp.number_of_failed_suboperations = Some(tracker.failed);
    rsp.number_of_warning_suboperations = Some(tracker.warning);
    send_response(provider, context.id, Primitive::CGet(rsp))
}

/// Serve one C-MOVE request.
///
/// Sub-operations are C-STORE requests issued over a new association
/// to the destination resolved by the handler,
/// carrying this node's AE title and the retrieve's message ID
/// as the move originator.
pub(crate) fn move_scp<D: Dul>(
    handlers: &mut ServiceHandlers,
    provider: &DimseProvider<D>,
    context: &PresentationContext,
    req: CMove,
    local_ae_title: Option<&AeTitle>,
) -> Result<()> {
    let mut rsp = CMove {
        message_id: req.message_id,
        message_id_being_responded_to: req.message_id,
        affected_sop_class_uid: req.affected_sop_class_uid.clone(),
        ..Default::default()
    };

    let identifier = match req
        .identifier
        .as_deref()
        .map(|bytes| dataset::read_dataset(bytes, &context.transfer_syntax))
    {
        Some(Ok(identifier)) => identifier,
        other => {
            if let Some(Err(e)) = other {
                error!("failed to decode the request identifier: {}", e);
            }
            rsp.status = Some(codes::MOVE_DECODE_FAILURE);
            rsp.error_comment = Some("Unable to decode the dataset".to_string());
            return send_response(provider, context.id, Primitive::CMove(rsp));
        }
    };

    let message_id = req.message_id.unwrap_or_default();
    let cancel = provider.cancel_token(message_id);
    let plan = match handlers.on_c_move.as_mut() {
        None => {
            warn!("no handler bound for C-MOVE");
            rsp.status = Some(codes::MOVE_HANDLER_FAILURE);
            return send_response(provider, context.id, Primitive::CMove(rsp));
        }
        Some(handler) => match handler.on_c_move(&req, &identifier, context, cancel) {
            Ok(plan) => plan,
            Err(e) => {
                error!("exception in the C-MOVE handler: {}", e);
                rsp.status = Some(codes::MOVE_HANDLER_FAILURE);
                return send_response(provider, context.id, Primitive::CMove(rsp));
            }
        },
    };

    let Some(destination) = plan.destination else {
        error!(
            "unknown move destination: {}",
            req.move_destination
                .as_ref()
                .map(AeTitle::as_str)
                .unwrap_or_default()
        );
        rsp.status = Some(codes::MOVE_DESTINATION_UNKNOWN);
        provider.take_cancel(message_id);
        return send_response(provider, context.id, Primitive::CMove(rsp));
    };

    // open the store association towards the destination,
    // proposing the storage classes announced by the handler
    let called_ae_title = req
        .move_destination
        .as_ref()
        .map(AeTitle::as_str)
        .unwrap_or("ANY-SCP");
    let mut options = ClientAssociationOptions::new()
        .called_ae_title(called_ae_title)
        .max_pdu_length(provider.config().max_pdu_size);
    if let Some(aet) = local_ae_title {
        options = options.calling_ae_title(aet.as_str());
    }
    for sop_class in &plan.store_classes {
        options = options.with_abstract_syntax(sop_class.clone());
    }
    let address = format!("{}:{}", destination.host, destination.port);
    let mut scu = match options.establish_with(&address) {
        Ok(scu) => scu,
        Err(e) => {
            error!("could not reach move destination `{}`: {}", address, e);
            rsp.status = Some(codes::MOVE_BAD_DESTINATION);
            provider.take_cancel(message_id);
            return send_response(provider, context.id, Primitive::CMove(rsp));
        }
    };

    // map each proposed storage class to its accepted context
    let accepted: Vec<_> = scu.presentation_contexts().to_vec();
    let originator = (local_ae_title.cloned(), message_id);
    let config = provider.config().clone();

    let mut tracker = SubOpTracker::new(plan.sub_operations.count);
    let mut responses = plan.sub_operations.responses;
    let mut subop_message_id = 0u16;
    let mut outcome_to_send: Option<CMove> = None;

    // one C-STORE exchange on the destination association
    let mut store_one = |data_set: &InMemDicomObject,
                         msg_id: u16|
     -> std::result::Result<u16, SubOpError> {
        let fragments = build_store_fragments(
            &accepted,
            &plan.store_classes,
            &config,
            data_set,
            msg_id,
            req.priority,
            &originator,
        )?;
        for pdu in fragments {
            scu.send(&pdu).map_err(|e| SubOpError::Exchange {
                message: e.to_string(),
            })?;
        }

        let mut assembler = MessageAssembler::new();
        loop {
            let pdu = scu.receive().map_err(|e| SubOpError::Exchange {
                message: e.to_string(),
            })?;
            let Pdu::PData { data } = pdu else {
                return ExchangeSnafu {
                    message: "unexpected PDU from the store SCP".to_string(),
                }
                .fail();
            };
            let completed = assembler
                .feed_pdata(&data)
                .map_err(|e| SubOpError::Exchange {
                    message: e.to_string(),
                })?;
            if let Some(msg) = completed {
                let primitive = msg.into_primitive().map_err(|e| SubOpError::Exchange {
                    message: e.to_string(),
                })?;
                return match primitive {
                    Primitive::CStore(store) => store.status.context(MissingStatusSnafu),
                    other => ExchangeSnafu {
                        message: format!(
                            "unexpected {} message from the store SCP",
                            other.name()
                        ),
                    }
                    .fail(),
                };
            }
        }
    };

    for (outcome, data_set) in &mut responses {
        if tracker.remaining == 0 {
            warn!(
                "handler yielded further results, but all {} sub-operations are complete",
                plan.sub_operations.count
            );
            break;
        }

        let detail = outcome.into_detail();
        check_status(ServiceClassKind::QueryRetrieveMove, detail.status);

        match category(detail.status) {
            StatusCategory::Cancel => {
                info!("received C-CANCEL-MOVE from peer");
                let mut rsp = rsp.clone();
                rsp.status = Some(detail.status);
                rsp.number_of_remaining_suboperations = Some(tracker.remaining);
                rsp.number_of_completed_suboperations = Some(tracker.completed);
                rsp.number_of_failed_suboperations = Some(tracker.failed);
                rsp.number_of_warning_suboperations = Some(tracker.warning);
                rsp.identifier =
                    failed_instances_identifier(data_set, &tracker.failed_instances, context);
                outcome_to_send = Some(rsp);
                break;
            }
            StatusCategory::Failure | StatusCategory::Warning => {
                info!(
                    "move handler finalized with status {:#06x}",
                    detail.status
                );
                let mut rsp = rsp.clone();
                rsp.status = Some(detail.status);
                rsp.error_comment = detail.error_comment;
                rsp.offending_element = detail.offending_element;
                rsp.number_of_completed_suboperations = Some(tracker.completed);
                rsp.number_of_failed_suboperations = Some(tracker.failed + tracker.remaining);
                rsp.number_of_warning_suboperations = Some(tracker.warning);
                rsp.identifier =
                    failed_instances_identifier(data_set, &tracker.failed_instances, context);
                outcome_to_send = Some(rsp);
                break;
            }
            StatusCategory::Success => {
                outcome_to_send = Some(final_move_response(rsp.clone(), &tracker, context));
                break;
            }
            StatusCategory::Pending => {
                let Some(data_set) = data_set else {
                    error!("received an unusable data set from the handler");
                    tracker.failed += 1;
                    tracker.failed_instances.push(String::new());
                    let mut interim = rsp.clone();
                    interim.status = Some(detail.status);
                    interim.number_of_remaining_suboperations = Some(tracker.remaining);
                    interim.number_of_completed_suboperations = Some(tracker.completed);
                    interim.number_of_failed_suboperations = Some(tracker.failed);
                    interim.number_of_warning_suboperations = Some(tracker.warning);
                    send_response(provider, context.id, Primitive::CMove(interim))?;
                    continue;
                };

                let instance_uid = instance_uid_of(&data_set);
                subop_message_id = subop_message_id.wrapping_add(1);
                let outcome = store_one(&data_set, subop_message_id);
                tracker.record(outcome, instance_uid);

                let mut interim = rsp.clone();
                interim.status = Some(codes::PENDING);
                interim.number_of_remaining_suboperations = Some(tracker.remaining);
                interim.number_of_completed_suboperations = Some(tracker.completed);
                interim.number_of_failed_suboperations = Some(tracker.failed);
                interim.number_of_warning_suboperations = Some(tracker.warning);
                send_response(provider, context.id, Primitive::CMove(interim))?;
            }
            StatusCategory::Unknown => {
                let mut rsp = rsp.clone();
                rsp.status = Some(detail.status);
                outcome_to_send = Some(rsp);
                break;
            }
        }
    }

    drop(responses);
    drop(store_one);
    let _ = scu.release();

    let rsp = outcome_to_send.unwrap_or_else(|| final_move_response(rsp, &tracker, context));
    provider.take_cancel(message_id);
    send_response(provider, context.id, Primitive::CMove(rsp))
}

fn final_move_response(
    mut rsp: CMove,
    tracker: &SubOpTracker,
    context: &PresentationContext,
) -> CMove {
    if tracker.failed == 0 && tracker.warning == 0 {
        info!("move SCP result: Success");
        rsp.status = Some(0x0000);
    } else {
        info!("move SCP result: Warning");
        rsp.status = Some(codes::WARNING_SUBOPERATIONS);
        rsp.identifier = failed_instances_identifier(None, &tracker.failed_instances, context);
    }
    rsp.number_of_completed_suboperations = Some(tracker.completed);
    rsp.number_of_failed_suboperations = Some(tracker.failed);
    rsp.number_of_warning_suboperations = Some(tracker.warning);
    rsp
}

/// Execute one C-STORE sub-operation over the retrieve's own association.
fn local_store_subop<D: Dul>(
    provider: &DimseProvider<D>,
    contexts: &[PresentationContext],
    data_set: &InMemDicomObject,
    message_id: u16,
    priority: Priority,
) -> std::result::Result<u16, SubOpError> {
    let (sop_class_uid, sop_instance_uid) =
        instance_identity(data_set).context(MissingInstanceIdentitySnafu)?;

    let subop_context = contexts
        .iter()
        .find(|c| c.abstract_syntax == sop_class_uid)
        .context(NoPresentationContextSnafu {
            uid: sop_class_uid.clone(),
        })?;

    let encoded =
        dataset::write_dataset(data_set, &subop_context.transfer_syntax).context(EncodeDataSetSnafu)?;

    let rq = CStore {
        message_id: Some(message_id),
        affected_sop_class_uid: Some(Uid::lenient(sop_class_uid)),
        affected_sop_instance_uid: Some(Uid::lenient(sop_instance_uid)),
        priority,
        data_set: Some(encoded),
        ..Default::default()
    };
    provider
        .send_msg(&Primitive::CStore(rq), subop_context.id)
        .context(SendSubOpSnafu)?;

    // await the matching confirmation; anything else that slips
    // onto the queue mid-retrieve is logged and dropped
    loop {
        match provider.get_msg(true) {
            None => return SubOpTimeoutSnafu.fail(),
            Some((_, Primitive::CStore(store)))
                if store.message_id_being_responded_to == Some(message_id) =>
            {
                return store.status.context(MissingStatusSnafu);
            }
            Some((_, other)) => {
                warn!(
                    "ignoring {} indication received during a retrieve",
                    other.name()
                );
            }
        }
    }
}

/// Build the P-DATA sequence of one C-STORE sub-operation request
/// for the association towards the move destination.
#[allow(clippy::too_many_arguments)]
fn build_store_fragments(
    accepted: &[dicom_ul::pdu::PresentationContextResult],
    proposed_classes: &[String],
    config: &DimseConfig,
    data_set: &InMemDicomObject,
    message_id: u16,
    priority: Priority,
    originator: &(Option<AeTitle>, u16),
) -> std::result::Result<crate::message::Fragments, SubOpError> {
    let (sop_class_uid, sop_instance_uid) =
        instance_identity(data_set).context(MissingInstanceIdentitySnafu)?;

    // contexts are proposed in the order of the announced classes;
    // fall back to the first accepted context if the mapping is off
    let position = proposed_classes.iter().position(|c| *c == sop_class_uid);
    let pc = position
        .and_then(|i| {
            accepted
                .iter()
                .find(|pc| pc.id == (2 * i + 1) as u8 || pc.id == (i + 1) as u8)
        })
        .or_else(|| accepted.first())
        .context(NoPresentationContextSnafu {
            uid: sop_class_uid.clone(),
        })?;

    let encoded =
        dataset::write_dataset(data_set, &pc.transfer_syntax).context(EncodeDataSetSnafu)?;

    let rq = CStore {
        message_id: Some(message_id),
        affected_sop_class_uid: Some(Uid::lenient(sop_class_uid)),
        affected_sop_instance_uid: Some(Uid::lenient(sop_instance_uid)),
        priority,
        data_set: Some(encoded),
        move_originator_application_entity_title: originator.0.clone(),
        move_originator_message_id: Some(originator.1),
        ..Default::default()
    };
    Message::from_primitive(&Primitive::CStore(rq), pc.id, config)
        .and_then(|message| message.fragments(config.max_pdu_size))
        .map_err(|e| SubOpError::Exchange {
            message: e.to_string(),
        })
}

/// The SOP class and instance UIDs of a composite instance.
fn instance_identity(data_set: &InMemDicomObject) -> Option<(String, String)> {
    let class = data_set
        .element(tags::SOP_CLASS_UID)
        .ok()?
        .to_str()
        .ok()?
        .trim_end_matches('\0')
        .to_string();
    let instance = data_set
        .element(tags::SOP_INSTANCE_UID)
        .ok()?
        .to_str()
        .ok()?
        .trim_end_matches('\0')
        .to_string();
    Some((class, instance))
}

fn instance_uid_of(data_set: &InMemDicomObject) -> Option<String> {
    data_set
        .element(tags::SOP_INSTANCE_UID)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim_end_matches('\0').to_string())
}

/// Build the failed-instances identifier for a terminal response:
/// the handler's data set when it already carries
/// _FailedSOPInstanceUIDList_,
/// or one built from the tracker's list otherwise.
fn failed_instances_identifier(
    handler_data_set: Option<InMemDicomObject>,
    failed_instances: &[String],
    context: &PresentationContext,
) -> Option<Vec<u8>> {
    let object = match handler_data_set {
        Some(ds) if ds.element(tags::FAILED_SOP_INSTANCE_UID_LIST).is_ok() => ds,
        _ => {
            let mut ds = InMemDicomObject::new_empty();
            ds.put(DataElement::new(
                tags::FAILED_SOP_INSTANCE_UID_LIST,
                VR::UI,
                PrimitiveValue::Strs(failed_instances.iter().cloned().collect::<C<String>>()),
            ));
            ds
        }
    };
    match dataset::write_dataset(&object, &context.transfer_syntax) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("could not encode the failed instances identifier: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_tallies_by_storage_category() {
        let mut tracker = SubOpTracker::new(4);
        tracker.record(Ok(0x0000), Some("1.2.3".into()));
        tracker.record(Ok(0xC000), Some("1.2.4".into()));
        tracker.record(Ok(0xB000), Some("1.2.5".into()));
        tracker.record(Err(SubOpError::SubOpTimeout), Some("1.2.6".into()));

        assert_eq!(tracker.remaining, 0);
        assert_eq!(tracker.completed, 1);
        assert_eq!(tracker.failed, 2);
        assert_eq!(tracker.warning, 1);
        assert_eq!(
            tracker.failed_instances,
            vec!["1.2.4".to_string(), "1.2.5".into(), "1.2.6".into()]
        );
    }
}
